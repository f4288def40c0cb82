use std::sync::Arc;

use sketchroom::room::{RegistrySettings, RoomRegistry};
use sketchroom::{Broker, BrokerHandle, InMemoryRouter, InMemorySnapshotStore, Session};

// ============================================================================
// Test Infrastructure
// ============================================================================

/// A running broker with direct access to its registry and store, so tests
/// can both drive sessions and inspect the resulting state.
pub struct TestBroker {
    pub handle: BrokerHandle,
    pub registry: Arc<RoomRegistry>,
    pub store: Arc<InMemorySnapshotStore>,
}

impl TestBroker {
    pub async fn start() -> Self {
        Self::start_with_settings(RegistrySettings::default()).await
    }

    pub async fn start_with_settings(settings: RegistrySettings) -> Self {
        let store = Arc::new(InMemorySnapshotStore::new());
        let registry = Arc::new(
            RoomRegistry::restore(store.clone(), settings)
                .await
                .expect("registry restore"),
        );
        let router = Arc::new(InMemoryRouter::new());
        let (broker, handle) = Broker::new(registry.clone(), router);
        tokio::spawn(broker.run());

        Self {
            handle,
            registry,
            store,
        }
    }

    /// Connects a session under a readable name.
    pub async fn session(&self, name: &str) -> Session {
        Session::connect_as(self.handle.clone(), name.to_string())
            .await
            .expect("session connect")
    }
}
