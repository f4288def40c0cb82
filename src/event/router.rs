use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::events::RoomEvent;
use crate::shared::ClientId;

/// Per-client delivery channel for server-to-client events.
pub type EventSink = mpsc::UnboundedSender<RoomEvent>;

#[async_trait]
pub trait BroadcastRouter: Send + Sync {
    async fn register(&self, client_id: ClientId, sink: EventSink);

    async fn unregister(&self, client_id: &str);

    async fn send_to(&self, client_id: &str, event: RoomEvent);

    /// Delivers `event` to every listed client exactly once. Whether the
    /// sender appears in `members` is the caller's decision, not ours.
    /// An empty member list is a silent no-op.
    async fn broadcast(&self, members: &[ClientId], event: RoomEvent);
}

pub struct InMemoryRouter {
    // client id -> event sink
    sinks: Arc<RwLock<HashMap<ClientId, EventSink>>>,
}

impl Default for InMemoryRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRouter {
    pub fn new() -> Self {
        Self {
            sinks: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl BroadcastRouter for InMemoryRouter {
    async fn register(&self, client_id: ClientId, sink: EventSink) {
        let mut sinks = self.sinks.write().await;
        sinks.insert(client_id, sink);
    }

    async fn unregister(&self, client_id: &str) {
        let mut sinks = self.sinks.write().await;
        sinks.remove(client_id);
    }

    async fn send_to(&self, client_id: &str, event: RoomEvent) {
        let sinks = self.sinks.read().await;
        if let Some(sink) = sinks.get(client_id) {
            // errors if the client disconnected abruptly and hasn't been
            // unregistered yet
            let _ = sink.send(event);
        }
    }

    async fn broadcast(&self, members: &[ClientId], event: RoomEvent) {
        if members.is_empty() {
            return;
        }

        let sinks = self.sinks.read().await;
        let mut delivered = 0;
        for member in members {
            if let Some(sink) = sinks.get(member) {
                if sink.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        debug!(
            event = event.event_name(),
            room = %event.room(),
            recipients = members.len(),
            delivered = delivered,
            "Event broadcast"
        );
    }
}
