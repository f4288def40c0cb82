// Library crate for the sketchroom session broker
// This file exposes the public API for integration tests

pub mod broker;
pub mod config;
pub mod event;
pub mod room;
pub mod session;
pub mod shared;
pub mod store;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use broker::{Broker, BrokerHandle, Command, RelayKind};
pub use config::Config;
pub use event::{BroadcastRouter, InMemoryRouter, RoomEvent};
pub use room::{RegistrySettings, RoomCode, RoomRegistry};
pub use session::{Session, SessionError};
pub use shared::{AppState, ClientId};
pub use store::{InMemorySnapshotStore, JsonFileStore, Snapshot, SnapshotStore};
