use crate::broker::BrokerHandle;

/// Identifier for one connected client. Opaque and globally unique per
/// connection; locally spawned sessions use a UUIDv4, websocket connections
/// are assigned one on upgrade.
pub type ClientId = String;

/// Shared application state handed to the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    pub broker: BrokerHandle,
}

impl AppState {
    pub fn new(broker: BrokerHandle) -> Self {
        Self { broker }
    }
}
