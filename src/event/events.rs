use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::AsRefStr;

use crate::room::code::RoomCode;
use crate::shared::ClientId;

/// Events fanned out to room members.
///
/// Events represent facts about things that have already happened. The
/// broker publishes them through the broadcast router; clients consume them
/// from their session's event stream. Drawing payloads are opaque to the
/// broker and relayed verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, AsRefStr)]
#[serde(tag = "event", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RoomEvent {
    /// A client joined the room
    PlayerJoined {
        room: RoomCode,
        client: ClientId,
        members: Vec<ClientId>,
    },

    /// A client left the room, explicitly or by disconnecting
    PlayerLeft {
        room: RoomCode,
        client: ClientId,
        members: Vec<ClientId>,
    },

    /// A stroke in progress, relayed between members
    DrawingAction {
        room: RoomCode,
        client: ClientId,
        payload: Value,
    },

    /// A completed canvas mutation, relayed between members
    DrawingUpdate {
        room: RoomCode,
        client: ClientId,
        payload: Value,
    },
}

impl RoomEvent {
    /// The room this event is scoped to. Every event is room-specific.
    pub fn room(&self) -> &RoomCode {
        match self {
            RoomEvent::PlayerJoined { room, .. } => room,
            RoomEvent::PlayerLeft { room, .. } => room,
            RoomEvent::DrawingAction { room, .. } => room,
            RoomEvent::DrawingUpdate { room, .. } => room,
        }
    }

    /// The client that caused the event.
    pub fn client(&self) -> &ClientId {
        match self {
            RoomEvent::PlayerJoined { client, .. } => client,
            RoomEvent::PlayerLeft { client, .. } => client,
            RoomEvent::DrawingAction { client, .. } => client,
            RoomEvent::DrawingUpdate { client, .. } => client,
        }
    }

    /// Wire-level event name (kebab-case).
    pub fn event_name(&self) -> &str {
        self.as_ref()
    }
}
