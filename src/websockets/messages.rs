use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::RoomEvent;
use crate::room::code::RoomCode;

/// Frame types for browser-facing websocket communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum FrameType {
    // Client -> Server
    CreateRoom,
    JoinRoom,
    LeaveRoom,
    DrawingAction,
    DrawingUpdate,

    // Server -> Client
    RoomCreated,
    JoinResult,
    PlayerJoined,
    PlayerLeft,
    Error,
}

/// Metadata attached to server-originated frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeta {
    pub timestamp: DateTime<Utc>,
}

/// Base structure for websocket frames
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FrameMeta>,
}

/// Client-to-Server frame payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomPayload {
    pub room_id: String,
}

/// Server-to-Client frame payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCreatedPayload {
    pub room_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResultPayload {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Helper functions for creating frames
impl Frame {
    pub fn new(frame_type: FrameType, payload: Value) -> Self {
        Self {
            frame_type,
            payload,
            meta: Some(FrameMeta {
                timestamp: Utc::now(),
            }),
        }
    }

    /// Create a `room-created` acknowledgement frame
    pub fn room_created(code: &RoomCode) -> Self {
        let payload = RoomCreatedPayload {
            room_id: code.to_string(),
        };
        Self::new(FrameType::RoomCreated, serde_json::to_value(payload).unwrap())
    }

    /// Create a `join-result` acknowledgement frame
    pub fn join_result(ok: bool) -> Self {
        let payload = JoinResultPayload { ok };
        Self::new(FrameType::JoinResult, serde_json::to_value(payload).unwrap())
    }

    /// Create an `error` frame
    pub fn error(message: impl Into<String>) -> Self {
        let payload = ErrorPayload {
            message: message.into(),
        };
        Self::new(FrameType::Error, serde_json::to_value(payload).unwrap())
    }

    /// Translate a broker event into its wire frame
    pub fn from_event(event: &RoomEvent) -> Self {
        let frame_type = match event {
            RoomEvent::PlayerJoined { .. } => FrameType::PlayerJoined,
            RoomEvent::PlayerLeft { .. } => FrameType::PlayerLeft,
            RoomEvent::DrawingAction { .. } => FrameType::DrawingAction,
            RoomEvent::DrawingUpdate { .. } => FrameType::DrawingUpdate,
        };
        Self::new(frame_type, serde_json::to_value(event).unwrap())
    }
}
