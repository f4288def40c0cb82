// Per-client view of the broker
//
// The session is the boundary the rest of the application depends on: it
// validates room codes before a request ever reaches the broker, bounds
// every request with a timeout, and resolves each request exactly once.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::broker::{BrokerError, BrokerHandle, RelayKind};
use crate::event::RoomEvent;
use crate::room::code::{InvalidRoomCode, RoomCode};
use crate::shared::ClientId;

/// How long a request may stay unacknowledged before it is abandoned.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SessionError {
    /// The room code failed shape validation; no request was issued.
    #[error("invalid room code: {0}")]
    InvalidCode(#[from] InvalidRoomCode),

    /// No acknowledgement arrived within the bound. A late acknowledgement
    /// is dropped, never double-resolved.
    #[error("request timed out")]
    Timeout,

    /// The broker went away mid-request.
    #[error("connection to the broker was lost")]
    Disconnected,

    /// The broker refused the request (e.g. persistence failure).
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// One client's connection to the broker.
///
/// Dropping the session disconnects the client, which runs an implicit
/// leave under the same serialization as an explicit one.
pub struct Session {
    client_id: ClientId,
    broker: BrokerHandle,
    events: mpsc::UnboundedReceiver<RoomEvent>,
    request_timeout: Duration,
}

impl Session {
    /// Connects a new client with a generated identifier.
    pub async fn connect(broker: BrokerHandle) -> Result<Self, SessionError> {
        Self::connect_as(broker, Uuid::new_v4().to_string()).await
    }

    /// Connects with a caller-chosen identifier. The id must be unique per
    /// live connection; reusing one replaces the previous sink.
    pub async fn connect_as(
        broker: BrokerHandle,
        client_id: ClientId,
    ) -> Result<Self, SessionError> {
        let (events_tx, events) = mpsc::unbounded_channel();
        match timeout(
            DEFAULT_REQUEST_TIMEOUT,
            broker.connect(client_id.clone(), events_tx),
        )
        .await
        {
            Err(_) => return Err(SessionError::Timeout),
            Ok(Err(_)) => return Err(SessionError::Disconnected),
            Ok(Ok(())) => {}
        }

        debug!(client_id = %client_id, "Session connected");
        Ok(Self {
            client_id,
            broker,
            events,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Creates a room and returns its code.
    ///
    /// Takes `&mut self` so a session can never hold two pending requests
    /// of the same kind.
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    pub async fn create_room(&mut self) -> Result<RoomCode, SessionError> {
        match timeout(self.request_timeout, self.broker.create_room(&self.client_id)).await {
            Err(_) => Err(SessionError::Timeout),
            Ok(Err(BrokerError::Closed)) => Err(SessionError::Disconnected),
            Ok(Err(BrokerError::Registry(e))) => Err(SessionError::Rejected(e.to_string())),
            Ok(Ok(code)) => Ok(code),
        }
    }

    /// Joins the room named by `code`. Returns `Ok(false)` for missing,
    /// full, or expired rooms; malformed codes are rejected before any
    /// request reaches the broker.
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    pub async fn join_room(&mut self, code: &str) -> Result<bool, SessionError> {
        let code = RoomCode::parse(code)?;
        match timeout(
            self.request_timeout,
            self.broker.join_room(&self.client_id, code),
        )
        .await
        {
            Err(_) => Err(SessionError::Timeout),
            Ok(Err(_)) => Err(SessionError::Disconnected),
            Ok(Ok(joined)) => Ok(joined),
        }
    }

    /// Leaves the current room, if any. Fire-and-forget.
    pub fn leave_room(&self) {
        self.broker.leave_room(&self.client_id);
    }

    /// Relays an opaque drawing payload to the other members of the
    /// client's room. Dropped silently when the client is in no room.
    pub fn send_drawing(&self, kind: RelayKind, payload: Value) {
        self.broker.relay(&self.client_id, kind, payload);
    }

    /// The next membership or relayed event, or `None` once the channel
    /// closes.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.broker.disconnect(&self.client_id);
    }
}
