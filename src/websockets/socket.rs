use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use tracing::{debug, warn};

use super::messages::{Frame, FrameType};
use crate::broker::RelayKind;
use crate::session::{Session, SessionError};

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

#[derive(Debug)]
pub enum SocketError {
    ConnectionClosed,
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        match self.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(text)),
            Some(Ok(Message::Close(_))) => Ok(None),
            Some(Ok(_)) => Ok(None), // Ignore binary/ping/pong
            Some(Err(e)) => Err(SocketError::ReceiveFailed(e.to_string())),
            None => Ok(None), // Connection closed
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// One websocket connection bridged onto a broker session.
///
/// Inbound frames become session requests, handled one at a time in arrival
/// order; broker events flow back out as frames. Dropping the session at the
/// end of `run` disconnects the client, which is its implicit leave.
pub struct Connection {
    session: Session,
    socket: Box<dyn SocketWrapper>,
}

impl Connection {
    pub fn new(session: Session, socket: Box<dyn SocketWrapper>) -> Self {
        Self { session, socket }
    }

    /// Run the connection - handles both directions until disconnect
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Outbound: broker events to the client
                event = self.session.next_event() => {
                    match event {
                        Some(event) => {
                            let frame = Frame::from_event(&event);
                            let text = serde_json::to_string(&frame)
                                .map_err(|e| SocketError::SendFailed(e.to_string()))?;
                            self.socket.send_message(text).await?;
                        }
                        None => break, // Broker went away
                    }
                }

                // Inbound: client frames to the broker
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(text)) => {
                            if let Some(reply) = handle_frame(&mut self.session, &text).await {
                                let text = serde_json::to_string(&reply)
                                    .map_err(|e| SocketError::SendFailed(e.to_string()))?;
                                self.socket.send_message(text).await?;
                            }
                        }
                        Ok(None) => break, // Client disconnected
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(())
    }
}

/// Handles one inbound frame, returning the acknowledgement frame to send
/// back, if any.
async fn handle_frame(session: &mut Session, text: &str) -> Option<Frame> {
    let frame = match serde_json::from_str::<Frame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(
                client_id = %session.client_id(),
                error = %e,
                "Failed to parse websocket frame"
            );
            return Some(Frame::error("malformed frame"));
        }
    };

    match frame.frame_type {
        FrameType::CreateRoom => match session.create_room().await {
            Ok(code) => Some(Frame::room_created(&code)),
            Err(e) => {
                warn!(client_id = %session.client_id(), error = %e, "Room creation failed");
                Some(Frame::error(e.to_string()))
            }
        },

        FrameType::JoinRoom => {
            let Some(room_id) = frame.payload.get("room_id").and_then(|v| v.as_str()) else {
                return Some(Frame::error("join-room requires a room_id"));
            };
            match session.join_room(room_id).await {
                Ok(ok) => Some(Frame::join_result(ok)),
                // Shape validation failed before any request was issued
                Err(e @ SessionError::InvalidCode(_)) => Some(Frame::error(e.to_string())),
                Err(e) => {
                    warn!(client_id = %session.client_id(), error = %e, "Join request failed");
                    Some(Frame::error(e.to_string()))
                }
            }
        }

        FrameType::LeaveRoom => {
            session.leave_room();
            None
        }

        FrameType::DrawingAction => {
            session.send_drawing(RelayKind::DrawingAction, frame.payload);
            None
        }

        FrameType::DrawingUpdate => {
            session.send_drawing(RelayKind::DrawingUpdate, frame.payload);
            None
        }

        other => {
            debug!(frame_type = ?other, "Unhandled frame type");
            None
        }
    }
}
