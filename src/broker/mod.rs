// The broker task and its command channel
//
// This is the transport seam between client sessions and the room registry.
// Requests travel as commands carrying a one-shot reply slot; the broker
// applies the registry mutation before replying, so state is consistent by
// the time the acknowledgement reaches the caller, and the reply itself
// crosses a task boundary so callers never observe same-tick completion.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::event::{BroadcastRouter, EventSink, RoomEvent};
use crate::room::code::RoomCode;
use crate::room::registry::{Departure, JoinOutcome, RegistryError, RoomRegistry};
use crate::shared::ClientId;

/// Which relay family a drawing payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    /// A stroke in progress (`drawing-action`)
    DrawingAction,
    /// A completed canvas mutation (`drawing-update`)
    DrawingUpdate,
}

/// A command received by the [`Broker`].
///
/// Request-shaped commands carry a reply slot that is resolved exactly once;
/// fire-and-forget commands have none. Commands are processed strictly in
/// arrival order, one at a time.
#[derive(Debug)]
pub enum Command {
    /// Register a client and its event sink.
    Connect {
        client_id: ClientId,
        events_tx: EventSink,
        reply: oneshot::Sender<()>,
    },

    /// Create a room with the client as sole member and host.
    CreateRoom {
        client_id: ClientId,
        reply: oneshot::Sender<Result<RoomCode, RegistryError>>,
    },

    /// Join an existing room. Business failures reply `false`.
    JoinRoom {
        client_id: ClientId,
        code: RoomCode,
        reply: oneshot::Sender<bool>,
    },

    /// Leave the current room, if any.
    LeaveRoom { client_id: ClientId },

    /// Relay an opaque drawing payload to the client's room.
    Relay {
        client_id: ClientId,
        kind: RelayKind,
        payload: Value,
    },

    /// Implicit leave plus sink removal; sent when a session closes.
    Disconnect { client_id: ClientId },
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker is no longer running")]
    Closed,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Owns the command queue and drives the room registry.
///
/// Call and spawn [`run`](Self::run) to start processing commands.
pub struct Broker {
    registry: Arc<RoomRegistry>,
    router: Arc<dyn BroadcastRouter>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

impl Broker {
    pub fn new(
        registry: Arc<RoomRegistry>,
        router: Arc<dyn BroadcastRouter>,
    ) -> (Self, BrokerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        (
            Self {
                registry,
                router,
                cmd_rx,
            },
            BrokerHandle { cmd_tx },
        )
    }

    /// Processes commands until every handle is dropped.
    pub async fn run(mut self) {
        info!("Broker started");
        while let Some(cmd) = self.cmd_rx.recv().await {
            self.process_command(cmd).await;
        }
        info!("Broker command queue closed");
    }

    async fn process_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect {
                client_id,
                events_tx,
                reply,
            } => {
                self.router.register(client_id.clone(), events_tx).await;
                debug!(client_id = %client_id, "Client connected");
                let _ = reply.send(());
            }

            Command::CreateRoom { client_id, reply } => {
                match self.registry.create_room(&client_id).await {
                    Ok(created) => {
                        if let Some(departed) = created.departed {
                            self.announce_departure(&client_id, departed).await;
                        }
                        // errors if the caller timed out and dropped the
                        // receiver; the room still exists
                        let _ = reply.send(Ok(created.code));
                    }
                    Err(e) => {
                        error!(client_id = %client_id, error = %e, "Room creation failed");
                        let _ = reply.send(Err(e));
                    }
                }
            }

            Command::JoinRoom {
                client_id,
                code,
                reply,
            } => {
                let ok = match self.registry.join_room(&client_id, &code).await {
                    Ok(JoinOutcome::Joined { members, departed }) => {
                        if let Some(departed) = departed {
                            self.announce_departure(&client_id, departed).await;
                        }
                        let others: Vec<ClientId> = members
                            .iter()
                            .filter(|m| *m != &client_id)
                            .cloned()
                            .collect();
                        self.router
                            .broadcast(
                                &others,
                                RoomEvent::PlayerJoined {
                                    room: code.clone(),
                                    client: client_id.clone(),
                                    members,
                                },
                            )
                            .await;
                        true
                    }
                    // Re-joining the current room succeeds without a
                    // second player-joined announcement
                    Ok(JoinOutcome::AlreadyMember { .. }) => true,
                    Ok(outcome) => {
                        debug!(client_id = %client_id, room = %code, outcome = ?outcome, "Join refused");
                        false
                    }
                    Err(e) => {
                        error!(client_id = %client_id, room = %code, error = %e, "Join failed");
                        false
                    }
                };
                let _ = reply.send(ok);
            }

            Command::LeaveRoom { client_id } => {
                self.leave(&client_id).await;
            }

            Command::Relay {
                client_id,
                kind,
                payload,
            } => {
                let Some(code) = self.registry.room_for_client(&client_id).await else {
                    debug!(client_id = %client_id, "Relay dropped: client in no room");
                    return;
                };
                let event = match kind {
                    RelayKind::DrawingAction => RoomEvent::DrawingAction {
                        room: code.clone(),
                        client: client_id.clone(),
                        payload,
                    },
                    RelayKind::DrawingUpdate => RoomEvent::DrawingUpdate {
                        room: code.clone(),
                        client: client_id.clone(),
                        payload,
                    },
                };
                let others: Vec<ClientId> = self
                    .registry
                    .clients_in_room(&code)
                    .await
                    .into_iter()
                    .filter(|m| m != &client_id)
                    .collect();
                self.router.broadcast(&others, event).await;
            }

            Command::Disconnect { client_id } => {
                self.leave(&client_id).await;
                self.router.unregister(&client_id).await;
                debug!(client_id = %client_id, "Client disconnected");
            }
        }
    }

    async fn leave(&self, client_id: &str) {
        match self.registry.leave_room(client_id).await {
            Ok(Some(departure)) => self.announce_departure(client_id, departure).await,
            Ok(None) => {}
            Err(e) => {
                error!(client_id = %client_id, error = %e, "Leave failed");
            }
        }
    }

    async fn announce_departure(&self, client_id: &str, departure: Departure) {
        self.router
            .broadcast(
                &departure.members,
                RoomEvent::PlayerLeft {
                    room: departure.room,
                    client: client_id.to_string(),
                    members: departure.members.clone(),
                },
            )
            .await;
    }
}

/// Handle and command sender for the broker.
///
/// Cloneable; every session and websocket connection holds one. Request
/// methods resolve once the broker has applied the mutation and sent the
/// acknowledgement back.
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl BrokerHandle {
    /// Registers a client's event sink and waits for the acknowledgement.
    pub async fn connect(&self, client_id: ClientId, events_tx: EventSink) -> Result<(), BrokerError> {
        let (reply, res_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Connect {
                client_id,
                events_tx,
                reply,
            })
            .map_err(|_| BrokerError::Closed)?;
        res_rx.await.map_err(|_| BrokerError::Closed)
    }

    pub async fn create_room(&self, client_id: &str) -> Result<RoomCode, BrokerError> {
        let (reply, res_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CreateRoom {
                client_id: client_id.to_string(),
                reply,
            })
            .map_err(|_| BrokerError::Closed)?;
        res_rx.await.map_err(|_| BrokerError::Closed)?.map_err(BrokerError::from)
    }

    pub async fn join_room(&self, client_id: &str, code: RoomCode) -> Result<bool, BrokerError> {
        let (reply, res_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::JoinRoom {
                client_id: client_id.to_string(),
                code,
                reply,
            })
            .map_err(|_| BrokerError::Closed)?;
        res_rx.await.map_err(|_| BrokerError::Closed)
    }

    /// Fire-and-forget leave; a closed broker means there is nothing left to
    /// leave.
    pub fn leave_room(&self, client_id: &str) {
        let _ = self.cmd_tx.send(Command::LeaveRoom {
            client_id: client_id.to_string(),
        });
    }

    /// Fire-and-forget relay of an opaque drawing payload.
    pub fn relay(&self, client_id: &str, kind: RelayKind, payload: Value) {
        let _ = self.cmd_tx.send(Command::Relay {
            client_id: client_id.to_string(),
            kind,
            payload,
        });
    }

    pub fn disconnect(&self, client_id: &str) {
        let _ = self.cmd_tx.send(Command::Disconnect {
            client_id: client_id.to_string(),
        });
    }
}
