// Durable storage for room state
//
// The snapshot store is the sole durability boundary of the broker: any
// registry mutation not followed by a successful `save` does not survive a
// restart.

// Public API - what other modules can use
pub use file::JsonFileStore;

// Internal modules
mod file;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::room::code::RoomCode;
use crate::room::models::Room;
use crate::shared::ClientId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted form of one room: its member list plus creation/expiry
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomRecord {
    pub members: Vec<ClientId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Serialized form of the room registry. Round-trips losslessly through
/// `save`/`load`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub rooms: HashMap<RoomCode, RoomRecord>,
}

impl Snapshot {
    pub fn from_rooms(rooms: &HashMap<RoomCode, Room>) -> Self {
        Self {
            rooms: rooms
                .iter()
                .map(|(code, room)| {
                    (
                        code.clone(),
                        RoomRecord {
                            members: room.members.clone(),
                            created_at: room.created_at,
                            expires_at: room.expires_at,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn into_rooms(self) -> HashMap<RoomCode, Room> {
        self.rooms
            .into_iter()
            .map(|(code, record)| {
                (
                    code.clone(),
                    Room {
                        code,
                        members: record.members,
                        created_at: record.created_at,
                        expires_at: record.expires_at,
                    },
                )
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// Trait for snapshot storage backends
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Reads the most recently saved snapshot. Safe to call repeatedly;
    /// a missing backing file yields an empty snapshot.
    async fn load(&self) -> Result<Snapshot, StoreError>;

    /// Replaces the stored snapshot.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Discards all stored state.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory implementation of SnapshotStore for development and testing
#[derive(Default)]
pub struct InMemorySnapshotStore {
    inner: Mutex<Snapshot>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(self.inner.lock().unwrap().clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        *self.inner.lock().unwrap() = snapshot.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.inner.lock().unwrap() = Snapshot::default();
        Ok(())
    }
}
