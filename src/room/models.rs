use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::code::RoomCode;
use crate::shared::ClientId;

/// A room and its membership.
///
/// Members are kept in join order; the first member is the host. When the
/// host leaves, the next member inherits the role implicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Room {
    pub code: RoomCode,
    pub members: Vec<ClientId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Room {
    /// Creates a new room with `creator` as sole member and host.
    pub fn new(code: RoomCode, creator: ClientId, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            code,
            members: vec![creator],
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// The current host, if the room has any members.
    pub fn host(&self) -> Option<&ClientId> {
        self.members.first()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self, capacity: usize) -> bool {
        self.members.len() >= capacity
    }

    pub fn has_member(&self, client_id: &str) -> bool {
        self.members.iter().any(|m| m == client_id)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Adds a member, ignoring duplicates.
    pub fn add_member(&mut self, client_id: ClientId) {
        if !self.has_member(&client_id) {
            self.members.push(client_id);
        }
    }

    pub fn remove_member(&mut self, client_id: &str) {
        self.members.retain(|m| m != client_id);
    }
}
