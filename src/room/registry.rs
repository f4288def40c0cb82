use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::code::RoomCode;
use super::models::Room;
use crate::shared::ClientId;
use crate::store::{Snapshot, SnapshotStore, StoreError};

/// How many fresh codes to try before giving up on allocation. The code
/// space holds 36^6 entries, so hitting this bound means something is wrong
/// with the RNG, not the registry.
const MAX_CODE_ATTEMPTS: usize = 32;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to persist room snapshot: {0}")]
    Persistence(#[from] StoreError),

    #[error("could not allocate an unused room code")]
    CodeSpaceExhausted,
}

/// Result of attempting to join a room. Business failures are values, not
/// errors.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// The client was added. `members` is the full membership including the
    /// joiner; `departed` describes the room the client left to get here.
    Joined {
        members: Vec<ClientId>,
        departed: Option<Departure>,
    },
    /// The client was already in this room; nothing changed.
    AlreadyMember { members: Vec<ClientId> },
    RoomNotFound,
    RoomFull,
    RoomExpired,
}

/// Result of a successful room creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub code: RoomCode,
    /// The room the creator left to start this one, if any.
    pub departed: Option<Departure>,
}

/// A client's exit from a room: the vacated room and who remains in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub room: RoomCode,
    pub members: Vec<ClientId>,
    pub room_removed: bool,
}

#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Maximum members per room.
    pub capacity: usize,
    /// How long a room lives after creation.
    pub room_ttl: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            capacity: 8,
            room_ttl: Duration::hours(24),
        }
    }
}

/// The mutable registry state: rooms plus the derived client-to-room index.
///
/// Invariant: a client id appears in `membership` exactly when it appears in
/// the member list of the room the index points at. Every mutation below
/// updates both sides inside the same critical section.
#[derive(Debug, Clone, Default)]
struct RegistryInner {
    rooms: HashMap<RoomCode, Room>,
    membership: HashMap<ClientId, RoomCode>,
}

impl RegistryInner {
    fn snapshot(&self) -> Snapshot {
        Snapshot::from_rooms(&self.rooms)
    }

    /// Removes the client from whatever room it occupies, deleting the room
    /// when it becomes empty. Returns `None` for roomless clients.
    fn detach(&mut self, client_id: &str) -> Option<Departure> {
        let code = self.membership.remove(client_id)?;
        let Some(room) = self.rooms.get_mut(&code) else {
            warn!(client_id = %client_id, room = %code, "Membership index pointed at missing room");
            return None;
        };
        room.remove_member(client_id);
        if room.is_empty() {
            self.rooms.remove(&code);
            Some(Departure {
                room: code,
                members: Vec::new(),
                room_removed: true,
            })
        } else {
            let members = room.members.clone();
            Some(Departure {
                room: code,
                members,
                room_removed: false,
            })
        }
    }
}

/// Owns the set of rooms and their membership.
///
/// All mutating operations run under one mutex and persist the snapshot
/// before returning, so the in-memory view and the store never disagree for
/// longer than a single critical section. A failed save rolls the in-memory
/// mutation back.
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
    store: Arc<dyn SnapshotStore>,
    settings: RegistrySettings,
}

impl RoomRegistry {
    /// Restores the registry from the snapshot store. The loaded snapshot is
    /// the source of truth across restarts; the membership index is derived
    /// from the persisted member lists.
    pub async fn restore(
        store: Arc<dyn SnapshotStore>,
        settings: RegistrySettings,
    ) -> Result<Self, RegistryError> {
        let snapshot = store.load().await?;
        let rooms = snapshot.into_rooms();

        let mut membership = HashMap::new();
        for (code, room) in &rooms {
            for member in &room.members {
                membership.insert(member.clone(), code.clone());
            }
        }

        info!(room_count = rooms.len(), "Room registry restored");

        Ok(Self {
            inner: Mutex::new(RegistryInner { rooms, membership }),
            store,
            settings,
        })
    }

    /// Creates a new room with `client_id` as sole member and host. A client
    /// already in a room is moved out of it first.
    #[instrument(skip(self))]
    pub async fn create_room(&self, client_id: &str) -> Result<Created, RegistryError> {
        let mut inner = self.inner.lock().await;
        let prior = inner.clone();

        let departed = inner.detach(client_id);

        let mut code = RoomCode::generate();
        let mut attempts = 1;
        while inner.rooms.contains_key(&code) {
            if attempts >= MAX_CODE_ATTEMPTS {
                *inner = prior;
                return Err(RegistryError::CodeSpaceExhausted);
            }
            code = RoomCode::generate();
            attempts += 1;
        }

        let room = Room::new(code.clone(), client_id.to_string(), self.settings.room_ttl);
        inner.rooms.insert(code.clone(), room);
        inner.membership.insert(client_id.to_string(), code.clone());

        self.persist_or_rollback(&mut inner, prior).await?;

        info!(room = %code, client_id = %client_id, "Room created");
        Ok(Created { code, departed })
    }

    /// Adds `client_id` to the room named by `code`. Missing, full, and
    /// expired rooms are reported as outcomes, never as errors; re-joining
    /// the current room is an idempotent success.
    #[instrument(skip(self))]
    pub async fn join_room(
        &self,
        client_id: &str,
        code: &RoomCode,
    ) -> Result<JoinOutcome, RegistryError> {
        let mut inner = self.inner.lock().await;

        let Some(room) = inner.rooms.get(code) else {
            debug!(room = %code, "Join failed: room not found");
            return Ok(JoinOutcome::RoomNotFound);
        };

        if room.is_expired(Utc::now()) {
            debug!(room = %code, "Join failed: room expired");
            return Ok(JoinOutcome::RoomExpired);
        }

        if room.has_member(client_id) {
            debug!(room = %code, client_id = %client_id, "Client already in room");
            return Ok(JoinOutcome::AlreadyMember {
                members: room.members.clone(),
            });
        }

        if room.is_full(self.settings.capacity) {
            debug!(
                room = %code,
                member_count = room.member_count(),
                "Join failed: room full"
            );
            return Ok(JoinOutcome::RoomFull);
        }

        let prior = inner.clone();

        let departed = inner.detach(client_id);
        // The target room cannot have vanished: the client was not one of
        // its members, so detach cannot have emptied it.
        let Some(room) = inner.rooms.get_mut(code) else {
            *inner = prior;
            return Ok(JoinOutcome::RoomNotFound);
        };
        room.add_member(client_id.to_string());
        let members = room.members.clone();
        inner.membership.insert(client_id.to_string(), code.clone());

        self.persist_or_rollback(&mut inner, prior).await?;

        info!(
            room = %code,
            client_id = %client_id,
            member_count = members.len(),
            "Client joined room"
        );
        Ok(JoinOutcome::Joined { members, departed })
    }

    /// Removes `client_id` from its room, if any. Returns the departure so
    /// the caller can notify the remaining members.
    #[instrument(skip(self))]
    pub async fn leave_room(&self, client_id: &str) -> Result<Option<Departure>, RegistryError> {
        let mut inner = self.inner.lock().await;

        if !inner.membership.contains_key(client_id) {
            debug!(client_id = %client_id, "Leave was a no-op: client in no room");
            return Ok(None);
        }

        let prior = inner.clone();
        let departure = inner.detach(client_id);

        self.persist_or_rollback(&mut inner, prior).await?;

        if let Some(departure) = &departure {
            info!(
                room = %departure.room,
                client_id = %client_id,
                room_removed = departure.room_removed,
                "Client left room"
            );
        }
        Ok(departure)
    }

    /// Whether a live (non-expired) room with this code exists. Mutations
    /// persist synchronously under the registry lock, so the in-memory map
    /// is authoritative and no store reload is needed here.
    pub async fn room_exists(&self, code: &RoomCode) -> bool {
        let inner = self.inner.lock().await;
        inner
            .rooms
            .get(code)
            .is_some_and(|room| !room.is_expired(Utc::now()))
    }

    pub async fn clients_in_room(&self, code: &RoomCode) -> Vec<ClientId> {
        let inner = self.inner.lock().await;
        inner
            .rooms
            .get(code)
            .map(|room| room.members.clone())
            .unwrap_or_default()
    }

    pub async fn room_for_client(&self, client_id: &str) -> Option<RoomCode> {
        let inner = self.inner.lock().await;
        inner.membership.get(client_id).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.inner.lock().await.rooms.len()
    }

    /// Deletes every room whose TTL has elapsed, returning the removed
    /// codes. Members of removed rooms are dropped from the index as well.
    #[instrument(skip(self))]
    pub async fn remove_expired_rooms(&self) -> Result<Vec<RoomCode>, RegistryError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        let expired: Vec<RoomCode> = inner
            .rooms
            .iter()
            .filter(|(_, room)| room.is_expired(now))
            .map(|(code, _)| code.clone())
            .collect();

        if expired.is_empty() {
            return Ok(expired);
        }

        let prior = inner.clone();
        for code in &expired {
            if let Some(room) = inner.rooms.remove(code) {
                for member in &room.members {
                    inner.membership.remove(member);
                }
            }
        }

        self.persist_or_rollback(&mut inner, prior).await?;

        info!(count = expired.len(), "Expired rooms removed");
        Ok(expired)
    }

    /// Administrative reset: empties the registry and the store. Not wired
    /// to any client-facing interface.
    #[instrument(skip(self))]
    pub async fn clear_all_rooms(&self) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().await;
        self.store.clear().await?;
        inner.rooms.clear();
        inner.membership.clear();
        warn!("All rooms cleared");
        Ok(())
    }

    async fn persist_or_rollback(
        &self,
        inner: &mut RegistryInner,
        prior: RegistryInner,
    ) -> Result<(), RegistryError> {
        let snapshot = inner.snapshot();
        if let Err(e) = self.store.save(&snapshot).await {
            warn!(error = %e, "Snapshot save failed, rolling back mutation");
            *inner = prior;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_utils::FailingSnapshotStore;
    use crate::store::InMemorySnapshotStore;

    async fn test_registry() -> RoomRegistry {
        test_registry_with(RegistrySettings::default()).await
    }

    async fn test_registry_with(settings: RegistrySettings) -> RoomRegistry {
        RoomRegistry::restore(Arc::new(InMemorySnapshotStore::new()), settings)
            .await
            .unwrap()
    }

    /// Asserts the bidirectional room/index invariant over the whole
    /// registry.
    async fn assert_consistent(registry: &RoomRegistry) {
        let inner = registry.inner.lock().await;
        for (client, code) in &inner.membership {
            let room = inner
                .rooms
                .get(code)
                .unwrap_or_else(|| panic!("index points at missing room {code}"));
            assert!(
                room.has_member(client),
                "index says {client} is in {code} but the room disagrees"
            );
        }
        for (code, room) in &inner.rooms {
            for member in &room.members {
                assert_eq!(
                    inner.membership.get(member),
                    Some(code),
                    "{member} is in {code}'s member list but the index disagrees"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_create_room_makes_creator_sole_member_and_host() {
        let registry = test_registry().await;

        let created = registry.create_room("alice").await.unwrap();
        assert!(created.departed.is_none());

        let members = registry.clients_in_room(&created.code).await;
        assert_eq!(members, vec!["alice".to_string()]);
        assert!(registry.room_exists(&created.code).await);
        assert_eq!(
            registry.room_for_client("alice").await,
            Some(created.code.clone())
        );
        assert_consistent(&registry).await;
    }

    #[tokio::test]
    async fn test_create_room_generates_unique_codes() {
        let registry = test_registry().await;

        let a = registry.create_room("alice").await.unwrap();
        let b = registry.create_room("bob").await.unwrap();
        assert_ne!(a.code, b.code);
        assert_eq!(registry.room_count().await, 2);
    }

    #[tokio::test]
    async fn test_create_room_moves_creator_out_of_previous_room() {
        let registry = test_registry().await;

        let first = registry.create_room("alice").await.unwrap();
        registry.create_room("bob").await.unwrap();
        let outcome = registry.join_room("bob", &first.code).await.unwrap();
        assert!(matches!(outcome, JoinOutcome::Joined { .. }));

        // Bob starts a fresh room; the old one must report his departure
        let second = registry.create_room("bob").await.unwrap();
        let departed = second.departed.expect("bob left alice's room");
        assert_eq!(departed.room, first.code);
        assert_eq!(departed.members, vec!["alice".to_string()]);
        assert!(!departed.room_removed);
        assert_consistent(&registry).await;
    }

    #[tokio::test]
    async fn test_join_room_success_and_membership() {
        let registry = test_registry().await;

        let created = registry.create_room("alice").await.unwrap();
        let outcome = registry.join_room("bob", &created.code).await.unwrap();

        match outcome {
            JoinOutcome::Joined { members, departed } => {
                assert_eq!(members, vec!["alice".to_string(), "bob".to_string()]);
                assert!(departed.is_none());
            }
            other => panic!("expected Joined, got {other:?}"),
        }
        assert_consistent(&registry).await;
    }

    #[tokio::test]
    async fn test_join_nonexistent_room_leaves_index_unchanged() {
        let registry = test_registry().await;
        let code = RoomCode::parse("ZZZZZZ").unwrap();

        let outcome = registry.join_room("bob", &code).await.unwrap();
        assert_eq!(outcome, JoinOutcome::RoomNotFound);
        assert_eq!(registry.room_for_client("bob").await, None);
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_rejoin_same_room_is_idempotent() {
        let registry = test_registry().await;

        let created = registry.create_room("alice").await.unwrap();
        registry.join_room("bob", &created.code).await.unwrap();
        let outcome = registry.join_room("bob", &created.code).await.unwrap();

        match outcome {
            JoinOutcome::AlreadyMember { members } => {
                assert_eq!(members, vec!["alice".to_string(), "bob".to_string()]);
            }
            other => panic!("expected AlreadyMember, got {other:?}"),
        }

        let members = registry.clients_in_room(&created.code).await;
        assert_eq!(
            members.iter().filter(|m| *m == "bob").count(),
            1,
            "bob must not be duplicated"
        );
        assert_consistent(&registry).await;
    }

    #[tokio::test]
    async fn test_join_full_room_fails() {
        let registry = test_registry_with(RegistrySettings {
            capacity: 2,
            ..Default::default()
        })
        .await;

        let created = registry.create_room("alice").await.unwrap();
        registry.join_room("bob", &created.code).await.unwrap();

        let outcome = registry.join_room("carol", &created.code).await.unwrap();
        assert_eq!(outcome, JoinOutcome::RoomFull);
        assert_eq!(registry.room_for_client("carol").await, None);
    }

    #[tokio::test]
    async fn test_join_expired_room_fails() {
        let registry = test_registry_with(RegistrySettings {
            room_ttl: Duration::zero(),
            ..Default::default()
        })
        .await;

        let created = registry.create_room("alice").await.unwrap();
        let outcome = registry.join_room("bob", &created.code).await.unwrap();
        assert_eq!(outcome, JoinOutcome::RoomExpired);
        assert!(!registry.room_exists(&created.code).await);
    }

    #[tokio::test]
    async fn test_join_moves_client_between_rooms() {
        let registry = test_registry().await;

        let first = registry.create_room("alice").await.unwrap();
        let second = registry.create_room("bob").await.unwrap();

        let outcome = registry.join_room("alice", &second.code).await.unwrap();
        match outcome {
            JoinOutcome::Joined { departed, .. } => {
                let departed = departed.expect("alice left her own room");
                assert_eq!(departed.room, first.code);
                assert!(departed.room_removed, "her room emptied out");
            }
            other => panic!("expected Joined, got {other:?}"),
        }

        assert!(!registry.room_exists(&first.code).await);
        assert_eq!(
            registry.room_for_client("alice").await,
            Some(second.code.clone())
        );
        assert_consistent(&registry).await;
    }

    #[tokio::test]
    async fn test_leave_room_removes_empty_room() {
        let registry = test_registry().await;

        let created = registry.create_room("alice").await.unwrap();
        let departure = registry.leave_room("alice").await.unwrap().unwrap();

        assert_eq!(departure.room, created.code);
        assert!(departure.room_removed);
        assert!(!registry.room_exists(&created.code).await);
        assert_eq!(registry.room_for_client("alice").await, None);
        assert_consistent(&registry).await;
    }

    #[tokio::test]
    async fn test_leave_room_reassigns_host() {
        let registry = test_registry().await;

        let created = registry.create_room("alice").await.unwrap();
        registry.join_room("bob", &created.code).await.unwrap();
        registry.join_room("carol", &created.code).await.unwrap();

        let departure = registry.leave_room("alice").await.unwrap().unwrap();
        assert_eq!(
            departure.members,
            vec!["bob".to_string(), "carol".to_string()]
        );

        // First remaining member is the new host
        let members = registry.clients_in_room(&created.code).await;
        assert_eq!(members.first(), Some(&"bob".to_string()));
        assert_consistent(&registry).await;
    }

    #[tokio::test]
    async fn test_leave_room_without_membership_is_noop() {
        let registry = test_registry().await;
        assert!(registry.leave_room("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_round_trips_registry_state() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let registry = RoomRegistry::restore(store.clone(), RegistrySettings::default())
            .await
            .unwrap();

        let created = registry.create_room("alice").await.unwrap();
        registry.join_room("bob", &created.code).await.unwrap();

        // A fresh registry over the same store sees the same world
        let restored = RoomRegistry::restore(store, RegistrySettings::default())
            .await
            .unwrap();
        assert!(restored.room_exists(&created.code).await);
        assert_eq!(
            restored.clients_in_room(&created.code).await,
            vec!["alice".to_string(), "bob".to_string()]
        );
        assert_eq!(
            restored.room_for_client("bob").await,
            Some(created.code.clone())
        );
        assert_consistent(&restored).await;
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back_join() {
        let store = Arc::new(FailingSnapshotStore::new());
        let registry = RoomRegistry::restore(store.clone(), RegistrySettings::default())
            .await
            .unwrap();

        let created = registry.create_room("alice").await.unwrap();

        store.fail_next_saves(true);
        let result = registry.join_room("bob", &created.code).await;
        assert!(matches!(result, Err(RegistryError::Persistence(_))));

        // The in-memory mutation must not have survived
        assert_eq!(
            registry.clients_in_room(&created.code).await,
            vec!["alice".to_string()]
        );
        assert_eq!(registry.room_for_client("bob").await, None);
        assert_consistent(&registry).await;

        store.fail_next_saves(false);
        let outcome = registry.join_room("bob", &created.code).await.unwrap();
        assert!(matches!(outcome, JoinOutcome::Joined { .. }));
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back_create() {
        let store = Arc::new(FailingSnapshotStore::new());
        let registry = RoomRegistry::restore(store.clone(), RegistrySettings::default())
            .await
            .unwrap();

        store.fail_next_saves(true);
        assert!(registry.create_room("alice").await.is_err());
        assert_eq!(registry.room_count().await, 0);
        assert_eq!(registry.room_for_client("alice").await, None);
    }

    #[tokio::test]
    async fn test_remove_expired_rooms_purges_membership() {
        let registry = test_registry_with(RegistrySettings {
            room_ttl: Duration::milliseconds(1),
            ..Default::default()
        })
        .await;

        let created = registry.create_room("alice").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let removed = registry.remove_expired_rooms().await.unwrap();
        assert_eq!(removed, vec![created.code.clone()]);
        assert!(!registry.room_exists(&created.code).await);
        assert_eq!(registry.room_for_client("alice").await, None);
        assert_consistent(&registry).await;
    }

    #[tokio::test]
    async fn test_remove_expired_rooms_preserves_live_rooms() {
        let registry = test_registry().await;
        let created = registry.create_room("alice").await.unwrap();

        let removed = registry.remove_expired_rooms().await.unwrap();
        assert!(removed.is_empty());
        assert!(registry.room_exists(&created.code).await);
    }

    #[tokio::test]
    async fn test_clear_all_rooms_empties_registry_and_store() {
        let store = Arc::new(InMemorySnapshotStore::new());
        let registry = RoomRegistry::restore(store.clone(), RegistrySettings::default())
            .await
            .unwrap();

        registry.create_room("alice").await.unwrap();
        registry.create_room("bob").await.unwrap();

        registry.clear_all_rooms().await.unwrap();
        assert_eq!(registry.room_count().await, 0);
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_joins_respect_capacity() {
        let registry = Arc::new(
            test_registry_with(RegistrySettings {
                capacity: 4,
                ..Default::default()
            })
            .await,
        );

        let created = registry.create_room("host").await.unwrap();

        let handles = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let code = created.code.clone();
                tokio::spawn(async move {
                    registry
                        .join_room(&format!("player-{i}"), &code)
                        .await
                        .unwrap()
                })
            })
            .collect::<Vec<_>>();

        let results = futures::future::join_all(handles).await;
        let successes = results
            .into_iter()
            .filter(|r| matches!(r.as_ref().unwrap(), JoinOutcome::Joined { .. }))
            .count();

        // Host occupies one slot; exactly three joins can succeed
        assert_eq!(successes, 3);
        assert_eq!(registry.clients_in_room(&created.code).await.len(), 4);
        assert_consistent(&registry).await;
    }

    #[tokio::test]
    async fn test_membership_index_consistent_under_mixed_operations() {
        let registry = test_registry().await;

        let a = registry.create_room("alice").await.unwrap();
        let b = registry.create_room("bob").await.unwrap();
        registry.join_room("carol", &a.code).await.unwrap();
        registry.join_room("dave", &b.code).await.unwrap();
        registry.join_room("carol", &b.code).await.unwrap();
        registry.leave_room("bob").await.unwrap();
        registry.join_room("alice", &b.code).await.unwrap();
        registry.leave_room("dave").await.unwrap();

        assert_consistent(&registry).await;
    }
}
