//! Room registry: membership and chat history per room id.
//!
//! Each operation is one critical section on that room's map entry, so a
//! room sees at most one mutation at a time while unrelated rooms proceed in
//! parallel. A room is removed the moment its last participant leaves.
//!
//! The `*_then` variants run a callback while the entry is still held. The
//! relay enqueues the resulting events there, so every member observes a
//! room's events in the order its mutations happened. Callbacks must not
//! touch this registry again.

use std::{collections::VecDeque, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Identity, RelayError, RoomId};

/// Room-scoped view of a connection, captured at join time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "userId")]
    pub identity: Identity,
    #[serde(rename = "userName")]
    pub display_name: String,
    #[serde(rename = "joinedAt", with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "userId")]
    pub sender_identity: Identity,
    #[serde(rename = "userName")]
    pub sender_display_name: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ChatMessage {
    /// Stamp a new message with the server clock.
    pub fn new(sender_identity: Identity, sender_display_name: String, text: String) -> Self {
        Self {
            sender_identity,
            sender_display_name,
            text,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    /// In join order, unique by identity.
    pub participants: Vec<Participant>,
    pub chat_log: VecDeque<ChatMessage>,
    pub created_at: OffsetDateTime,
}

impl Room {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            participants: Vec::new(),
            chat_log: VecDeque::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.participants.iter().any(|p| &p.identity == identity)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.chat_log.iter().cloned().collect()
    }

    pub fn message_count(&self) -> usize {
        self.chat_log.len()
    }
}

/// Result of [`RoomRegistry::add_participant`].
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// The full participant list after the call.
    pub participants: Vec<Participant>,
    /// Chat history at the moment of the join.
    pub messages: Vec<ChatMessage>,
    /// `false` when the identity was already a member and nothing changed.
    pub inserted: bool,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Room>,
    history_limit: Option<usize>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_limit(history_limit: Option<usize>) -> Self {
        Self {
            rooms: DashMap::new(),
            history_limit,
        }
    }

    pub fn get_or_create(&self, room_id: &str) -> Room {
        self.rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| create_room(room_id))
            .value()
            .clone()
    }

    /// Allocate a fresh room id and register an empty room under it.
    pub fn create(&self) -> RoomId {
        loop {
            let room_id = Uuid::new_v4().to_string();
            if let Entry::Vacant(entry) = self.rooms.entry(room_id.clone()) {
                entry.insert(create_room(&room_id));
                return room_id;
            }
        }
    }

    pub fn add_participant(
        &self,
        room_id: &str,
        identity: &Identity,
        display_name: &str,
    ) -> JoinOutcome {
        self.add_participant_then(room_id, identity, display_name, |_| {})
    }

    /// Like [`add_participant`](Self::add_participant), calling `on_inserted`
    /// under the room's lock when the identity was actually added.
    pub fn add_participant_then(
        &self,
        room_id: &str,
        identity: &Identity,
        display_name: &str,
        on_inserted: impl FnOnce(&JoinOutcome),
    ) -> JoinOutcome {
        let mut room = self
            .rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| create_room(room_id));

        let inserted = if room.contains(identity) {
            tracing::debug!(room_id, user_id = %identity, "duplicate join ignored");
            false
        } else {
            room.participants.push(Participant {
                identity: identity.clone(),
                display_name: display_name.to_owned(),
                joined_at: OffsetDateTime::now_utc(),
            });
            tracing::info!(
                room_id,
                user_id = %identity,
                participants = room.participants.len(),
                "participant added"
            );
            true
        };

        let outcome = JoinOutcome {
            participants: room.participants.clone(),
            messages: room.messages(),
            inserted,
        };
        if inserted {
            on_inserted(&outcome);
        }
        outcome
    }

    /// Remove `identity` from the room and return who is left.
    ///
    /// `None` means the room was already gone. An emptied room is deleted, so
    /// a later join under the same id starts from scratch.
    pub fn remove_participant(&self, room_id: &str, identity: &Identity) -> Option<Vec<Participant>> {
        self.remove_participant_then(room_id, identity, |_| {})
    }

    /// Like [`remove_participant`](Self::remove_participant), calling
    /// `on_removed` with the remaining members under the room's lock. Not
    /// called when the room was emptied.
    pub fn remove_participant_then(
        &self,
        room_id: &str,
        identity: &Identity,
        on_removed: impl FnOnce(&[Participant]),
    ) -> Option<Vec<Participant>> {
        let Entry::Occupied(mut entry) = self.rooms.entry(room_id.to_owned()) else {
            return None;
        };

        entry
            .get_mut()
            .participants
            .retain(|p| &p.identity != identity);

        if entry.get().participants.is_empty() {
            entry.remove();
            tracing::info!(room_id, "room empty, deleted");
            return Some(Vec::new());
        }

        on_removed(&entry.get().participants);
        Some(entry.get().participants.clone())
    }

    pub fn append_chat(&self, room_id: &str, message: ChatMessage) -> Result<(), RelayError> {
        self.append_chat_then(room_id, message, |_, _| {})
    }

    /// Like [`append_chat`](Self::append_chat), calling `on_appended` with the
    /// current members and the new message under the room's lock.
    pub fn append_chat_then(
        &self,
        room_id: &str,
        message: ChatMessage,
        on_appended: impl FnOnce(&[Participant], &ChatMessage),
    ) -> Result<(), RelayError> {
        let Some(mut room) = self.rooms.get_mut(room_id) else {
            tracing::error!(room_id, "chat message for a room that does not exist");
            return Err(RelayError::RoomNotFound(room_id.to_owned()));
        };

        on_appended(&room.participants, &message);
        room.chat_log.push_back(message);
        if let Some(limit) = self.history_limit {
            while room.chat_log.len() > limit {
                room.chat_log.pop_front();
            }
        }

        Ok(())
    }

    /// Run `f` over the room's members while holding a read lock on it.
    pub fn with_participants<R>(&self, room_id: &str, f: impl FnOnce(&[Participant]) -> R) -> Option<R> {
        self.rooms.get(room_id).map(|room| f(&room.participants))
    }

    /// Delete rooms that have had no participants for longer than `ttl`
    /// since creation. Returns how many were removed.
    pub fn sweep_empty(&self, ttl: Duration) -> usize {
        let cutoff = OffsetDateTime::now_utc() - ttl;
        let before = self.rooms.len();

        self.rooms.retain(|room_id, room| {
            let expired = room.participants.is_empty() && room.created_at <= cutoff;
            if expired {
                tracing::info!(room_id = %room_id, "empty room expired");
            }
            !expired
        });

        before.saturating_sub(self.rooms.len())
    }

    pub fn snapshot(&self, room_id: &str) -> Option<Room> {
        self.rooms.get(room_id).map(|room| room.value().clone())
    }

    pub fn participants(&self, room_id: &str) -> Option<Vec<Participant>> {
        self.rooms
            .get(room_id)
            .map(|room| room.participants.clone())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

fn create_room(room_id: &str) -> Room {
    tracing::info!(room_id, "room created");
    Room::new(room_id)
}
