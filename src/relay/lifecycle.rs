//! Channel open/close and the membership, signal and chat handlers.
//!
//! Membership per connection is `unjoined -> joined(room) -> unjoined`.
//! Joining a second room while joined first leaves the current one.

use serde_json::Value;

use super::{
    ChannelHandle, ChatMessage, Delivery, Identity, Outgoing, Relay, RelayError, RoomId,
};

impl Relay {
    /// Register a newly opened channel and hand back its identity.
    pub fn on_open(&self, handle: ChannelHandle) -> Identity {
        let identity = self.connections.register(handle);
        tracing::info!(user_id = %identity, "client connected");
        identity
    }

    /// Tear down a closed channel: implicit leave, then the entry is gone.
    ///
    /// Safe to call more than once; only the first call does anything.
    pub fn on_close(&self, handle: &ChannelHandle) {
        let Some(conn) = self.connections.deregister(handle) else {
            return;
        };

        if let Some(room_id) = conn.current_room {
            self.depart(&conn.identity, &room_id);
        }

        tracing::info!(user_id = %conn.identity, "client disconnected");
    }

    pub fn join(&self, identity: &Identity, room_id: RoomId, user_name: String) -> Result<(), RelayError> {
        let conn = self
            .connections
            .lookup_by_identity(identity)
            .ok_or(RelayError::UnknownConnection)?;

        match conn.current_room {
            Some(current) if current == room_id => {
                tracing::debug!(user_id = %identity, room_id = %room_id, "already joined, ignoring");
                return Ok(());
            }
            Some(current) => {
                tracing::info!(user_id = %identity, from = %current, to = %room_id, "switching rooms");
                self.leave(identity, &current);
            }
            None => {}
        }

        self.connections.set_room(identity, Some(room_id.clone()));
        self.connections.set_display_name(identity, user_name.clone());

        // Both events are queued under the room lock, so no concurrent chat or
        // membership event for this room can slip in between.
        let outcome = self.rooms.add_participant_then(&room_id, identity, &user_name, |outcome| {
            self.fan_out(
                &outcome.participants,
                &Outgoing::UserJoined {
                    user_id: identity.clone(),
                    user_name: user_name.clone(),
                    participants: outcome.participants.clone(),
                },
                Some(identity),
            );
            self.send_to(
                identity,
                &Outgoing::RoomJoined {
                    room_id: room_id.clone(),
                    user_id: identity.clone(),
                    participants: outcome.participants.clone(),
                    messages: outcome.messages.clone(),
                },
            );
        });

        if outcome.inserted {
            tracing::info!(user_id = %identity, user_name = %user_name, room_id = %room_id, "joined room");
        }

        Ok(())
    }

    /// Explicit leave. A no-op unless the connection is joined to `room_id`.
    pub fn leave(&self, identity: &Identity, room_id: &str) {
        let Some(conn) = self.connections.lookup_by_identity(identity) else {
            return;
        };
        if conn.current_room.as_deref() != Some(room_id) {
            tracing::debug!(
                user_id = %identity,
                room_id,
                current = ?conn.current_room,
                "leave for a room the connection is not in"
            );
            return;
        }

        self.connections.set_room(identity, None);
        self.depart(identity, room_id);
    }

    fn depart(&self, identity: &Identity, room_id: &str) {
        let left = self.rooms.remove_participant_then(room_id, identity, |remaining| {
            self.fan_out(
                remaining,
                &Outgoing::UserLeft {
                    user_id: identity.clone(),
                    participants: remaining.to_vec(),
                },
                None,
            );
        });

        match left {
            Some(remaining) => {
                tracing::info!(user_id = %identity, room_id, remaining = remaining.len(), "left room");
            }
            None => tracing::debug!(user_id = %identity, room_id, "room already gone"),
        }
    }

    /// Forward an opaque negotiation payload from one identity to another.
    ///
    /// A missing or closed recipient drops the payload; the sender is never told.
    pub fn relay_signal(&self, from: &Identity, to: &Identity, payload: Value) -> Delivery {
        let delivery = self.send_to(
            to,
            &Outgoing::Signal {
                from: from.clone(),
                signal: payload,
            },
        );

        match delivery {
            Delivery::Delivered => {
                tracing::debug!(from = %from, to = %to, "signal relayed");
            }
            Delivery::Dropped => {
                tracing::warn!(from = %from, to = %to, "could not relay signal, recipient not connected");
            }
        }

        delivery
    }

    /// Append a chat message and send it to the whole room, sender included.
    pub fn chat(&self, from: &Identity, room_id: &str, text: String) -> Result<(), RelayError> {
        let conn = self
            .connections
            .lookup_by_identity(from)
            .ok_or(RelayError::UnknownConnection)?;

        if conn.current_room.as_deref() != Some(room_id) {
            return Err(RelayError::NotInRoom {
                identity: from.clone(),
                room_id: room_id.to_owned(),
            });
        }

        let len = text.chars().count();
        if len > self.settings.max_chat_length {
            return Err(RelayError::ChatTooLong {
                len,
                limit: self.settings.max_chat_length,
            });
        }

        let message = ChatMessage::new(from.clone(), conn.display_name, text);
        self.rooms.append_chat_then(room_id, message, |participants, message| {
            self.fan_out(
                participants,
                &Outgoing::Chat {
                    message: message.clone(),
                },
                None,
            );
        })
    }

    /// Change the display name used for this connection's future chat messages.
    pub fn rename(&self, identity: &Identity, user_name: String) {
        tracing::debug!(user_id = %identity, user_name = %user_name, "display name updated");
        self.connections.set_display_name(identity, user_name);
    }
}
