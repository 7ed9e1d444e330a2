//! Fan-out of outbound envelopes.
//!
//! Delivery is best effort: a recipient that vanished or whose queue is full
//! is skipped and the fan-out carries on with the rest.

use std::sync::Arc;

use super::{ChannelHandle, Identity, Outbound, Outgoing, Participant, Relay, SendFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped,
}

pub(crate) fn encode(event: &Outgoing) -> Option<Outbound> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::from(json)),
        Err(err) => {
            tracing::error!(kind = event.kind(), "failed to encode envelope: {err:?}");
            None
        }
    }
}

fn deliver(handle: &ChannelHandle, identity: &Identity, msg: Outbound) -> Delivery {
    match handle.send(msg) {
        Ok(()) => Delivery::Delivered,
        Err(SendFailure::Closed) => {
            tracing::debug!(user_id = %identity, "recipient channel already closed");
            Delivery::Dropped
        }
        Err(SendFailure::Overflow) => {
            tracing::warn!(user_id = %identity, "outbound queue full, closing channel");
            Delivery::Dropped
        }
    }
}

impl Relay {
    /// Send `event` to every current member of `room_id` except `exclude`.
    ///
    /// Returns how many recipients accepted the envelope.
    pub fn broadcast(&self, room_id: &str, event: &Outgoing, exclude: Option<&Identity>) -> usize {
        self.rooms
            .with_participants(room_id, |participants| self.fan_out(participants, event, exclude))
            .unwrap_or_else(|| {
                tracing::debug!(room_id, kind = event.kind(), "broadcast to missing room");
                0
            })
    }

    /// Send `event` to each participant in `participants` except `exclude`.
    pub(crate) fn fan_out(
        &self,
        participants: &[Participant],
        event: &Outgoing,
        exclude: Option<&Identity>,
    ) -> usize {
        let Some(msg) = encode(event) else {
            return 0;
        };

        let mut delivered = 0;
        for participant in participants {
            if exclude == Some(&participant.identity) {
                continue;
            }
            let Some(conn) = self.connections.lookup_by_identity(&participant.identity) else {
                continue;
            };
            if deliver(&conn.handle, &conn.identity, msg.clone()) == Delivery::Delivered {
                delivered += 1;
            }
        }

        tracing::debug!(
            kind = event.kind(),
            recipients = participants.len(),
            delivered,
            "broadcast"
        );

        delivered
    }

    /// Send `event` to a single identity.
    pub fn send_to(&self, identity: &Identity, event: &Outgoing) -> Delivery {
        let Some(conn) = self.connections.lookup_by_identity(identity) else {
            return Delivery::Dropped;
        };
        if !conn.handle.is_open() {
            return Delivery::Dropped;
        }
        let Some(msg) = encode(event) else {
            return Delivery::Dropped;
        };

        deliver(&conn.handle, identity, msg)
    }
}
