//! Room registry and message routing engine.
//!
//! The relay tracks which connection belongs to which room, forwards opaque
//! negotiation payloads between two identities, and fans room events out to
//! every member. It never looks inside the payloads it forwards.
//!
//! All state lives in two registries owned by [`Relay`]:
//!
//! - [`ConnectionRegistry`] owns one [`Connection`] per open channel.
//! - [`RoomRegistry`] owns one [`Room`] per active room id.
//!
//! Both are internally synchronized and only reachable through their methods.
//! Every handler finishes queueing its outbound messages before it returns, and
//! each channel drains its queue in order, so a recipient never sees an event
//! before one that causally preceded it.

mod broadcast;
mod connections;
mod envelope;
mod error;
mod lifecycle;
mod registry;
mod router;

use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use broadcast::Delivery;
pub use connections::{
    ChannelHandle, ChannelId, Connection, ConnectionRegistry, Outbound, SendFailure,
};
pub use envelope::{Incoming, Outgoing};
pub use error::RelayError;
pub use registry::{ChatMessage, JoinOutcome, Participant, Room, RoomRegistry};

pub type RoomId = String;

/// Server-assigned token naming one connection for the lifetime of its channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    /// Longest accepted chat text, in characters.
    pub max_chat_length: usize,
    /// Chat messages kept per room. `None` keeps everything.
    pub chat_history_limit: Option<usize>,
    /// Outbound envelopes a single channel may have queued before it is closed.
    pub outbound_queue_capacity: usize,
    /// How long a room may sit with no participants before the sweeper drops
    /// it. `None` disables sweeping.
    pub empty_room_ttl: Option<Duration>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_chat_length: 2000,
            chat_history_limit: Some(1000),
            outbound_queue_capacity: 256,
            empty_room_ttl: Some(Duration::from_secs(600)),
        }
    }
}

/// The relay service: both registries plus the handlers that mutate them.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct Relay {
    connections: ConnectionRegistry,
    rooms: RoomRegistry,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            connections: ConnectionRegistry::new(),
            rooms: RoomRegistry::with_history_limit(settings.chat_history_limit),
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Periodically drop rooms that were created but never joined.
    ///
    /// Returns `None` when `empty_room_ttl` is unset.
    pub fn spawn_room_sweeper(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let ttl = self.settings.empty_room_ttl?;
        let period = (ttl / 4).max(Duration::from_secs(1));
        let relay = Arc::clone(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let removed = relay.rooms.sweep_empty(ttl);
                if removed > 0 {
                    tracing::debug!(removed, "swept empty rooms");
                }
            }
        }))
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelaySettings::default())
    }
}
