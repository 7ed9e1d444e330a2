//! Connection registry: one entry per open channel.
//!
//! Entries are keyed by [`Identity`] with a secondary index from
//! [`ChannelId`] so the WebSocket task can resolve its own entry without
//! knowing the identity it was given.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::{Identity, RoomId};

/// A serialized outbound envelope, shared by every recipient of a broadcast.
pub type Outbound = Arc<str>;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The receiving side is gone.
    Closed,
    /// The outbound queue was full. The channel has been asked to close.
    Overflow,
}

/// Sending half of one client's channel.
///
/// Sends never wait: the queue is bounded and a full queue closes the channel
/// instead of stalling whoever is fanning out.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: ChannelId,
    tx: mpsc::Sender<Outbound>,
    shutdown: CancellationToken,
}

impl ChannelHandle {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = ChannelId(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed));

        (
            Self {
                id,
                tx,
                shutdown: CancellationToken::new(),
            },
            rx,
        )
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn send(&self, msg: Outbound) -> Result<(), SendFailure> {
        if self.shutdown.is_cancelled() {
            return Err(SendFailure::Closed);
        }

        match self.tx.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.shutdown.cancel();
                Err(SendFailure::Overflow)
            }
            Err(TrySendError::Closed(_)) => Err(SendFailure::Closed),
        }
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed() && !self.shutdown.is_cancelled()
    }

    /// Ask the owner of the receiving side to close the channel.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once [`close`](Self::close) was called or the queue overflowed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.shutdown.cancelled()
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub handle: ChannelHandle,
    pub identity: Identity,
    pub current_room: Option<RoomId>,
    pub display_name: String,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_identity: DashMap<Identity, Connection>,
    by_channel: DashMap<ChannelId, Identity>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened channel under a new identity.
    pub fn register(&self, handle: ChannelHandle) -> Identity {
        let channel_id = handle.id();

        let identity = loop {
            let candidate = Identity::generate();
            if let Entry::Vacant(entry) = self.by_identity.entry(candidate.clone()) {
                entry.insert(Connection {
                    handle,
                    identity: candidate.clone(),
                    current_room: None,
                    display_name: String::new(),
                });
                break candidate;
            }
        };

        self.by_channel.insert(channel_id, identity.clone());
        tracing::debug!(user_id = %identity, channel = %channel_id, "connection registered");

        identity
    }

    pub fn lookup_by_identity(&self, identity: &Identity) -> Option<Connection> {
        self.by_identity.get(identity).map(|entry| entry.value().clone())
    }

    pub fn lookup_by_channel(&self, handle: &ChannelHandle) -> Option<Connection> {
        let identity = self.by_channel.get(&handle.id())?.value().clone();
        self.lookup_by_identity(&identity)
    }

    pub fn set_room(&self, identity: &Identity, room_id: Option<RoomId>) {
        if let Some(mut entry) = self.by_identity.get_mut(identity) {
            entry.current_room = room_id;
        }
    }

    pub fn set_display_name(&self, identity: &Identity, name: impl Into<String>) {
        if let Some(mut entry) = self.by_identity.get_mut(identity) {
            entry.display_name = name.into();
        }
    }

    /// Remove the entry for `handle`, returning it if it was still present.
    ///
    /// Only the first call for a given channel gets `Some`, which is what lets
    /// the close path run its leave logic exactly once.
    pub fn deregister(&self, handle: &ChannelHandle) -> Option<Connection> {
        let (_, identity) = self.by_channel.remove(&handle.id())?;
        let (_, connection) = self.by_identity.remove(&identity)?;

        tracing::debug!(user_id = %identity, channel = %handle.id(), "connection deregistered");

        Some(connection)
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }
}
