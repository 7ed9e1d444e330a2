use thiserror::Error;

use super::{Identity, RoomId};

/// Every way a single inbound operation can fail.
///
/// None of these are fatal to the connection: the WebSocket task logs them
/// and keeps reading.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
    #[error("unknown message type {0:?}")]
    UnknownMessageType(String),
    #[error("no live connection for this channel")]
    UnknownConnection,
    #[error("{identity} is not joined to room {room_id}")]
    NotInRoom { identity: Identity, room_id: RoomId },
    #[error("chat text is {len} characters, limit is {limit}")]
    ChatTooLong { len: usize, limit: usize },
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
}

impl RelayError {
    /// Whether the error comes from the client sending something we could not
    /// read, as opposed to a stale or racing but well-formed request.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage(_) | Self::UnknownMessageType(_) | Self::ChatTooLong { .. }
        )
    }
}
