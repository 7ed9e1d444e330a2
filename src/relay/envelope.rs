//! Wire envelopes.
//!
//! Every frame is a JSON object whose `type` field names the variant. Variant
//! names are kebab-case and field names camelCase, e.g.
//! `{"type":"join-room","roomId":"r1","userName":"Alice"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, Identity, Participant, RelayError, RoomId};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Incoming {
    JoinRoom {
        room_id: RoomId,
        user_name: String,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    /// `signal` is forwarded untouched.
    Signal {
        to: Identity,
        signal: Value,
    },
    Chat {
        room_id: RoomId,
        text: String,
    },
    /// Rename the sending connection.
    UserInfo {
        user_name: String,
    },
}

impl Incoming {
    /// Every `type` tag this enum accepts.
    pub const KINDS: [&'static str; 5] = ["join-room", "leave-room", "signal", "chat", "user-info"];

    /// Decode one frame. A well-formed object with an unrecognised `type` is
    /// reported as [`RelayError::UnknownMessageType`] carrying that name.
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_str(raw)?;
        if let Some(kind) = value.get("type").and_then(Value::as_str) {
            if !Self::KINDS.contains(&kind) {
                return Err(RelayError::UnknownMessageType(kind.to_owned()));
            }
        }

        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Outgoing {
    /// Reply to the joining connection only.
    RoomJoined {
        room_id: RoomId,
        user_id: Identity,
        participants: Vec<Participant>,
        messages: Vec<ChatMessage>,
    },
    UserJoined {
        user_id: Identity,
        user_name: String,
        participants: Vec<Participant>,
    },
    UserLeft {
        user_id: Identity,
        participants: Vec<Participant>,
    },
    Signal {
        from: Identity,
        signal: Value,
    },
    Chat {
        message: ChatMessage,
    },
}

impl Outgoing {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomJoined { .. } => "room-joined",
            Self::UserJoined { .. } => "user-joined",
            Self::UserLeft { .. } => "user-left",
            Self::Signal { .. } => "signal",
            Self::Chat { .. } => "chat",
        }
    }
}
