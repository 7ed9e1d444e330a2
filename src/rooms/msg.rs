use serde::{Deserialize, Serialize};

use crate::relay::{Participant, Room, RoomId};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    pub room_id: RoomId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub room_id: RoomId,
    pub participants: Vec<Participant>,
    pub message_count: usize,
}

impl From<Room> for RoomStatus {
    fn from(room: Room) -> Self {
        Self {
            message_count: room.message_count(),
            room_id: room.id,
            participants: room.participants,
        }
    }
}
