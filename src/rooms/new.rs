use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};

use crate::relay::Relay;

use super::msg::CreatedRoom;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(State(relay): State<Arc<Relay>>) -> Json<CreatedRoom> {
    let room_id = relay.rooms().create();
    tracing::info!(room_id = %room_id, "room allocated");

    Json(CreatedRoom { room_id })
}
