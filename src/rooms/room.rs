use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, State},
};

use crate::{AppResult, appresult::AppError, relay::Relay};

use super::msg::RoomStatus;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room(
    Path(room_id): Path<String>,
    State(relay): State<Arc<Relay>>,
) -> AppResult<Json<RoomStatus>> {
    let Some(room) = relay.rooms().snapshot(&room_id) else {
        return Err(AppError::not_found("Room not found"));
    };

    Ok(Json(room.into()))
}
