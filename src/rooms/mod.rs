mod msg;
mod new;
mod room;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub use msg::{CreatedRoom, RoomStatus};

/// Room REST calls, mounted under `/api/rooms`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(new::new_room))
        .route("/{room_id}", get(room::room))
}

/// The relay channel. Clients connect to the site root; `/ws` is an alias.
pub fn ws_router() -> Router<AppState> {
    Router::new()
        .route("/", get(ws::relay_ws))
        .route("/ws", get(ws::relay_ws))
}
