use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};
use serde::{Deserialize, Serialize};

use crate::relay::Relay;

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub rooms: usize,
    pub connections: usize,
}

#[debug_handler(state = crate::AppState)]
pub async fn health(State(relay): State<Arc<Relay>>) -> Json<Health> {
    Json(Health {
        status: "Server is running".to_owned(),
        rooms: relay.rooms().len(),
        connections: relay.connections().len(),
    })
}
