pub mod appresult;
pub mod config;
pub mod health;
pub mod relay;
pub mod rooms;

use std::sync::Arc;

use axum::{Router, extract::FromRef, routing::get};
use tower_http::trace::TraceLayer;

pub use appresult::{AppError, AppResult};
pub use config::Config;
use relay::Relay;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            relay: Arc::new(Relay::new(config.relay)),
            config: Arc::new(config),
        }
    }
}

/// Build the full HTTP + WebSocket application.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let cors = state.config.cors_layer()?;

    Ok(Router::new()
        .route("/api/health", get(health::health))
        .nest("/api/rooms", rooms::router())
        .merge(rooms::ws_router())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
