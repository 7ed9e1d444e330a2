use anyhow::Context;
use session_relay::{AppState, Config};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("session_relay=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.socket_addr();
    let production = config.production;

    let state = AppState::new(config);
    let _sweeper = state.relay.spawn_room_sweeper();
    let app = session_relay::app(state)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, production, "session relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
