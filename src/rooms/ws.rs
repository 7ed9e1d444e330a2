use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use crate::relay::{ChannelHandle, Relay};

#[debug_handler(state = crate::AppState)]
pub async fn relay_ws(State(relay): State<Arc<Relay>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |stream| run_connection(stream, relay))
}

/// Drive one client channel until it closes, then run the close path once.
async fn run_connection(stream: WebSocket, relay: Arc<Relay>) {
    let (handle, mut outbound) = ChannelHandle::new(relay.settings().outbound_queue_capacity);
    let user_id = relay.on_open(handle.clone());
    let (mut sender, mut receiver) = stream.split();

    let mut writer = tokio::spawn(async move {
        while let Some(msg) = outbound.recv().await {
            if sender.send(Message::Text(msg.to_string().into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            () = handle.closed() => {
                tracing::warn!(user_id = %user_id, "channel closed by relay");
                break;
            }
            _ = &mut writer => {
                tracing::debug!(user_id = %user_id, "writer stopped");
                break;
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(err) = relay.route(&handle, text.as_str()) {
                        if err.is_malformed() {
                            tracing::warn!(user_id = %user_id, "dropped envelope: {err}");
                        } else {
                            tracing::debug!(user_id = %user_id, "ignored envelope: {err}");
                        }
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::warn!(user_id = %user_id, size = data.len(), "dropped binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(user_id = %user_id, reason = ?frame, "client closed");
                    break;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Err(err)) => {
                    tracing::warn!(user_id = %user_id, "websocket error: {err}");
                    break;
                }
                None => break,
            }
        }
    }

    relay.on_close(&handle);
    writer.abort();
}
