//! End-to-end tests: a real server on an ephemeral port, driven over
//! WebSocket and HTTP.

use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use session_relay::{AppState, Config};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_test_server() -> SocketAddr {
    let app = session_relay::app(AppState::new(Config::default())).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
        .await
        .expect("Failed to connect to WebSocket");
    socket
}

async fn send(socket: &mut Socket, value: Value) {
    socket.send(Message::text(value.to_string())).await.unwrap();
}

async fn recv(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("Expected a message within timeout")
            .expect("Socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn assert_silent(socket: &mut Socket) {
    let result = tokio::time::timeout(Duration::from_millis(300), socket.next()).await;
    assert!(result.is_err(), "Expected no message, got {result:?}");
}

/// Join `room_id` and return the `room-joined` reply.
async fn join(socket: &mut Socket, room_id: &str, user_name: &str) -> Value {
    send(socket, json!({"type": "join-room", "roomId": room_id, "userName": user_name})).await;
    let reply = recv(socket).await;
    assert_eq!(reply["type"], "room-joined");
    reply
}

fn user_ids(value: &Value) -> Vec<String> {
    value["participants"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["userId"].as_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn test_chat_is_seen_by_sender_and_peers() {
    let addr = start_test_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    let alice_id = join(&mut alice, "r1", "Alice").await["userId"].clone();
    let bob_joined = join(&mut bob, "r1", "Bob").await;
    let bob_id = bob_joined["userId"].clone();

    let notice = recv(&mut alice).await;
    assert_eq!(notice["type"], "user-joined");
    assert_eq!(notice["userId"], bob_id);
    assert_eq!(notice["userName"], "Bob");
    assert_eq!(user_ids(&notice), user_ids(&bob_joined));

    send(&mut alice, json!({"type": "chat", "roomId": "r1", "text": "hi"})).await;

    let to_bob = recv(&mut bob).await;
    let to_alice = recv(&mut alice).await;
    assert_eq!(to_bob, to_alice);
    assert_eq!(to_bob["type"], "chat");
    assert_eq!(to_bob["message"]["userId"], alice_id);
    assert_eq!(to_bob["message"]["userName"], "Alice");
    assert_eq!(to_bob["message"]["text"], "hi");

    let mut carol = connect(addr).await;
    let carol_joined = join(&mut carol, "r1", "Carol").await;
    assert_eq!(carol_joined["messages"].as_array().unwrap().len(), 1);
    assert_eq!(carol_joined["messages"][0]["text"], "hi");
}

#[tokio::test]
async fn test_abrupt_disconnect_sends_one_user_left() {
    let addr = start_test_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    let alice_id = join(&mut alice, "r3", "Alice").await["userId"].clone();
    let bob_id = join(&mut bob, "r3", "Bob").await["userId"].clone();
    assert_eq!(recv(&mut alice).await["type"], "user-joined");

    drop(alice);

    let left = recv(&mut bob).await;
    assert_eq!(left["type"], "user-left");
    assert_eq!(left["userId"], alice_id);
    assert_eq!(user_ids(&left), [bob_id.as_str().unwrap().to_owned()]);
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn test_signal_to_unknown_peer_is_dropped() {
    let addr = start_test_server().await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;

    let alice_id = join(&mut alice, "r4", "Alice").await["userId"].clone();
    let bob_id = join(&mut bob, "r4", "Bob").await["userId"].clone();
    recv(&mut alice).await;

    send(&mut alice, json!({"type": "signal", "to": "Z", "signal": {"type": "offer"}})).await;
    assert_silent(&mut bob).await;

    let payload = json!({"type": "answer", "sdp": "v=0\r\n"});
    send(&mut alice, json!({"type": "signal", "to": bob_id, "signal": payload.clone()})).await;

    let signal = recv(&mut bob).await;
    assert_eq!(signal, json!({"type": "signal", "from": alice_id, "signal": payload}));
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let addr = start_test_server().await;
    let mut alice = connect(addr).await;

    alice.send(Message::text("{not json")).await.unwrap();
    send(&mut alice, json!({"type": "teleport"})).await;
    send(&mut alice, json!({"type": "join-room"})).await;
    send(&mut alice, json!({"type": "chat", "roomId": "elsewhere", "text": "hi"})).await;
    assert_silent(&mut alice).await;

    let reply = join(&mut alice, "r5", "Alice").await;
    assert_eq!(user_ids(&reply).len(), 1);
}

#[tokio::test]
async fn test_rest_room_lifecycle() {
    let addr = start_test_server().await;
    let client = reqwest::Client::new();
    let base_url = format!("http://{addr}");

    let health: Value = client
        .get(format!("{base_url}/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "Server is running");

    let resp = client
        .post(format!("{base_url}/api/rooms/create"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let room_id = resp.json::<Value>().await.unwrap()["roomId"]
        .as_str()
        .unwrap()
        .to_owned();

    let mut alice = connect(addr).await;
    join(&mut alice, &room_id, "Alice").await;
    send(&mut alice, json!({"type": "chat", "roomId": room_id, "text": "one"})).await;
    recv(&mut alice).await;

    let status: Value = client
        .get(format!("{base_url}/api/rooms/{room_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["roomId"], room_id);
    assert_eq!(status["messageCount"], 1);
    assert_eq!(status["participants"][0]["userName"], "Alice");

    send(&mut alice, json!({"type": "leave-room", "roomId": room_id})).await;
    assert_silent(&mut alice).await;

    let resp = client
        .get(format!("{base_url}/api/rooms/{room_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Room not found");
}
