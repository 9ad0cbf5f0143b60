#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use tokio::time;
use tokio_tungstenite::tungstenite;

use chat_api::auth::TokenClaims;
use chat_api::config::Config;
use chat_api::gateway::fanout::GatewayBroadcast;
use chat_api::gateway::rooms::RoomRegistry;
use chat_api::store::MemoryStore;
use chat_api::AppState;

pub const TEST_SECRET: &str = "test-secret";

pub type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Build an AppState backed by the in-memory store.
pub fn test_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        store: store.clone(),
        users: store.clone(),
        config: Arc::new(Config {
            database_url: String::new(),
            token_secret: TEST_SECRET.to_string(),
            port: 0,
        }),
        rooms: Arc::new(RoomRegistry::new()),
        broadcast: Arc::new(GatewayBroadcast::new()),
    };
    (state, store)
}

/// Start an actual TCP server for WebSocket testing. Returns (addr, state,
/// store). The server runs in the background.
pub async fn start_ws_server() -> (SocketAddr, AppState, Arc<MemoryStore>) {
    let (state, store) = test_state();
    let app = chat_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, store)
}

/// Mint a bearer token the way the identity collaborator would.
pub fn mint_token(user_id: &str) -> String {
    mint_token_with_secret(TEST_SECRET, user_id)
}

pub fn mint_token_with_secret(secret: &str, user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("mint token")
}

/// Open a WebSocket against the gateway with the given token query value.
pub async fn connect_raw(addr: SocketAddr, token: Option<&str>) -> WsClient {
    let url = match token {
        Some(t) => format!("ws://{addr}/ws?token={t}"),
        None => format!("ws://{addr}/ws"),
    };
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Connect and consume the `connection:success` acknowledgment.
pub async fn connect(addr: SocketAddr, token: &str) -> WsClient {
    let mut ws = connect_raw(addr, Some(token)).await;
    let ack = recv_json(&mut ws).await;
    assert_eq!(ack["event"], "connection:success", "handshake ack: {ack}");
    ws
}

/// Send one client event frame.
pub async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

/// Read the next text frame as JSON, failing after five seconds.
pub async fn recv_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("parse event")
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("expected text frame, got: {other:?}"),
        }
    }
}

/// Assert that no frame arrives within the given window.
pub async fn expect_silence(ws: &mut WsClient, window: Duration) {
    let result = time::timeout(window, ws.next()).await;
    if let Ok(Some(Ok(msg))) = result {
        panic!("expected silence, got: {msg:?}");
    }
}

/// Read frames until the connection closes, asserting a close frame shows
/// up within five seconds.
pub async fn expect_close(ws: &mut WsClient) {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for close");
        match msg {
            Some(Ok(tungstenite::Message::Close(_))) | None => return,
            Some(Ok(_)) => continue,
            Some(Err(_)) => return,
        }
    }
}

pub fn join_event(conversation_id: &str) -> serde_json::Value {
    serde_json::json!({ "event": "conversation:join", "data": conversation_id })
}

pub fn leave_event(conversation_id: &str) -> serde_json::Value {
    serde_json::json!({ "event": "conversation:leave", "data": conversation_id })
}

pub fn send_event(conversation_id: &str, sender_id: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "event": "message:send",
        "data": {
            "conversationId": conversation_id,
            "content": content,
            "senderId": sender_id,
        }
    })
}

pub fn typing_event(conversation_id: &str, start: bool) -> serde_json::Value {
    let name = if start { "typing:start" } else { "typing:stop" };
    serde_json::json!({ "event": name, "data": { "conversationId": conversation_id } })
}

pub fn read_event(conversation_id: &str, message_id: &str) -> serde_json::Value {
    serde_json::json!({
        "event": "message:read",
        "data": { "conversationId": conversation_id, "messageId": message_id }
    })
}
