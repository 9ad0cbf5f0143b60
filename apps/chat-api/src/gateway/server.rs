//! WebSocket upgrade handler and per-connection event loop.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::auth;
use crate::AppState;

use super::events::{ClientEvent, ServerEvent};
use super::fanout::BroadcastPayload;
use super::handler;
use super::session::Session;

/// Application-level close code for a failed handshake.
const CLOSE_AUTH_FAILED: u16 = 4004;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

/// The bearer token travels as out-of-band connection metadata: a `token`
/// query parameter or an `Authorization` header on the upgrade request.
#[derive(Debug, Deserialize)]
struct ConnectParams {
    token: Option<String>,
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let token = params.token.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    });
    ws.on_upgrade(move |socket| handle_connection(socket, state, token))
}

async fn handle_connection(socket: WebSocket, state: AppState, token: Option<String>) {
    let (mut ws_tx, ws_rx) = socket.split();

    // Authenticate before anything else; no event is processed for a
    // connection that has not completed this.
    let identity = match auth::verify(&state, token.as_deref()).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(reason = err.reason(), "handshake rejected");
            let _ = send_event(
                &mut ws_tx,
                &ServerEvent::Error {
                    message: err.reason().to_string(),
                },
            )
            .await;
            let _ = send_close(&mut ws_tx, err.reason()).await;
            return;
        }
    };

    let session = Session::new(identity);

    // Every connection listens on its own notification room from the start.
    state.rooms.join(&session.user_room(), &session.connection_id);

    let ack = ServerEvent::ConnectionSuccess {
        message: "Connected".to_string(),
        user_id: session.user_id.clone(),
        timestamp: Utc::now(),
    };
    if send_event(&mut ws_tx, &ack).await.is_err() {
        state.rooms.remove_connection(&session.connection_id);
        return;
    }

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id,
        "connection established"
    );

    let broadcast_rx = state.broadcast.subscribe();
    run_session(&state, &session, ws_tx, ws_rx, broadcast_rx).await;

    // Unconditional, idempotent cleanup: drop the connection from every
    // room, whatever state the loop exited in.
    state.rooms.remove_connection(&session.connection_id);

    tracing::info!(
        connection_id = %session.connection_id,
        user_id = %session.user_id,
        "connection closed"
    );
}

/// Main session loop: dispatch client events, forward room broadcasts.
async fn run_session(
    state: &AppState,
    session: &Session,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<std::sync::Arc<BroadcastPayload>>,
) {
    loop {
        tokio::select! {
            // Client sends us a frame.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event: ClientEvent = match serde_json::from_str(&text) {
                            Ok(event) => event,
                            Err(_) => {
                                // Malformed frames are answered, not fatal.
                                let reply = ServerEvent::Error {
                                    message: "Malformed event payload".to_string(),
                                };
                                if send_event(&mut ws_tx, &reply).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                        if let Some(reply) = handler::dispatch(state, session, event).await {
                            if send_event(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, connection_id = %session.connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // Event from the fan-out hub.
            result = broadcast_rx.recv() => {
                match result {
                    Ok(payload) => {
                        if payload.exclude.as_deref() == Some(session.connection_id.as_str()) {
                            continue;
                        }
                        if !state.rooms.is_subscribed(&payload.room_id, &session.connection_id) {
                            continue;
                        }
                        if send_event(&mut ws_tx, &payload.event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(
                            connection_id = %session.connection_id,
                            skipped = n,
                            "session lagged behind broadcast"
                        );
                        // Continue — we just drop the missed events.
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }
}

async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap();
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with the handshake-failure code.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code: CLOSE_AUTH_FAILED,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
