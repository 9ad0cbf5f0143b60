//! Broadcast hub for dispatching events to connected sessions.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connected session
//! subscribes and filters events locally by its own room membership. This
//! is efficient for the single-process architecture.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::events::ServerEvent;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BROADCAST_CAPACITY: usize = 4096;

/// A payload broadcast to all connected sessions.
#[derive(Debug, Clone)]
pub struct BroadcastPayload {
    /// The room this event belongs to.
    pub room_id: String,
    /// A connection that must NOT receive the event (typing and read
    /// receipts exclude their originator).
    pub exclude: Option<String>,
    pub event: ServerEvent,
}

impl BroadcastPayload {
    /// An event for every subscriber of a room.
    pub fn to_room(room_id: impl Into<String>, event: ServerEvent) -> Self {
        Self {
            room_id: room_id.into(),
            exclude: None,
            event,
        }
    }

    /// An event for every subscriber of a room except one connection.
    pub fn to_room_excluding(
        room_id: impl Into<String>,
        connection_id: impl Into<String>,
        event: ServerEvent,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            exclude: Some(connection_id.into()),
            event,
        }
    }
}

/// The global broadcast hub. Cloneable — store in AppState.
#[derive(Clone)]
pub struct GatewayBroadcast {
    sender: broadcast::Sender<Arc<BroadcastPayload>>,
}

impl GatewayBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the broadcast channel. Each session calls this once to
    /// get its own receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<BroadcastPayload>> {
        self.sender.subscribe()
    }

    /// Dispatch an event to all connected sessions.
    pub fn dispatch(&self, payload: BroadcastPayload) {
        // send() returns Err if there are no receivers — that's fine.
        let _ = self.sender.send(Arc::new(payload));
    }
}

impl Default for GatewayBroadcast {
    fn default() -> Self {
        Self::new()
    }
}
