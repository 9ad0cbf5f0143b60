//! In-memory room membership registry.
//!
//! A room is the runtime broadcast group for one conversation (plus the
//! implicit `user:<id>` rooms). Rooms are created lazily on first join and
//! dropped when the last subscriber leaves; they are a cache over persisted
//! membership, never authoritative.
//!
//! Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
//! entry for non-poisoning, fast locking. Mutations never hold more than
//! one entry guard at a time. Join/leave for a given connection are issued
//! from that connection's own event loop, and `remove_connection` runs
//! after the loop exits, so cleanup is always the last writer for a
//! connection.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Mutex as OrderingMutex;

pub struct RoomRegistry {
    /// room id → subscribed connection ids.
    rooms: DashMap<String, Mutex<HashSet<String>>>,
    /// connection id → joined room ids (reverse index for disconnects).
    connections: DashMap<String, Mutex<HashSet<String>>>,
    /// Per-conversation lock serializing persist-then-broadcast so fan-out
    /// order matches persistence order within one conversation.
    ordering: DashMap<String, Arc<OrderingMutex<()>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            connections: DashMap::new(),
            ordering: DashMap::new(),
        }
    }

    /// Subscribe a connection to a room, creating the room if absent.
    pub fn join(&self, room_id: &str, connection_id: &str) {
        {
            let entry = self
                .connections
                .entry(connection_id.to_string())
                .or_insert_with(|| Mutex::new(HashSet::new()));
            entry.lock().insert(room_id.to_string());
        }
        {
            let entry = self
                .rooms
                .entry(room_id.to_string())
                .or_insert_with(|| Mutex::new(HashSet::new()));
            entry.lock().insert(connection_id.to_string());
        }
    }

    /// Unsubscribe a connection from a room. Unconditional: unknown rooms
    /// and non-members are a no-op.
    pub fn leave(&self, room_id: &str, connection_id: &str) {
        let emptied = match self.rooms.get(room_id) {
            Some(entry) => {
                let mut members = entry.lock();
                members.remove(connection_id);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            // Re-checked under the shard write lock; a concurrent join wins.
            self.rooms.remove_if(room_id, |_, members| members.lock().is_empty());
        }

        if let Some(entry) = self.connections.get(connection_id) {
            entry.lock().remove(room_id);
        }
    }

    /// Drop a connection from every room it joined. Idempotent: safe to
    /// call repeatedly and for unknown connections.
    pub fn remove_connection(&self, connection_id: &str) {
        let joined: Vec<String> = match self.connections.remove(connection_id) {
            Some((_, set)) => set.into_inner().into_iter().collect(),
            None => return,
        };

        for room_id in joined {
            let emptied = match self.rooms.get(&room_id) {
                Some(entry) => {
                    let mut members = entry.lock();
                    members.remove(connection_id);
                    members.is_empty()
                }
                None => false,
            };
            if emptied {
                self.rooms
                    .remove_if(&room_id, |_, members| members.lock().is_empty());
            }
        }
    }

    pub fn is_subscribed(&self, room_id: &str, connection_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|entry| entry.lock().contains(connection_id))
            .unwrap_or(false)
    }

    /// Number of connections currently subscribed to a room.
    pub fn occupancy(&self, room_id: &str) -> usize {
        self.rooms
            .get(room_id)
            .map(|entry| entry.lock().len())
            .unwrap_or(0)
    }

    /// The send-ordering lock for a conversation, created on first use.
    pub fn ordering_lock(&self, conversation_id: &str) -> Arc<OrderingMutex<()>> {
        self.ordering
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(OrderingMutex::new(())))
            .clone()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
