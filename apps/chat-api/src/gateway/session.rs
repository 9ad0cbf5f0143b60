//! Per-connection state.

use chat_common::id::{prefix, prefixed_ulid};

use crate::auth::UserIdentity;
use crate::models::user::UserSummary;

/// State for a single WebSocket connection. The identity fields are set at
/// handshake time and immutable for the connection's lifetime;
/// re-authentication requires a new connection.
pub struct Session {
    /// Unique connection identifier (`conn_` prefixed ULID).
    pub connection_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_image: Option<String>,
    pub user_role: String,
}

impl Session {
    pub fn new(identity: UserIdentity) -> Self {
        Self {
            connection_id: prefixed_ulid(prefix::CONNECTION),
            user_id: identity.user_id,
            user_name: identity.name,
            user_image: identity.image,
            user_role: identity.role,
        }
    }

    /// The implicit per-user notification room every connection subscribes
    /// to at handshake time. Currently an extension point for direct
    /// per-user broadcasts.
    pub fn user_room(&self) -> String {
        format!("user:{}", self.user_id)
    }

    /// The profile slice embedded when this connection's user authors a
    /// message.
    pub fn sender_summary(&self) -> UserSummary {
        UserSummary {
            id: self.user_id.clone(),
            name: self.user_name.clone(),
            image: self.user_image.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> UserIdentity {
        UserIdentity {
            user_id: "usr_1".to_string(),
            name: "alice".to_string(),
            image: None,
            role: "member".to_string(),
        }
    }

    #[test]
    fn connection_ids_are_unique_and_prefixed() {
        let a = Session::new(identity());
        let b = Session::new(identity());
        assert!(a.connection_id.starts_with("conn_"));
        assert_ne!(a.connection_id, b.connection_id);
    }

    #[test]
    fn user_room_is_scoped_by_user_id() {
        let session = Session::new(identity());
        assert_eq!(session.user_room(), "user:usr_1");
    }
}
