//! Wire-format events exchanged over the WebSocket.
//!
//! Both directions use JSON text frames shaped `{"event": <name>, "data":
//! <payload>}`. Incoming frames deserialize into a single tagged enum so
//! every handler is reached through one dispatch point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::message::ChatMessage;
use crate::models::participant::ParticipantProfile;

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "conversation:join")]
    ConversationJoin(String),
    #[serde(rename = "conversation:leave")]
    ConversationLeave(String),
    #[serde(rename = "message:send")]
    MessageSend(MessageSendPayload),
    #[serde(rename = "typing:start")]
    TypingStart(TypingPayload),
    #[serde(rename = "typing:stop")]
    TypingStop(TypingPayload),
    #[serde(rename = "message:read")]
    MessageRead(MessageReadPayload),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendPayload {
    pub conversation_id: String,
    pub content: String,
    /// Declared sender. Must match the connection's authenticated user.
    pub sender_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadPayload {
    pub conversation_id: String,
    pub message_id: String,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Emitted once per successful handshake.
    #[serde(rename = "connection:success", rename_all = "camelCase")]
    ConnectionSuccess {
        message: String,
        user_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Emitted once per successful join: history replay plus the active
    /// participant roster, scoped by conversation so a client tracking
    /// multiple rooms can disambiguate.
    #[serde(rename = "conversation:messages", rename_all = "camelCase")]
    ConversationMessages {
        conversation_id: String,
        messages: Vec<ChatMessage>,
        participants: Vec<ParticipantProfile>,
    },
    /// Fanned out to every room subscriber on a successful send, the
    /// sender's own connection included.
    #[serde(rename = "message:received", rename_all = "camelCase")]
    MessageReceived {
        conversation_id: String,
        message: ChatMessage,
    },
    /// Last-write-wins per (conversation, user) pair on the receiving side.
    #[serde(rename = "typing:update", rename_all = "camelCase")]
    TypingUpdate {
        conversation_id: String,
        user_id: String,
        is_typing: bool,
    },
    #[serde(rename = "message:read_update", rename_all = "camelCase")]
    ReadUpdate {
        conversation_id: String,
        message_id: String,
        read_by: String,
        read_at: DateTime<Utc>,
    },
    /// Emitted to the single offending connection only, never broadcast.
    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_join_with_bare_string_payload() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"conversation:join","data":"conv_1"}"#).unwrap();
        assert!(matches!(event, ClientEvent::ConversationJoin(id) if id == "conv_1"));
    }

    #[test]
    fn parses_message_send() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"message:send","data":{"conversationId":"conv_1","content":"hi","senderId":"usr_1"}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::MessageSend(p) => {
                assert_eq!(p.conversation_id, "conv_1");
                assert_eq!(p.content, "hi");
                assert_eq!(p.sender_id, "usr_1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_typing_and_read_events() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"typing:start","data":{"conversationId":"conv_1"}}"#)
                .unwrap();
        assert!(matches!(event, ClientEvent::TypingStart(_)));

        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"message:read","data":{"conversationId":"conv_1","messageId":"msg_1"}}"#,
        )
        .unwrap();
        assert!(matches!(event, ClientEvent::MessageRead(_)));
    }

    #[test]
    fn rejects_unknown_event_name() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"event":"conversation:nuke","data":"conv_1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_wrong_payload_shape() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"event":"message:send","data":"just a string"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn serializes_typing_update_with_camel_case_keys() {
        let event = ServerEvent::TypingUpdate {
            conversation_id: "conv_1".to_string(),
            user_id: "usr_1".to_string(),
            is_typing: true,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "typing:update");
        assert_eq!(json["data"]["conversationId"], "conv_1");
        assert_eq!(json["data"]["userId"], "usr_1");
        assert_eq!(json["data"]["isTyping"], true);
    }

    #[test]
    fn serializes_read_update() {
        let event = ServerEvent::ReadUpdate {
            conversation_id: "conv_1".to_string(),
            message_id: "msg_1".to_string(),
            read_by: "usr_2".to_string(),
            read_at: Utc::now(),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message:read_update");
        assert_eq!(json["data"]["messageId"], "msg_1");
        assert_eq!(json["data"]["readBy"], "usr_2");
        assert!(json["data"]["readAt"].is_string());
    }
}
