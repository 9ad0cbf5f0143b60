//! In-memory store implementation, used by the test suites so the gateway
//! can be exercised without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use chat_common::id::{prefix, prefixed_ulid};

use crate::error::EventError;
use crate::models::conversation::Conversation;
use crate::models::message::{ChatMessage, Message};
use crate::models::participant::{Participant, ParticipantProfile};
use crate::models::user::{User, UserSummary};

use super::{MembershipStore, UserDirectory};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, User>>,
    conversations: Mutex<HashMap<String, Conversation>>,
    participants: Mutex<Vec<Participant>>,
    messages: Mutex<Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user and return its generated id.
    pub fn seed_user(&self, name: &str) -> String {
        let id = prefixed_ulid(prefix::USER);
        let user = User {
            id: id.clone(),
            name: name.to_string(),
            image: None,
            role: "member".to_string(),
            created_at: Utc::now(),
        };
        self.users.lock().insert(id.clone(), user);
        id
    }

    /// Insert a conversation with the given members and return its id.
    pub fn seed_conversation(&self, name: Option<&str>, member_ids: &[impl AsRef<str>]) -> String {
        let now = Utc::now();
        let id = prefixed_ulid(prefix::CONVERSATION);
        self.conversations.lock().insert(
            id.clone(),
            Conversation {
                id: id.clone(),
                name: name.map(|n| n.to_string()),
                is_group: member_ids.len() > 2,
                created_at: now,
                updated_at: now,
            },
        );

        let mut participants = self.participants.lock();
        for user_id in member_ids {
            participants.push(Participant {
                id: prefixed_ulid(prefix::PARTICIPANT),
                conversation_id: id.clone(),
                user_id: user_id.as_ref().to_string(),
                role: "member".to_string(),
                joined_at: now,
                left_at: None,
                last_read_at: None,
            });
        }

        id
    }

    /// Mark a participant as departed (sets `left_at`).
    pub fn depart(&self, conversation_id: &str, user_id: &str) {
        let mut participants = self.participants.lock();
        for p in participants.iter_mut() {
            if p.conversation_id == conversation_id && p.user_id == user_id {
                p.left_at = Some(Utc::now());
            }
        }
    }

    /// Insert a message directly, bypassing the pipeline.
    pub fn seed_message(&self, conversation_id: &str, sender_id: &str, content: &str) -> Message {
        let message = Message {
            id: prefixed_ulid(prefix::MESSAGE),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            read_at: None,
        };
        self.messages.lock().push(message.clone());
        message
    }

    /// Current `updated_at` of a conversation, for asserting touch behavior.
    pub fn conversation_updated_at(&self, conversation_id: &str) -> Option<DateTime<Utc>> {
        self.conversations
            .lock()
            .get(conversation_id)
            .map(|c| c.updated_at)
    }

    /// Current `last_read_at` of a (conversation, user) participant.
    pub fn participant_last_read(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Option<DateTime<Utc>> {
        self.participants
            .lock()
            .iter()
            .find(|p| p.conversation_id == conversation_id && p.user_id == user_id)
            .and_then(|p| p.last_read_at)
    }

    fn summary(&self, user_id: &str) -> UserSummary {
        self.users
            .lock()
            .get(user_id)
            .map(UserSummary::from)
            .unwrap_or_else(|| UserSummary {
                id: user_id.to_string(),
                name: String::new(),
                image: None,
            })
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn find_active_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, EventError> {
        Ok(self
            .participants
            .lock()
            .iter()
            .find(|p| {
                p.conversation_id == conversation_id && p.user_id == user_id && p.is_active()
            })
            .cloned())
    }

    async fn list_active_participants(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ParticipantProfile>, EventError> {
        let participants: Vec<Participant> = self
            .participants
            .lock()
            .iter()
            .filter(|p| p.conversation_id == conversation_id && p.is_active())
            .cloned()
            .collect();

        Ok(participants
            .iter()
            .map(|p| ParticipantProfile::hydrate(p, self.summary(&p.user_id)))
            .collect())
    }

    async fn list_recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, EventError> {
        let mut rows: Vec<Message> = self
            .messages
            .lock()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();

        // Stable sort: equal timestamps keep insertion order.
        rows.sort_by_key(|m| m.created_at);
        let start = rows.len().saturating_sub(limit.max(0) as usize);

        Ok(rows
            .split_off(start)
            .into_iter()
            .map(|m| {
                let sender = self.summary(&m.sender_id);
                ChatMessage::hydrate(m, sender)
            })
            .collect())
    }

    async fn create_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, EventError> {
        Ok(self.seed_message(conversation_id, sender_id, content))
    }

    async fn find_message(&self, message_id: &str) -> Result<Option<Message>, EventError> {
        Ok(self
            .messages
            .lock()
            .iter()
            .find(|m| m.id == message_id)
            .cloned())
    }

    async fn mark_message_read(&self, message_id: &str) -> Result<DateTime<Utc>, EventError> {
        let mut messages = self.messages.lock();
        let message = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| EventError::not_found("Message not found"))?;

        let read_at = *message.read_at.get_or_insert_with(Utc::now);
        Ok(read_at)
    }

    async fn update_participant_last_read(
        &self,
        participant_id: &str,
    ) -> Result<(), EventError> {
        let mut participants = self.participants.lock();
        if let Some(p) = participants.iter_mut().find(|p| p.id == participant_id) {
            p.last_read_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn touch_conversation(&self, conversation_id: &str) -> Result<(), EventError> {
        let mut conversations = self.conversations.lock();
        if let Some(c) = conversations.get_mut(conversation_id) {
            c.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, EventError> {
        Ok(self.users.lock().get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn active_participant_excludes_departed() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice");
        let bob = store.seed_user("bob");
        let conv = store.seed_conversation(None, &[&alice, &bob]);

        assert!(store
            .find_active_participant(&conv, &alice)
            .await
            .unwrap()
            .is_some());

        store.depart(&conv, &alice);

        assert!(store
            .find_active_participant(&conv, &alice)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_active_participant(&conv, &bob)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn active_participant_unknown_conversation_is_none() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice");
        assert!(store
            .find_active_participant("conv_missing", &alice)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn list_active_participants_hydrates_profiles() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice");
        let bob = store.seed_user("bob");
        let conv = store.seed_conversation(Some("pair"), &[&alice, &bob]);
        store.depart(&conv, &bob);

        let profiles = store.list_active_participants(&conv).await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].user_id, alice);
        assert_eq!(profiles[0].user.name, "alice");
    }

    #[tokio::test]
    async fn recent_messages_caps_at_limit_in_ascending_order() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice");
        let conv = store.seed_conversation(None, &[&alice]);

        for i in 0..60 {
            store.seed_message(&conv, &alice, &format!("m{i}"));
        }

        let replay = store.list_recent_messages(&conv, 50).await.unwrap();
        assert_eq!(replay.len(), 50);
        // Oldest ten were cut; the window starts at m10 and ends at m59.
        assert_eq!(replay[0].content, "m10");
        assert_eq!(replay[49].content, "m59");
        for pair in replay.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[tokio::test]
    async fn recent_messages_ignores_other_conversations() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice");
        let conv_a = store.seed_conversation(None, &[&alice]);
        let conv_b = store.seed_conversation(None, &[&alice]);

        store.seed_message(&conv_a, &alice, "in a");
        store.seed_message(&conv_b, &alice, "in b");

        let replay = store.list_recent_messages(&conv_a, 50).await.unwrap();
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].content, "in a");
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice");
        let conv = store.seed_conversation(None, &[&alice]);
        let message = store.seed_message(&conv, &alice, "hello");

        let first = store.mark_message_read(&message.id).await.unwrap();
        let second = store.mark_message_read(&message.id).await.unwrap();
        assert_eq!(first, second);

        let stored = store.find_message(&message.id).await.unwrap().unwrap();
        assert_eq!(stored.read_at, Some(first));
    }

    #[tokio::test]
    async fn mark_read_unknown_message_is_not_found() {
        let store = MemoryStore::new();
        let err = store.mark_message_read("msg_missing").await.unwrap_err();
        assert!(matches!(err, EventError::NotFound(_)));
    }

    #[tokio::test]
    async fn touch_conversation_bumps_updated_at() {
        let store = MemoryStore::new();
        let alice = store.seed_user("alice");
        let conv = store.seed_conversation(None, &[&alice]);

        let before = store.conversation_updated_at(&conv).unwrap();
        store.touch_conversation(&conv).await.unwrap();
        let after = store.conversation_updated_at(&conv).unwrap();
        assert!(after >= before);
    }
}
