//! Abstractions over the relational collaborators this service consumes.
//!
//! Backed by Postgres in production and an in-memory map in tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EventError;
use crate::models::message::{ChatMessage, Message};
use crate::models::participant::{Participant, ParticipantProfile};
use crate::models::user::User;

/// Read/write access to conversation membership and message persistence.
///
/// Schema ownership lives with the surrounding application; this trait is
/// the CRUD-level slice the messaging core needs.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// The participant record for (conversation, user) with a null
    /// `left_at`, if any. Departed participants are indistinguishable from
    /// users who never joined.
    async fn find_active_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, EventError>;

    /// All active participants of a conversation, hydrated with profiles.
    async fn list_active_participants(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ParticipantProfile>, EventError>;

    /// The most recent `limit` messages of a conversation, returned in
    /// ascending `created_at` order and hydrated with sender profiles.
    async fn list_recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, EventError>;

    /// Persist a new message with a server-generated id and timestamp.
    async fn create_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, EventError>;

    async fn find_message(&self, message_id: &str) -> Result<Option<Message>, EventError>;

    /// Set the message's `read_at` if currently null and return the
    /// effective timestamp. A second call is a no-op returning the original
    /// timestamp.
    async fn mark_message_read(&self, message_id: &str) -> Result<DateTime<Utc>, EventError>;

    async fn update_participant_last_read(&self, participant_id: &str)
        -> Result<(), EventError>;

    /// Bump the conversation's `updated_at` (recency ordering elsewhere in
    /// the application).
    async fn touch_conversation(&self, conversation_id: &str) -> Result<(), EventError>;
}

/// Identity resolution against the application's user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, EventError>;
}
