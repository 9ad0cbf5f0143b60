//! Postgres-backed store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::OptionalExtension;

use chat_common::id::{prefix, prefixed_ulid};

use crate::db::pool::DbPool;
use crate::db::schema::{conversation_participants, conversations, messages, users};
use crate::error::EventError;
use crate::models::message::{ChatMessage, Message, NewMessage};
use crate::models::participant::{Participant, ParticipantProfile};
use crate::models::user::{User, UserSummary};

use super::{MembershipStore, UserDirectory};

pub struct PgStore {
    db: DbPool,
}

impl PgStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn find_active_participant(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, EventError> {
        let mut conn = self.db.get().await?;

        let participant = diesel_async::RunQueryDsl::get_result(
            conversation_participants::table
                .filter(conversation_participants::conversation_id.eq(conversation_id))
                .filter(conversation_participants::user_id.eq(user_id))
                .filter(conversation_participants::left_at.is_null())
                .select(Participant::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        Ok(participant)
    }

    async fn list_active_participants(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ParticipantProfile>, EventError> {
        let mut conn = self.db.get().await?;

        let rows: Vec<(Participant, User)> = diesel_async::RunQueryDsl::load(
            conversation_participants::table
                .inner_join(users::table)
                .filter(conversation_participants::conversation_id.eq(conversation_id))
                .filter(conversation_participants::left_at.is_null())
                .order(conversation_participants::joined_at.asc())
                .select((Participant::as_select(), User::as_select())),
            &mut conn,
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|(p, u)| ParticipantProfile::hydrate(&p, UserSummary::from(&u)))
            .collect())
    }

    async fn list_recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, EventError> {
        let mut conn = self.db.get().await?;

        // Newest `limit` rows first, then flipped into chronological order.
        let rows: Vec<(Message, User)> = diesel_async::RunQueryDsl::load(
            messages::table
                .inner_join(users::table)
                .filter(messages::conversation_id.eq(conversation_id))
                .order(messages::created_at.desc())
                .then_order_by(messages::id.desc())
                .limit(limit)
                .select((Message::as_select(), User::as_select())),
            &mut conn,
        )
        .await?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|(m, u)| ChatMessage::hydrate(m, UserSummary::from(&u)))
            .collect())
    }

    async fn create_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message, EventError> {
        let mut conn = self.db.get().await?;
        let id = prefixed_ulid(prefix::MESSAGE);

        let message = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(messages::table)
                .values(NewMessage {
                    id: &id,
                    conversation_id,
                    sender_id,
                    content,
                    created_at: Utc::now(),
                })
                .returning(Message::as_returning()),
            &mut conn,
        )
        .await?;

        Ok(message)
    }

    async fn find_message(&self, message_id: &str) -> Result<Option<Message>, EventError> {
        let mut conn = self.db.get().await?;

        let message = diesel_async::RunQueryDsl::get_result(
            messages::table
                .find(message_id)
                .select(Message::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        Ok(message)
    }

    async fn mark_message_read(&self, message_id: &str) -> Result<DateTime<Utc>, EventError> {
        let mut conn = self.db.get().await?;
        let now = Utc::now();

        // Only the null → timestamp transition writes anything.
        let updated: Option<Message> = diesel_async::RunQueryDsl::get_result(
            diesel::update(
                messages::table
                    .filter(messages::id.eq(message_id))
                    .filter(messages::read_at.is_null()),
            )
            .set(messages::read_at.eq(now))
            .returning(Message::as_returning()),
            &mut conn,
        )
        .await
        .optional()?;

        if let Some(message) = updated {
            return Ok(message.read_at.unwrap_or(now));
        }

        // Already read (or gone): report the original timestamp untouched.
        let existing: Message = diesel_async::RunQueryDsl::get_result(
            messages::table
                .find(message_id)
                .select(Message::as_select()),
            &mut conn,
        )
        .await
        .optional()?
        .ok_or_else(|| EventError::not_found("Message not found"))?;

        Ok(existing.read_at.unwrap_or(now))
    }

    async fn update_participant_last_read(
        &self,
        participant_id: &str,
    ) -> Result<(), EventError> {
        let mut conn = self.db.get().await?;

        diesel_async::RunQueryDsl::execute(
            diesel::update(conversation_participants::table.find(participant_id))
                .set(conversation_participants::last_read_at.eq(Utc::now())),
            &mut conn,
        )
        .await?;

        Ok(())
    }

    async fn touch_conversation(&self, conversation_id: &str) -> Result<(), EventError> {
        let mut conn = self.db.get().await?;

        diesel_async::RunQueryDsl::execute(
            diesel::update(conversations::table.find(conversation_id))
                .set(conversations::updated_at.eq(Utc::now())),
            &mut conn,
        )
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, EventError> {
        let mut conn = self.db.get().await?;

        let user = diesel_async::RunQueryDsl::get_result(
            users::table.find(id).select(User::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        Ok(user)
    }
}
