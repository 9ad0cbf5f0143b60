use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::conversation_participants;
use crate::models::user::UserSummary;

/// Membership record tying a user to a conversation. A null `left_at`
/// means the participant is active; a set `left_at` is a departure and is
/// treated identically to never having joined.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = conversation_participants)]
pub struct Participant {
    pub id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub last_read_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

/// A participant hydrated with the owning user's profile, as sent in the
/// `conversation:messages` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProfile {
    pub id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub user: UserSummary,
}

impl ParticipantProfile {
    pub fn hydrate(participant: &Participant, user: UserSummary) -> Self {
        Self {
            id: participant.id.clone(),
            user_id: participant.user_id.clone(),
            role: participant.role.clone(),
            joined_at: participant.joined_at,
            last_read_at: participant.last_read_at,
            user,
        }
    }
}
