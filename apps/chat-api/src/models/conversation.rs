use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::conversations;

/// A persisted conversation: direct (two participants, unnamed) or group
/// (named, arbitrary participant count). Creation and membership changes
/// happen outside this service; it only bumps `updated_at` on send.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[serde(rename_all = "camelCase")]
#[diesel(table_name = conversations)]
pub struct Conversation {
    pub id: String,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
