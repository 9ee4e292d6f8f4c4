use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A device-local, Discord-only login record keyed unique by `discord_id`.
/// Independent of the application's own account system; the two are never
/// reconciled.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DiscordSession {
    pub id: String,
    pub discord_id: String,
    pub discord_username: String,
    pub discord_avatar: Option<String>,

    // Tokens are stored as issued. There is no refresh flow; once
    // `expires_at` passes the row is stale until the next login overwrites it.
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: NaiveDateTime,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
