use chrono::Utc;
use sqlx::Row;
use sqlx::SqlitePool;

use crate::db::models::Profile;
use crate::error::{AppError, AppResult};

// ============================================================================
// Profile Repository
// ============================================================================

pub struct ProfileRepository;

impl ProfileRepository {
    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, display_name, avatar_url,
                discord_id, discord_username, discord_avatar,
                created_at, updated_at
            FROM profiles
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| Profile {
            id: r.get("id"),
            display_name: r.get("display_name"),
            avatar_url: r.get("avatar_url"),
            discord_id: r.get("discord_id"),
            discord_username: r.get("discord_username"),
            discord_avatar: r.get("discord_avatar"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Create a profile row for a new account. The account signup flow owns
    /// this normally; the repository exposes it for seeding and tests.
    pub async fn create(
        pool: &SqlitePool,
        id: &str,
        display_name: Option<&str>,
    ) -> AppResult<Profile> {
        let now = Utc::now().naive_utc();

        let row = sqlx::query(
            r#"
            INSERT INTO profiles (
                id, display_name, avatar_url,
                discord_id, discord_username, discord_avatar,
                created_at, updated_at
            )
            VALUES (?, ?, NULL, NULL, NULL, NULL, ?, ?)
            RETURNING
                id, display_name, avatar_url,
                discord_id, discord_username, discord_avatar,
                created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(Profile {
            id: row.get("id"),
            display_name: row.get("display_name"),
            avatar_url: row.get("avatar_url"),
            discord_id: row.get("discord_id"),
            discord_username: row.get("discord_username"),
            discord_avatar: row.get("discord_avatar"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Write the Discord identity onto an existing profile. Update, not
    /// upsert: the row is created by account signup, so a missing row is a
    /// not-found error rather than an insert.
    pub async fn set_discord_info(
        pool: &SqlitePool,
        user_id: &str,
        discord_id: &str,
        discord_username: &str,
        discord_avatar: Option<&str>,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET
                discord_id = ?,
                discord_username = ?,
                discord_avatar = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(discord_id)
        .bind(discord_username)
        .bind(discord_avatar)
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Profile not found".to_string()));
        }

        Ok(())
    }

    pub async fn clear_discord_info(pool: &SqlitePool, user_id: &str) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET
                discord_id = NULL,
                discord_username = NULL,
                discord_avatar = NULL,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Profile not found".to_string()));
        }

        Ok(())
    }
}
