use chrono::{NaiveDateTime, Utc};
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::DiscordSession;
use crate::error::{AppError, AppResult};

// ============================================================================
// Discord Session Repository
// ============================================================================

pub struct DiscordSessionRepository;

impl DiscordSessionRepository {
    pub async fn find_by_discord_id(
        pool: &SqlitePool,
        discord_id: &str,
    ) -> AppResult<Option<DiscordSession>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, discord_id, discord_username, discord_avatar,
                access_token, refresh_token, expires_at,
                created_at, updated_at
            FROM discord_sessions
            WHERE discord_id = ?
            "#,
        )
        .bind(discord_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.map(|r| DiscordSession {
            id: r.get("id"),
            discord_id: r.get("discord_id"),
            discord_username: r.get("discord_username"),
            discord_avatar: r.get("discord_avatar"),
            access_token: r.get("access_token"),
            refresh_token: r.get("refresh_token"),
            expires_at: r.get("expires_at"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// Insert-or-update keyed by `discord_id`. Every field is overwritten on
    /// update; two near-simultaneous logins for the same account resolve
    /// last-write-wins.
    pub async fn upsert_by_discord_id(
        pool: &SqlitePool,
        discord_id: &str,
        discord_username: &str,
        discord_avatar: Option<&str>,
        access_token: &str,
        refresh_token: &str,
        expires_at: NaiveDateTime,
    ) -> AppResult<DiscordSession> {
        let now = Utc::now().naive_utc();

        let existing = Self::find_by_discord_id(pool, discord_id).await?;

        let row = if let Some(session) = existing {
            sqlx::query(
                r#"
                UPDATE discord_sessions
                SET
                    discord_username = ?,
                    discord_avatar = ?,
                    access_token = ?,
                    refresh_token = ?,
                    expires_at = ?,
                    updated_at = ?
                WHERE id = ?
                RETURNING
                    id, discord_id, discord_username, discord_avatar,
                    access_token, refresh_token, expires_at,
                    created_at, updated_at
                "#,
            )
            .bind(discord_username)
            .bind(discord_avatar)
            .bind(access_token)
            .bind(refresh_token)
            .bind(expires_at)
            .bind(now)
            .bind(&session.id)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?
        } else {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO discord_sessions (
                    id, discord_id, discord_username, discord_avatar,
                    access_token, refresh_token, expires_at,
                    created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING
                    id, discord_id, discord_username, discord_avatar,
                    access_token, refresh_token, expires_at,
                    created_at, updated_at
                "#,
            )
            .bind(&id)
            .bind(discord_id)
            .bind(discord_username)
            .bind(discord_avatar)
            .bind(access_token)
            .bind(refresh_token)
            .bind(expires_at)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)?
        };

        Ok(DiscordSession {
            id: row.get("id"),
            discord_id: row.get("discord_id"),
            discord_username: row.get("discord_username"),
            discord_avatar: row.get("discord_avatar"),
            access_token: row.get("access_token"),
            refresh_token: row.get("refresh_token"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Number of session rows stored for a Discord account. Unique index
    /// keeps this at most 1; exposed so callers and tests can assert it.
    pub async fn count_for_discord_id(pool: &SqlitePool, discord_id: &str) -> AppResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt FROM discord_sessions WHERE discord_id = ?
            "#,
        )
        .bind(discord_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.get("cnt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_pool;

    #[tokio::test]
    async fn upsert_inserts_then_updates_same_row() {
        let pool = test_pool().await;
        let expires = Utc::now().naive_utc();

        let first = DiscordSessionRepository::upsert_by_discord_id(
            &pool, "123", "vojta", Some("http://a/1.png"), "tok-a", "ref-a", expires,
        )
        .await
        .unwrap();

        let second = DiscordSessionRepository::upsert_by_discord_id(
            &pool, "123", "vojta2", None, "tok-b", "ref-b", expires,
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.discord_username, "vojta2");
        assert_eq!(second.discord_avatar, None);
        assert_eq!(second.access_token, "tok-b");

        let count = DiscordSessionRepository::count_for_discord_id(&pool, "123")
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn sessions_for_different_accounts_do_not_collide() {
        let pool = test_pool().await;
        let expires = Utc::now().naive_utc();

        DiscordSessionRepository::upsert_by_discord_id(
            &pool, "1", "a", None, "t1", "r1", expires,
        )
        .await
        .unwrap();
        DiscordSessionRepository::upsert_by_discord_id(
            &pool, "2", "b", None, "t2", "r2", expires,
        )
        .await
        .unwrap();

        let one = DiscordSessionRepository::find_by_discord_id(&pool, "1")
            .await
            .unwrap()
            .unwrap();
        let two = DiscordSessionRepository::find_by_discord_id(&pool, "2")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(one.id, two.id);
    }

    #[tokio::test]
    async fn stored_expiry_round_trips() {
        let pool = test_pool().await;
        let expires = Utc::now().naive_utc() + chrono::Duration::seconds(604800);

        DiscordSessionRepository::upsert_by_discord_id(
            &pool, "9", "c", None, "t", "r", expires,
        )
        .await
        .unwrap();

        let stored = DiscordSessionRepository::find_by_discord_id(&pool, "9")
            .await
            .unwrap()
            .unwrap();
        let skew = (stored.expires_at - expires).num_seconds().abs();
        assert!(skew <= 2, "expiry drifted by {}s", skew);
    }
}
