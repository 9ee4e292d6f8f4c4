use chrono::Utc;
use sqlx::Row;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

// ============================================================================
// User Role Repository
// ============================================================================

pub struct UserRoleRepository;

impl UserRoleRepository {
    pub async fn add_role(pool: &SqlitePool, user_id: &str, role: &str) -> AppResult<()> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO user_roles (id, user_id, role, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id, role) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(role)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn roles_for_user(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT role FROM user_roles WHERE user_id = ? ORDER BY role ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.into_iter().map(|r| r.get("role")).collect())
    }

    /// Backs the member portal's derived admin flag.
    pub async fn is_admin(pool: &SqlitePool, user_id: &str) -> AppResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM user_roles WHERE user_id = ? AND role = 'admin'
            ) AS is_admin
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.get::<i64, _>("is_admin") != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_pool;

    #[tokio::test]
    async fn admin_flag_follows_role_rows() {
        let pool = test_pool().await;

        assert!(!UserRoleRepository::is_admin(&pool, "u1").await.unwrap());

        UserRoleRepository::add_role(&pool, "u1", "admin").await.unwrap();
        assert!(UserRoleRepository::is_admin(&pool, "u1").await.unwrap());

        // Idempotent add
        UserRoleRepository::add_role(&pool, "u1", "admin").await.unwrap();
        let roles = UserRoleRepository::roles_for_user(&pool, "u1").await.unwrap();
        assert_eq!(roles, vec!["admin".to_string()]);
    }
}
