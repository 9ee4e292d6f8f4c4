pub mod discord_session;
pub mod profile;
pub mod user_role;

pub use discord_session::DiscordSessionRepository;
pub use profile::ProfileRepository;
pub use user_role::UserRoleRepository;

/// In-memory SQLite pool with migrations applied, for repository tests.
/// Single connection so the `:memory:` database is shared.
#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");
    pool
}
