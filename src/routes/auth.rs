use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{DiscordSessionRepository, ProfileRepository};
use crate::error::AppError;
use crate::services::discord::token_expiry;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/discord/login", get(discord_login))
        .route("/discord/callback", get(discord_callback))
        .route("/discord/link", post(discord_link))
        .route("/discord/unlink", post(discord_unlink))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnlinkRequest {
    pub user_id: Option<String>,
}

/// Identity fields returned to the browser after a session login. Raw OAuth
/// tokens never leave the server.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub discord_id: String,
    pub discord_username: String,
    pub discord_avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub success: bool,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct LinkedDiscord {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub success: bool,
    pub discord: LinkedDiscord,
}

// ============================================================================
// Handlers
// ============================================================================

/// Hand the frontend the Discord authorize URL for the session-login flow.
async fn discord_login(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (client_id, _) = oauth_credentials(&state)?;

    let auth_url = format!(
        "https://discord.com/api/oauth2/authorize?client_id={}&redirect_uri={}&response_type=code&scope=identify",
        urlencoding::encode(client_id),
        urlencoding::encode(&state.config.discord.redirect_uri),
    );

    Ok(Json(serde_json::json!({ "url": auth_url })))
}

/// Session-creation callback: exchange the authorization code, fetch the
/// Discord identity and upsert the device-local session row.
async fn discord_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, AppError> {
    // Discord reports consent-screen failures via query params.
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::error!("OAuth error: {} - {}", error, description);
        return Err(AppError::MissingParameter(format!(
            "OAuth error: {}",
            description
        )));
    }

    let code = query.code.ok_or_else(|| {
        tracing::error!("OAuth callback missing authorization code");
        AppError::MissingParameter("No code provided".to_string())
    })?;

    let (client_id, client_secret) = oauth_credentials(&state)?;

    tracing::debug!("Exchanging authorization code for token");
    let token = state
        .discord
        .exchange_code(
            client_id,
            client_secret,
            &code,
            &state.config.discord.redirect_uri,
        )
        .await?;

    let identity = state.discord.fetch_identity(&token.access_token).await?;
    tracing::info!("Discord login for user {} ({})", identity.username, identity.id);

    // Best-effort guild auto-join; must never abort the login.
    if let (Some(guild_id), Some(bot_token)) = (
        state.config.discord.guild_id.as_deref(),
        state.config.discord.bot_token.as_deref(),
    ) {
        state
            .discord
            .join_guild(bot_token, guild_id, &identity.id, &token.access_token)
            .await;
    }

    let expires_at = token_expiry(Utc::now(), token.expires_in);
    let avatar_url = identity.avatar_url();

    let session = DiscordSessionRepository::upsert_by_discord_id(
        &state.db,
        &identity.id,
        &identity.username,
        avatar_url.as_deref(),
        &token.access_token,
        &token.refresh_token,
        expires_at.naive_utc(),
    )
    .await?;

    Ok(Json(CallbackResponse {
        success: true,
        session: SessionInfo {
            discord_id: session.discord_id,
            discord_username: session.discord_username,
            discord_avatar: session.discord_avatar,
        },
    }))
}

/// Account-linking handler: write the Discord identity onto an existing
/// profile. Unlike the session callback this never persists the OAuth
/// tokens — only the identity triple lands in the store.
async fn discord_link(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LinkRequest>,
) -> Result<Json<LinkResponse>, AppError> {
    let code = request
        .code
        .ok_or_else(|| AppError::MissingParameter("No code provided".to_string()))?;
    let redirect_uri = request
        .redirect_uri
        .ok_or_else(|| AppError::MissingParameter("No redirect_uri provided".to_string()))?;
    let user_id = request
        .user_id
        .ok_or_else(|| AppError::MissingParameter("No user_id provided".to_string()))?;

    let (client_id, client_secret) = oauth_credentials(&state)?;

    tracing::debug!("Linking Discord account for user {}", user_id);

    // The redirect URI must exactly match the one used to obtain the code,
    // so the caller supplies it rather than the server config.
    let token = state
        .discord
        .exchange_code(client_id, client_secret, &code, &redirect_uri)
        .await?;

    let identity = state.discord.fetch_identity(&token.access_token).await?;
    let avatar_url = identity.avatar_url();

    ProfileRepository::set_discord_info(
        &state.db,
        &user_id,
        &identity.id,
        &identity.username,
        avatar_url.as_deref(),
    )
    .await?;

    tracing::info!(
        "Linked Discord account {} to profile {}",
        identity.id,
        user_id
    );

    Ok(Json(LinkResponse {
        success: true,
        discord: LinkedDiscord {
            id: identity.id,
            username: identity.username,
            avatar: avatar_url,
        },
    }))
}

/// Null the discord_* fields on a profile.
async fn discord_unlink(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UnlinkRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = request
        .user_id
        .ok_or_else(|| AppError::MissingParameter("No user_id provided".to_string()))?;

    ProfileRepository::clear_discord_info(&state.db, &user_id).await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// Helper functions
// ============================================================================

fn oauth_credentials(state: &Arc<AppState>) -> Result<(&str, &str), AppError> {
    let client_id = state
        .config
        .discord
        .client_id
        .as_deref()
        .ok_or_else(|| AppError::Config("DISCORD_CLIENT_ID not set".to_string()))?;
    let client_secret = state
        .config
        .discord
        .client_secret
        .as_deref()
        .ok_or_else(|| AppError::Config("DISCORD_CLIENT_SECRET not set".to_string()))?;
    Ok((client_id, client_secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use http::{Request, StatusCode};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::Config;
    use crate::services::discord::DiscordOauthClient;

    async fn test_state(api_base: &str, with_guild: bool) -> Arc<AppState> {
        let mut config = Config::default();
        config.discord.client_id = Some("cid".to_string());
        config.discord.client_secret = Some("secret".to_string());
        config.discord.api_base = api_base.to_string();
        if with_guild {
            config.discord.guild_id = Some("42".to_string());
            config.discord.bot_token = Some("bot".to_string());
        }

        let db = crate::db::repository::test_pool().await;
        let discord = DiscordOauthClient::new(api_base).unwrap();

        Arc::new(AppState { db, config, discord })
    }

    fn app(state: Arc<AppState>) -> Router {
        router().with_state(state)
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn mock_token(server_expires_in: i64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": server_expires_in,
            "token_type": "Bearer",
            "scope": "identify"
        }))
    }

    fn mock_identity(id: &str, username: &str, avatar: Option<&str>) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": id,
            "username": username,
            "avatar": avatar,
            "discriminator": "0"
        }))
    }

    #[tokio::test]
    async fn callback_without_code_is_400_and_writes_nothing() {
        let state = test_state("http://127.0.0.1:1", false).await;
        let resp = app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/discord/callback")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["error"], "No code provided");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discord_sessions")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn callback_creates_session_and_omits_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(mock_token(604800))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .respond_with(mock_identity("123", "vojta", Some("abc")))
            .mount(&server)
            .await;

        let state = test_state(&server.uri(), false).await;
        let resp = app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/discord/callback?code=good")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["session"]["discord_id"], "123");
        assert_eq!(
            body["session"]["discord_avatar"],
            "https://cdn.discordapp.com/avatars/123/abc.png"
        );
        assert!(body["session"].get("access_token").is_none());

        let session = DiscordSessionRepository::find_by_discord_id(&state.db, "123")
            .await
            .unwrap()
            .expect("session row should exist");
        assert_eq!(session.access_token, "at");

        let skew = (session.expires_at
            - (Utc::now().naive_utc() + chrono::Duration::seconds(604800)))
        .num_seconds()
        .abs();
        assert!(skew <= 2, "expires_at drifted by {}s", skew);
    }

    #[tokio::test]
    async fn second_login_for_same_account_updates_same_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(mock_token(3600))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .respond_with(mock_identity("77", "first", None))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .respond_with(mock_identity("77", "renamed", None))
            .mount(&server)
            .await;

        let state = test_state(&server.uri(), false).await;
        for code in ["one", "two"] {
            let resp = app(state.clone())
                .oneshot(
                    Request::builder()
                        .uri(format!("/discord/callback?code={}", code))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let count = DiscordSessionRepository::count_for_discord_id(&state.db, "77")
            .await
            .unwrap();
        assert_eq!(count, 1);
        let session = DiscordSessionRepository::find_by_discord_id(&state.db, "77")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.discord_username, "renamed");
    }

    #[tokio::test]
    async fn failed_exchange_is_500_and_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({ "error": "invalid_grant" })),
            )
            .mount(&server)
            .await;

        let state = test_state(&server.uri(), false).await;
        let resp = app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/discord/callback?code=stale")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(resp).await;
        assert_eq!(body["error"], "Failed to exchange code for token");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discord_sessions")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn guild_join_rejection_does_not_change_the_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(mock_token(3600))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .respond_with(mock_identity("5", "joiner", None))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/guilds/42/members/5"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let state = test_state(&server.uri(), true).await;
        let resp = app(state.clone())
            .oneshot(
                Request::builder()
                    .uri("/discord/callback?code=good")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["session"]["discord_id"], "5");
    }

    #[tokio::test]
    async fn link_updates_existing_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(mock_token(3600))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .respond_with(mock_identity("123", "vojta", Some("abc")))
            .mount(&server)
            .await;

        let state = test_state(&server.uri(), false).await;
        ProfileRepository::create(&state.db, "acc-1", Some("Vojta"))
            .await
            .unwrap();

        let payload = serde_json::json!({
            "code": "good",
            "redirect_uri": "https://fearline.eu/discord-link-callback",
            "user_id": "acc-1"
        });
        let resp = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/discord/link")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["discord"]["id"], "123");
        assert_eq!(
            body["discord"]["avatar"],
            "https://cdn.discordapp.com/avatars/123/abc.png"
        );

        let profile = ProfileRepository::find_by_id(&state.db, "acc-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.discord_id.as_deref(), Some("123"));
        assert_eq!(profile.display_name.as_deref(), Some("Vojta"));

        // Link flow never touches the session table.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discord_sessions")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn link_rejects_missing_fields() {
        let state = test_state("http://127.0.0.1:1", false).await;

        for (payload, expected) in [
            (serde_json::json!({}), "No code provided"),
            (
                serde_json::json!({ "code": "c" }),
                "No redirect_uri provided",
            ),
            (
                serde_json::json!({ "code": "c", "redirect_uri": "https://x" }),
                "No user_id provided",
            ),
        ] {
            let resp = app(state.clone())
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/discord/link")
                        .header("content-type", "application/json")
                        .body(Body::from(payload.to_string()))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body = json_body(resp).await;
            assert_eq!(body["error"], expected);
        }
    }

    #[tokio::test]
    async fn link_without_credentials_is_config_error() {
        let server = MockServer::start().await;
        let mut state = test_state(&server.uri(), false).await;
        Arc::get_mut(&mut state).unwrap().config.discord.client_secret = None;

        let payload = serde_json::json!({
            "code": "c",
            "redirect_uri": "https://x",
            "user_id": "acc-1"
        });
        let resp = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/discord/link")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(resp).await;
        assert_eq!(body["error"], "Discord credentials not configured");
    }

    #[tokio::test]
    async fn unlink_clears_profile_fields() {
        let state = test_state("http://127.0.0.1:1", false).await;
        ProfileRepository::create(&state.db, "acc-9", None).await.unwrap();
        ProfileRepository::set_discord_info(&state.db, "acc-9", "9", "nine", None)
            .await
            .unwrap();

        let resp = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/discord/unlink")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({ "user_id": "acc-9" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let profile = ProfileRepository::find_by_id(&state.db, "acc-9")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.discord_id, None);
    }

    #[tokio::test]
    async fn login_returns_authorize_url() {
        let state = test_state("http://127.0.0.1:1", false).await;
        let resp = app(state)
            .oneshot(
                Request::builder()
                    .uri("/discord/login")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        let url = body["url"].as_str().unwrap();
        assert!(url.starts_with("https://discord.com/api/oauth2/authorize?client_id=cid"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=identify"));
    }
}
