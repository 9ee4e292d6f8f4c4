use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Client for the two Discord endpoints the OAuth flow needs, plus the
/// best-effort guild auto-join. One request per call, no retries; a failed
/// call aborts the whole login attempt.
#[derive(Clone)]
pub struct DiscordOauthClient {
    client: reqwest::Client,
    api_base: String,
}

/// Token response from the authorization-code exchange.
///
/// `expires_in` is relative seconds; the absolute expiry is computed once at
/// exchange time with [`token_expiry`]. No refresh flow exists anywhere in
/// this service — a stale token is only replaced by a fresh login.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Discord identity as returned by `/users/@me`. Constructed fresh per
/// request, never cached.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordIdentity {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
}

impl DiscordIdentity {
    /// CDN avatar URL, or None for users without a custom avatar.
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar.as_ref().map(|hash| {
            format!(
                "https://cdn.discordapp.com/avatars/{}/{}.png",
                self.id, hash
            )
        })
    }
}

/// Absolute UTC expiry for a token issued at `now`.
pub fn token_expiry(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    now + Duration::seconds(expires_in)
}

impl DiscordOauthClient {
    pub fn new(api_base: &str) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(AppError::Request)?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_base, endpoint)
    }

    /// Exchange an authorization code for an access token at Discord's
    /// OAuth2 token endpoint. The `redirect_uri` must exactly match the one
    /// used to obtain `code`.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> AppResult<OAuthToken> {
        let response = self
            .client
            .post(self.api_url("/oauth2/token"))
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(AppError::Request)?;

        let status = response.status();
        let body = response.text().await.map_err(AppError::Request)?;

        if !status.is_success() {
            // Body goes into the error for logs; the response the user sees
            // carries only a generic message and never the client secret.
            return Err(AppError::TokenExchange(format!("{}: {}", status, body)));
        }

        serde_json::from_str::<OAuthToken>(&body)
            .map_err(|e| AppError::TokenExchange(format!("invalid token response: {}", e)))
    }

    /// Fetch the Discord user object with a Bearer access token.
    pub async fn fetch_identity(&self, access_token: &str) -> AppResult<DiscordIdentity> {
        let response = self
            .client
            .get(self.api_url("/users/@me"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(AppError::Request)?;

        let status = response.status();
        let body = response.text().await.map_err(AppError::Request)?;

        if !status.is_success() {
            return Err(AppError::IdentityFetch(format!("{}: {}", status, body)));
        }

        serde_json::from_str::<DiscordIdentity>(&body)
            .map_err(|e| AppError::IdentityFetch(format!("invalid user response: {}", e)))
    }

    /// Add the authenticated user to the community guild using the bot
    /// token. Best-effort: 201 means joined, 204 already a member, and any
    /// other outcome (including transport failures) is logged and ignored
    /// so it can never abort a login.
    pub async fn join_guild(
        &self,
        bot_token: &str,
        guild_id: &str,
        user_id: &str,
        access_token: &str,
    ) {
        let url = self.api_url(&format!("/guilds/{}/members/{}", guild_id, user_id));

        let result = self
            .client
            .put(&url)
            .header("Authorization", format!("Bot {}", bot_token))
            .json(&serde_json::json!({ "access_token": access_token }))
            .send()
            .await;

        match result {
            Ok(response) => match response.status().as_u16() {
                201 => tracing::info!("Added user {} to guild {}", user_id, guild_id),
                204 => tracing::debug!("User {} already in guild {}", user_id, guild_id),
                status => {
                    let body = response.text().await.unwrap_or_default();
                    tracing::warn!(
                        "Guild auto-join for user {} returned {}: {}",
                        user_id,
                        status,
                        body
                    );
                }
            },
            Err(e) => {
                tracing::warn!("Guild auto-join request for user {} failed: {}", user_id, e);
            }
        }
    }
}
