use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin of the site frontend, used for CORS and post-login redirects.
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// OAuth application credentials. Optional at startup; handlers that
    /// need them answer with a configuration error when they are absent.
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Redirect URI registered with the Discord application for the
    /// session-login flow. The link flow receives its redirect URI from the
    /// caller instead.
    pub redirect_uri: String,
    /// When both are set, successful logins are auto-joined to this guild.
    pub guild_id: Option<String>,
    pub bot_token: Option<String>,
    /// Base URL of the Discord REST API. Overridable for tests.
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for the auth endpoints
    pub auth_per_second: u32,
    /// Burst size for the auth endpoints
    pub auth_burst: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "https://fearline.eu".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/fearline.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            discord: DiscordConfig {
                client_id: env::var("DISCORD_CLIENT_ID").ok(),
                client_secret: env::var("DISCORD_CLIENT_SECRET").ok(),
                redirect_uri: env::var("DISCORD_REDIRECT_URI")
                    .unwrap_or_else(|_| "https://fearline.eu/auth/callback".to_string()),
                guild_id: env::var("DISCORD_GUILD_ID").ok(),
                bot_token: env::var("DISCORD_BOT_TOKEN").ok(),
                api_base: env::var("DISCORD_API_BASE")
                    .unwrap_or_else(|_| "https://discord.com/api".to_string()),
            },
            rate_limit: RateLimitConfig {
                auth_per_second: env::var("RATE_LIMIT_AUTH_PER_SECOND")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                auth_burst: env::var("RATE_LIMIT_AUTH_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "https://fearline.eu".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/fearline.db".to_string(),
                max_connections: 5,
            },
            discord: DiscordConfig {
                client_id: None,
                client_secret: None,
                redirect_uri: "https://fearline.eu/auth/callback".to_string(),
                guild_id: None,
                bot_token: None,
                api_base: "https://discord.com/api".to_string(),
            },
            rate_limit: RateLimitConfig {
                auth_per_second: 3,
                auth_burst: 10,
            },
        }
    }
}
