use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A required request parameter was absent. Should not occur from
    /// correct client code.
    #[error("{0}")]
    MissingParameter(String),

    /// Discord's token endpoint answered with a non-success status. The
    /// upstream body is kept for diagnostics and never sent to the client.
    #[error("Failed to exchange code for token")]
    TokenExchange(String),

    /// Discord's user-info endpoint answered with a non-success status.
    #[error("Failed to get Discord user info")]
    IdentityFetch(String),

    #[error("Discord credentials not configured")]
    Config(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Wire shape for failures: a flat `{ "error": "<message>" }` object, the
/// contract the site frontend already consumes.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::MissingParameter(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::TokenExchange(body) => {
                tracing::error!("Token exchange failed: {}", body);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::IdentityFetch(body) => {
                tracing::error!("Identity fetch failed: {}", body);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Config(detail) => {
                tracing::error!("Configuration error: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            AppError::Request(e) => {
                tracing::error!("HTTP request error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to communicate with Discord".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse { error: message };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
