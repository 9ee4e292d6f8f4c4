use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::db::{ProfileRepository, UserRoleRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

/// Router for profile/role lookups used by the member portal.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:id/roles", get(get_roles))
}

#[derive(Debug, Serialize)]
pub struct RolesResponse {
    pub user_id: String,
    pub roles: Vec<String>,
    /// Derived flag the portal uses to gate the admin panel.
    pub is_admin: bool,
}

async fn get_roles(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<RolesResponse>> {
    // Roles only exist for known profiles.
    ProfileRepository::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    let roles = UserRoleRepository::roles_for_user(&state.db, &id).await?;
    let is_admin = roles.iter().any(|r| r == "admin");

    Ok(Json(RolesResponse {
        user_id: id,
        roles,
        is_admin,
    }))
}
