//! User management endpoints. Listing is staff-only; mutation is
//! admin-only because the patch can change roles. Deletion is a soft
//! deactivation — accounts are never physically removed.

use crate::app_state::AppState;
use crate::domain::{ApiError, IdentityStore, Role, UserPatch, UserView};
use crate::handlers::shared_types::ApiResponse;
use crate::session::AuthUser;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateUserRequest {
    // ---
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub class_name: Option<String>,
}

/// GET /users
#[tracing::instrument(skip(state, auth))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<Vec<UserView>>, ApiError> {
    // ---
    auth.0.require_staff()?;

    let users = state.identity().list_users().await?;
    Ok(ApiResponse::new(users.into_iter().map(UserView::from).collect()))
}

/// GET /users/{id}
///
/// A user may fetch themselves; staff may fetch anyone.
#[tracing::instrument(skip(state, auth))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<UserView>, ApiError> {
    // ---
    if id != auth.0.user_id {
        auth.0.require_staff()?;
    }

    let user = state
        .identity()
        .get_user_by_id(id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    Ok(ApiResponse::new(UserView::from(user)))
}

/// PUT /users/{id}
///
/// Admin-only: the patch can reassign roles and classes.
#[tracing::instrument(skip(state, auth, req))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<ApiResponse<UserView>, ApiError> {
    // ---
    auth.0.require_admin()?;

    let patch = UserPatch {
        name: req.name,
        email: req.email.map(|e| e.trim().to_lowercase()),
        role: req.role,
        class_name: req.class_name,
        password_hash: None,
    };

    let user = state.identity().update_user(id, patch).await?;
    tracing::info!("User updated: {id}");
    Ok(ApiResponse::new(UserView::from(user)))
}

/// DELETE /users/{id}
///
/// Admin-only soft deactivation; attendance records survive.
#[tracing::instrument(skip(state, auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    // ---
    auth.0.require_admin()?;

    state.identity().deactivate_user(id).await?;
    tracing::info!("User deactivated: {id}");
    Ok(StatusCode::NO_CONTENT)
}
