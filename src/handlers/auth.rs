//! Registration, login, and profile handlers.
//!
//! Passwords are salted and hashed with PBKDF2; only the hash crosses
//! the storage boundary and it is never serialized back to clients.
//! Login issues an opaque bearer token backed by Redis session state.

use crate::app_state::AppState;
use crate::domain::{ApiError, IdentityStore, NewUser, Role, UserView};
use crate::handlers::shared_types::ApiResponse;
use crate::session::{create_session, AuthUser};
use axum::{extract::State, http::StatusCode, Json};
use once_cell::sync::Lazy;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

const MIN_PASSWORD_LEN: usize = 8;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RegisterRequest {
    // ---
    pub name: String,
    pub email: String,
    pub password: String,
    pub roll_number: String,
    #[serde(default)]
    pub class_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LoginRequest {
    // ---
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    // ---
    pub token: String,
    pub user: UserView,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
///
/// Creates a user account. Every account starts as a student; role
/// changes go through the admin-only user update endpoint.
#[tracing::instrument(skip(state, req))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, ApiResponse<UserView>), ApiError> {
    // ---
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".to_string()));
    }
    if !EMAIL_RE.is_match(&req.email) {
        return Err(ApiError::Validation("invalid email address".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if req.roll_number.trim().is_empty() {
        return Err(ApiError::Validation(
            "rollNumber must not be empty".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;

    let user = state
        .identity()
        .create_user(NewUser {
            name: req.name.trim().to_owned(),
            email: req.email.trim().to_lowercase(),
            password_hash,
            role: Role::Student,
            roll_number: req.roll_number.trim().to_owned(),
            class_name: req.class_name,
        })
        .await?;

    tracing::info!("Registered user: {}", user.id);

    Ok((StatusCode::CREATED, ApiResponse::new(UserView::from(user))))
}

/// POST /auth/login
///
/// Verifies credentials and issues a bearer session token. Failures are
/// indistinguishable on purpose; the caller learns only that the
/// credentials did not match an active account.
#[tracing::instrument(skip(state, req))]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    // ---
    let user = state
        .identity()
        .get_user_by_email(&req.email.trim().to_lowercase())
        .await?
        .filter(|u| u.is_active)
        .ok_or(ApiError::Unauthorized("invalid credentials"))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::Unauthorized("invalid credentials"));
    }

    let mut conn = state.get_conn().await?;
    let token = create_session(
        &mut conn,
        user.id,
        user.role,
        state.session_ttl().as_secs(),
    )
    .await?;

    Ok(ApiResponse::new(LoginResponse {
        token,
        user: UserView::from(user),
    }))
}

/// GET /auth/profile
///
/// Returns the caller's account.
#[tracing::instrument(skip(state, auth))]
pub async fn profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<UserView>, ApiError> {
    // ---
    let user = state
        .identity()
        .get_user_by_id(auth.0.user_id)
        .await?
        .ok_or(ApiError::Unauthorized("account no longer exists"))?;

    Ok(ApiResponse::new(UserView::from(user)))
}

// ============================================================================
// Password hashing
// ============================================================================

fn hash_password(password: &str) -> Result<String, ApiError> {
    // ---
    let salt = SaltString::generate(&mut OsRng);
    Ok(Pbkdf2
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    // ---
    PasswordHash::new(hash)
        .map(|parsed| Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}
