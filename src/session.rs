//! Session management for authenticated users.
//!
//! Bearer tokens are opaque UUIDs backing onto Redis state with a
//! configurable TTL. The stored payload carries the user id, role, and
//! expiry; expired or unknown tokens are rejected with 401.

use crate::app_state::AppState;
use crate::domain::{ApiError, Role};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Session data stored in Redis.
#[derive(Debug, Serialize, Deserialize)]
struct SessionData {
    //
    user_id: Uuid,
    role: Role,
    expires_at: i64,
}

/// Validated session information attached to a request.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    //
    pub user_id: Uuid,
    pub role: Role,
    pub expires_at: i64,
}

impl SessionInfo {
    /// Rejects callers below teacher rank.
    pub fn require_staff(&self) -> Result<(), ApiError> {
        // ---
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Unauthorized("teacher or admin role required"))
        }
    }

    /// Rejects callers below admin rank.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        // ---
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Unauthorized("admin role required"))
        }
    }
}

// ---

/// Creates a new session token and stores it in Redis.
///
/// # Arguments
/// * `redis_conn` - Active Redis connection
/// * `user_id` - User's unique identifier
/// * `role` - User's role, checked on protected endpoints
/// * `ttl_secs` - Session lifetime in seconds
///
/// # Returns
/// Opaque bearer token on success.
pub async fn create_session(
    redis_conn: &mut MultiplexedConnection,
    user_id: Uuid,
    role: Role,
    ttl_secs: u64,
) -> Result<String, ApiError> {
    //
    let token = Uuid::new_v4().to_string();
    let expires_at = chrono::Utc::now().timestamp() + ttl_secs as i64;

    let session_data = SessionData {
        //
        user_id,
        role,
        expires_at,
    };

    let session_json = serde_json::to_string(&session_data)?;

    let redis_key = format!("session:{token}");

    redis_conn
        .set_ex::<_, _, ()>(&redis_key, session_json, ttl_secs)
        .await?;

    tracing::info!("Created session for user: {}", user_id);

    Ok(token)
}

/// Validates a bearer token against Redis.
///
/// Redis expiry removes stale sessions on its own; the stored expiry is
/// checked as well so a clock-skewed entry can never outlive its TTL.
pub async fn validate_session(
    redis_conn: &mut MultiplexedConnection,
    token: &str,
) -> Result<SessionInfo, ApiError> {
    //
    let redis_key = format!("session:{token}");

    let session_json: Option<String> = redis_conn.get(&redis_key).await?;

    let session_json =
        session_json.ok_or(ApiError::Unauthorized("invalid or expired session token"))?;

    let data: SessionData = serde_json::from_str(&session_json)
        .map_err(|_| ApiError::Unauthorized("invalid or expired session token"))?;

    if data.expires_at < chrono::Utc::now().timestamp() {
        return Err(ApiError::Unauthorized("invalid or expired session token"));
    }

    Ok(SessionInfo {
        user_id: data.user_id,
        role: data.role,
        expires_at: data.expires_at,
    })
}

// ---

/// Extractor for authenticated requests.
///
/// Reads the `Authorization: Bearer` header and resolves it to a
/// [`SessionInfo`]. Missing, malformed, or expired tokens reject the
/// request with 401 before the handler runs.
pub struct AuthUser(pub SessionInfo);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // ---
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized("missing bearer token"))?
            .to_owned();

        let mut conn = state.get_conn().await?;
        let info = validate_session(&mut conn, &token).await?;

        Ok(AuthUser(info))
    }
}
