//! Device binding endpoint.
//!
//! A device identifier is bound to exactly one user at a time; marking
//! attendance from an unbound device is rejected by the verification
//! service. Re-registering your own device refreshes the binding and
//! retires any previous one.

use crate::app_state::AppState;
use crate::domain::{ApiError, DeviceBinding, DeviceRegistry, NewDeviceBinding};
use crate::handlers::shared_types::ApiResponse;
use crate::session::AuthUser;
use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    // ---
    pub device_id: String,
    #[serde(default)]
    pub device_name: Option<String>,
}

/// POST /devices/register
#[tracing::instrument(skip(state, auth, headers, req))]
pub async fn register_device(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<(StatusCode, ApiResponse<DeviceBinding>), ApiError> {
    // ---
    if req.device_id.trim().is_empty() {
        return Err(ApiError::Validation(
            "deviceId must not be empty".to_string(),
        ));
    }

    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_owned());

    let binding = state
        .devices()
        .register_device(NewDeviceBinding {
            device_id: req.device_id.trim().to_owned(),
            user_id: auth.0.user_id,
            device_name: req
                .device_name
                .unwrap_or_else(|| "Unknown Device".to_string()),
            ip_address,
        })
        .await?;

    tracing::info!("Device registered for user: {}", auth.0.user_id);

    Ok((StatusCode::CREATED, ApiResponse::new(binding)))
}
