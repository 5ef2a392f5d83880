//! Attendance endpoints: marking, QR issuance, queries, and the
//! staff-only update/delete paths.

use crate::app_state::AppState;
use crate::domain::{
    ApiError, AttendanceFilter, AttendanceLedger, AttendancePatch, AttendanceRecord,
    AttendanceStatus, IssuedQrToken, Metrics, QrTokenIssuer,
};
use crate::handlers::shared_types::ApiResponse;
use crate::session::AuthUser;
use crate::verification::MarkAttendanceRequest;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct MarkRequest {
    // ---
    pub qr_token: String,
    pub device_id: String,
    #[serde(default)]
    pub selfie_ref: Option<String>,
    #[serde(default)]
    pub class_hint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct IssueQrRequest {
    // ---
    pub class_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ListQuery {
    // ---
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

/// Patch body for updating a record. `userId` and `qrCodeUsed` are
/// immutable post-creation; unknown fields are rejected outright.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateRequest {
    // ---
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub selfie_ref: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /attendance/mark
///
/// Runs the full verification workflow for the caller: device binding,
/// QR token, selfie policy, then the atomic ledger append. The user id
/// always comes from the session, never from the body.
#[tracing::instrument(skip(state, auth, req))]
pub async fn mark_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<MarkRequest>,
) -> Result<(StatusCode, ApiResponse<AttendanceRecord>), ApiError> {
    // ---
    let result = state
        .verification()
        .mark_attendance(MarkAttendanceRequest {
            user_id: auth.0.user_id,
            qr_token: req.qr_token,
            device_id: req.device_id,
            selfie_ref: req.selfie_ref,
            class_hint: req.class_hint,
        })
        .await;

    match result {
        Ok(record) => {
            state.metrics().record_attendance_marked();
            tracing::info!("Attendance marked for user: {}", record.user_id);
            Ok((StatusCode::CREATED, ApiResponse::new(record)))
        }
        Err(err) => {
            if matches!(err, ApiError::DuplicateAttendance) {
                state.metrics().record_duplicate_rejected();
            }
            Err(err)
        }
    }
}

/// POST /attendance/qr
///
/// Issues a short-lived class-session token (teacher/admin). QR image
/// rendering is a client concern; the API returns the token string and
/// its expiry.
#[tracing::instrument(skip(state, auth, req))]
pub async fn issue_qr_token(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<IssueQrRequest>,
) -> Result<(StatusCode, ApiResponse<IssuedQrToken>), ApiError> {
    // ---
    auth.0.require_staff()?;

    if req.class_name.trim().is_empty() {
        return Err(ApiError::Validation(
            "className must not be empty".to_string(),
        ));
    }

    let issued = state
        .qr()
        .issue(req.class_name.trim(), auth.0.user_id, Utc::now())?;

    Ok((StatusCode::CREATED, ApiResponse::new(issued)))
}

/// GET /attendance
///
/// Lists records across all users (teacher/admin), newest first.
#[tracing::instrument(skip(state, auth, query))]
pub async fn list_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<ApiResponse<Vec<AttendanceRecord>>, ApiError> {
    // ---
    auth.0.require_staff()?;

    let filter = AttendanceFilter {
        user_id: None,
        class_name: query.class_name,
        from: query.from,
        to: query.to,
    };

    let records = state.ledger().find(&filter).await?;
    Ok(ApiResponse::new(records))
}

/// GET /attendance/today
///
/// Lists records for the current UTC calendar day, newest first.
#[tracing::instrument(skip(state, _auth))]
pub async fn today_attendance(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<ApiResponse<Vec<AttendanceRecord>>, ApiError> {
    // ---
    let day_start = Utc::now()
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    let day_end = day_start + Duration::days(1) - Duration::microseconds(1);

    let filter = AttendanceFilter {
        from: Some(day_start),
        to: Some(day_end),
        ..Default::default()
    };

    let records = state.ledger().find(&filter).await?;
    Ok(ApiResponse::new(records))
}

/// GET /attendance/user/{userId}
///
/// One user's attendance history, newest first. A student may only see
/// their own history; staff may see anyone's.
#[tracing::instrument(skip(state, auth))]
pub async fn user_attendance_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<AttendanceRecord>>, ApiError> {
    // ---
    if user_id != auth.0.user_id {
        auth.0.require_staff()?;
    }

    let records = state
        .ledger()
        .find(&AttendanceFilter::for_user(user_id))
        .await?;
    Ok(ApiResponse::new(records))
}

/// GET /attendance/{id}
#[tracing::instrument(skip(state, auth))]
pub async fn get_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<AttendanceRecord>, ApiError> {
    // ---
    let record = state
        .ledger()
        .get(id)
        .await?
        .ok_or(ApiError::NotFound("attendance record"))?;

    if record.user_id != auth.0.user_id {
        auth.0.require_staff()?;
    }

    Ok(ApiResponse::new(record))
}

/// PUT /attendance/{id}
///
/// Applies an explicit correction to a record (teacher/admin).
#[tracing::instrument(skip(state, auth, req))]
pub async fn update_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRequest>,
) -> Result<ApiResponse<AttendanceRecord>, ApiError> {
    // ---
    auth.0.require_staff()?;

    let patch = AttendancePatch {
        status: req.status,
        remarks: req.remarks,
        verified: req.verified,
        selfie_ref: req.selfie_ref,
    };

    let record = state.ledger().update(id, &patch).await?;
    tracing::info!("Attendance record updated: {id}");
    Ok(ApiResponse::new(record))
}

/// DELETE /attendance/{id}
///
/// Removes a record (teacher/admin).
#[tracing::instrument(skip(state, auth))]
pub async fn delete_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    // ---
    auth.0.require_staff()?;

    state.ledger().delete(id).await?;
    tracing::info!("Attendance record deleted: {id}");
    Ok(StatusCode::NO_CONTENT)
}
