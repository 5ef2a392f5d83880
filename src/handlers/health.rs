use crate::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

#[derive(serde::Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct HealthQuery {
    mode: Option<String>,
}

/// Responds with the health status of the server.
///
/// - By default (no query parameters), performs a light check to confirm the web server
///   is running.
///
/// - If `mode=full` is passed as a query parameter, also pings the Redis backend that
///   holds session state.
///
/// # Responses
/// - `200 OK` with `{ "status": "ok" }` if server (and Redis, in full mode) are healthy.
/// - `500 INTERNAL SERVER ERROR` with `{ "status": "error" }` if the Redis ping fails in full mode.
pub async fn health_check(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> (StatusCode, Json<HealthResponse>) {
    match params.mode.as_deref() {
        Some("full") => {
            // Full health check: Ping Redis
            let mut conn = match state.get_conn().await {
                Ok(conn) => conn,
                Err(_) => {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(HealthResponse { status: "error" }),
                    )
                }
            };

            let ping_result: redis::RedisResult<String> =
                redis::cmd("PING").query_async(&mut conn).await;
            match ping_result {
                Ok(_) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
                Err(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(HealthResponse { status: "error" }),
                ),
            }
        }
        _ => {
            // Light health check
            (StatusCode::OK, Json(HealthResponse { status: "ok" }))
        }
    }
}
