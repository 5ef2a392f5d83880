use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Welcome to the Attendance API 👋
Version: {version}

Available endpoints:
  - POST   /auth/register           - Create a user account
  - POST   /auth/login              - Issue a bearer session token
  - GET    /auth/profile            - Fetch the caller's account
  - POST   /devices/register        - Bind a device to the caller
  - POST   /attendance/mark         - Mark attendance (QR + device + selfie)
  - POST   /attendance/qr           - Issue a class QR session token (staff)
  - GET    /attendance              - List all records (staff)
  - GET    /attendance/today        - List today's records
  - GET    /attendance/user/{{id}}    - One user's attendance history
  - GET    /attendance/{{id}}         - Fetch one record
  - PUT    /attendance/{{id}}         - Update a record (staff)
  - DELETE /attendance/{{id}}         - Delete a record (staff)
  - GET    /users                   - List users (staff)
  - GET    /health                  - Light health check
  - GET    /health?mode=full        - Full health check (includes Redis)
  - GET    /metrics                 - Prometheus metrics
"#
    )
}
