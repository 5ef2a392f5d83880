use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Wrapper type for successful API responses.
///
/// Carries the envelope clients expect: a success flag plus the payload.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    // ---
    pub fn new(data: T) -> Self {
        // ---
        Self {
            success: true,
            data,
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        axum::Json(self).into_response()
    }
}
