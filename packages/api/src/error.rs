// ABOUTME: Maps sandbox error taxonomy onto HTTP statuses for the control surface
// ABOUTME: Client-facing failures carry a JSON error body, never a raw internal error chain

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use skiff_sandbox::SandboxError;
use tracing::error;

pub struct ApiError(pub SandboxError);

impl From<SandboxError> for ApiError {
    fn from(err: SandboxError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SandboxError::NotFound(_) => StatusCode::NOT_FOUND,
            SandboxError::UnsupportedOperation { .. } | SandboxError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            SandboxError::Provision(_) => StatusCode::BAD_GATEWAY,
            SandboxError::Execution(_) | SandboxError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
