pub mod agent;
pub mod cameras;
pub mod daynight;
pub mod images;
pub mod overlay;

use axum::{Json, http::StatusCode};
use tracing::error;

use crate::core::error::CoreError;

pub(crate) type ApiResponse = (StatusCode, Json<serde_json::Value>);

pub(crate) fn ok(body: serde_json::Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

pub(crate) fn rejected(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (
        status,
        Json(serde_json::json!({
            "success": false,
            "error": message.into()
        })),
    )
}

/// `UnknownCamera` is the caller's mistake; anything else is ours.
pub(crate) fn error_response(context: &str, err: anyhow::Error) -> ApiResponse {
    if let Some(CoreError::UnknownCamera(id)) = err.downcast_ref::<CoreError>() {
        return rejected(StatusCode::NOT_FOUND, format!("unknown camera: {}", id));
    }
    error!("{} failed: {:#}", context, err);
    rejected(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
