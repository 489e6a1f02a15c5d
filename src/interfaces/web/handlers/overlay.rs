use axum::{Json, extract::State};

use super::super::AppState;
use super::{ApiResponse, error_response, ok};
use crate::core::engine::overlay::OverlayUpdateRequest;

pub async fn enqueue_overlay_endpoint(
    State(state): State<AppState>,
    Json(request): Json<OverlayUpdateRequest>,
) -> ApiResponse {
    match state.service.enqueue_overlay(request).await {
        Ok(()) => ok(serde_json::json!({ "success": true })),
        Err(e) => error_response("Overlay enqueue", e),
    }
}
