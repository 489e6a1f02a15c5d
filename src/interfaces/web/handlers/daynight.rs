use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use super::super::AppState;
use super::{ApiResponse, error_response, ok, rejected};
use crate::core::solar::SunPhase;

pub async fn resync_endpoint(State(state): State<AppState>) -> ApiResponse {
    match state.service.enqueue_resync().await {
        Ok(()) => ok(serde_json::json!({ "success": true })),
        Err(e) => error_response("Day/night resync", e),
    }
}

pub async fn delete_schedule_endpoint(
    Path(camera_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResponse {
    match state.service.cancel_one(&camera_id).await {
        Ok(()) => ok(serde_json::json!({ "success": true })),
        Err(e) => error_response("Day/night schedule delete", e),
    }
}

pub async fn manual_flip_endpoint(
    Path((camera_id, phase)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResponse {
    let Some(phase) = SunPhase::parse(&phase) else {
        return rejected(
            StatusCode::BAD_REQUEST,
            format!("unknown phase '{}': use sunrise or sunset", phase),
        );
    };

    match state.service.enqueue_manual_flip(&camera_id, phase).await {
        Ok(()) => ok(serde_json::json!({
            "success": true,
            "phase": phase
        })),
        Err(e) => error_response("Manual day/night flip", e),
    }
}
