use axum::{Json, extract::State, http::StatusCode};
use tracing::{info, warn};

use super::super::AppState;
use super::{ApiResponse, error_response, ok, rejected};
use crate::core::store::types::CameraUpdate;

pub async fn list_cameras_endpoint(State(state): State<AppState>) -> ApiResponse {
    match state.store.list_cameras().await {
        Ok(cameras) => ok(serde_json::json!({
            "success": true,
            "cameras": cameras
        })),
        Err(e) => error_response("Camera list", e),
    }
}

/// Save a camera's configuration and bring its day/night chain in line with
/// the new setting. Fields the body omits keep their stored values.
pub async fn upsert_camera_endpoint(
    State(state): State<AppState>,
    Json(mut update): Json<CameraUpdate>,
) -> ApiResponse {
    update.id = update.id.trim().to_string();
    if update.id.is_empty() {
        return rejected(StatusCode::BAD_REQUEST, "id is required");
    }

    let existing = match state.store.get_camera(&update.id).await {
        Ok(existing) => existing,
        Err(e) => return error_response("Camera read", e),
    };
    let camera = update.apply(existing);

    if let Err(e) = state.store.upsert_camera(&camera).await {
        return error_response("Camera upsert", e);
    }
    info!("Camera {} saved", camera.label());

    let rescheduled = if camera.update_day_night_mode_enabled {
        state.service.schedule_one(&camera.id).await.map(|_| ())
    } else {
        state.service.cancel_one(&camera.id).await
    };
    if let Err(e) = rescheduled {
        warn!("Camera {} saved but day/night not updated: {:#}", camera.id, e);
    }

    match state.store.get_camera(&camera.id).await {
        Ok(saved) => ok(serde_json::json!({
            "success": true,
            "camera": saved
        })),
        Err(e) => error_response("Camera reload", e),
    }
}
