use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};

use super::super::AppState;
use super::{ApiResponse, error_response, ok, rejected};

#[derive(serde::Deserialize, Default)]
pub struct EnqueueImageRequest {
    #[serde(default)]
    plate_coordinates: Option<String>,
}

pub async fn get_images_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResponse {
    match state.store.get_plate_images(&id).await {
        Ok(Some(record)) => ok(serde_json::json!({
            "success": true,
            "images": record
        })),
        Ok(None) => rejected(
            StatusCode::NOT_FOUND,
            format!("no images retrieved for {}", id),
        ),
        Err(e) => error_response("Image lookup", e),
    }
}

/// The body is optional; an empty one just queues the id.
pub async fn enqueue_image_endpoint(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResponse {
    let id = id.trim().to_string();
    if id.is_empty() {
        return rejected(StatusCode::BAD_REQUEST, "id is required");
    }

    let payload: EnqueueImageRequest = if body.is_empty() {
        EnqueueImageRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(payload) => payload,
            Err(e) => return rejected(StatusCode::BAD_REQUEST, e.to_string()),
        }
    };

    if let Some(coordinates) = payload
        .plate_coordinates
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        && let Err(e) = state.store.upsert_plate_group(&id, coordinates).await
    {
        return error_response("Plate coordinates update", e);
    }

    let queued = state.images.try_enqueue(&id);
    ok(serde_json::json!({
        "success": true,
        "queued": queued,
        "pending": state.images.pending()
    }))
}
