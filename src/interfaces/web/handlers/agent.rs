use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use super::super::AppState;
use super::{ApiResponse, error_response, ok, rejected};
use crate::core::config::validate_coordinates;
use crate::core::solar;
use crate::core::store::types::AgentRecord;

pub async fn get_agent_endpoint(State(state): State<AppState>) -> ApiResponse {
    match state.store.get_agent().await {
        Ok(agent) => ok(serde_json::json!({
            "success": true,
            "agent": agent
        })),
        Err(e) => error_response("Agent read", e),
    }
}

/// New coordinates move every camera's next transition, so a resync follows.
pub async fn update_agent_endpoint(
    State(state): State<AppState>,
    Json(agent): Json<AgentRecord>,
) -> ApiResponse {
    if let Err(e) = validate_coordinates(agent.latitude, agent.longitude) {
        return rejected(StatusCode::BAD_REQUEST, e.to_string());
    }
    if let Err(e) = state.store.update_agent(&agent).await {
        return error_response("Agent update", e);
    }
    if let Err(e) = state.service.enqueue_resync().await {
        return error_response("Day/night resync", e);
    }
    ok(serde_json::json!({
        "success": true,
        "agent": agent
    }))
}

pub async fn sun_endpoint(State(state): State<AppState>) -> ApiResponse {
    let agent = match state.store.get_agent().await {
        Ok(agent) => agent,
        Err(e) => return error_response("Agent read", e),
    };
    let now = Utc::now();
    let sun_up = solar::is_sun_up(agent.latitude, agent.longitude, now);

    let next = match solar::next_transition(agent.latitude, agent.longitude, now) {
        Ok(t) => serde_json::json!({
            "at": t.at.to_rfc3339(),
            "at_local": solar::local_display(t.at),
            "phase": t.phase
        }),
        Err(e) => serde_json::json!({ "error": e.to_string() }),
    };

    ok(serde_json::json!({
        "success": true,
        "sun_up": sun_up,
        "next": next
    }))
}
