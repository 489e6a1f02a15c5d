use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{agent, cameras, daynight, images, overlay};

fn build_localhost_cors(api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/overlay", post(overlay::enqueue_overlay_endpoint))
        .route(
            "/api/images/{id}",
            get(images::get_images_endpoint).post(images::enqueue_image_endpoint),
        )
        .route("/api/daynight/resync", post(daynight::resync_endpoint))
        .route(
            "/api/daynight/{camera_id}",
            delete(daynight::delete_schedule_endpoint),
        )
        .route(
            "/api/daynight/{camera_id}/{phase}",
            post(daynight::manual_flip_endpoint),
        )
        .route(
            "/api/cameras",
            get(cameras::list_cameras_endpoint).put(cameras::upsert_camera_endpoint),
        )
        .route(
            "/api/agent",
            get(agent::get_agent_endpoint).put(agent::update_agent_endpoint),
        )
        .route("/api/sun", get(agent::sun_endpoint))
        .route("/api/logs", get(super::sse_logs_endpoint))
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(state.api_port))
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}
