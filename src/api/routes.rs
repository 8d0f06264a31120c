//! API route definitions

use axum::routing::get;
use axum::routing::post;
use axum::Router;

use super::handlers;
use super::handlers::AppState;

/// Create the JSON API router
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/match", post(handlers::match_profile))
        .route("/stats", get(handlers::get_stats))
        .route(
            "/experiment",
            get(handlers::get_experiment).put(handlers::put_experiment),
        )
        .with_state(state)
}
