//! API request handlers

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::info;
use tracing::warn;

use crate::api::types::*;
use crate::models::SelectionResult;
use crate::pipeline::MatchPipeline;
use crate::router::ExperimentConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MatchPipeline>,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

fn bad_request<T>(message: impl Into<String>) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message)))
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pipeline: state.pipeline.status(),
    }))
}

/// Match one questionnaire submission
pub async fn match_profile(
    State(state): State<AppState>,
    body: Result<Json<MatchRequest>, JsonRejection>,
) -> ApiResult<SelectionResult> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    let (raw, options) = request.into_parts();
    info!(strategy = ?options.strategy, "POST /api/match");

    if let Some(threshold) = options.min_similarity {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(bad_request("min_similarity must be between 0 and 1"));
        }
    }

    let result = state.pipeline.match_profile(&raw, &options).await;
    Ok(Json(ApiResponse::success(result)))
}

/// Match counters and cache statistics
pub async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<StatsResponse>> {
    info!("GET /api/stats");
    let cache = state.pipeline.cache_stats();
    Json(ApiResponse::success(StatsResponse {
        matches: state.pipeline.analytics(),
        cache_hit_rate: cache.hit_rate(),
        cache,
        experiment: state.pipeline.router().snapshot(),
    }))
}

/// Current experiment split
pub async fn get_experiment(State(state): State<AppState>) -> Json<ApiResponse<ExperimentConfig>> {
    Json(ApiResponse::success(state.pipeline.router().snapshot()))
}

/// Hot-swap the experiment split
pub async fn put_experiment(
    State(state): State<AppState>,
    body: Result<Json<ExperimentConfig>, JsonRejection>,
) -> ApiResult<ExperimentUpdateResponse> {
    let Json(config) = body.map_err(|e| bad_request(e.body_text()))?;
    info!("PUT /api/experiment");

    match state.pipeline.router().update(config.clone()) {
        Ok(previous) => Ok(Json(ApiResponse::success(ExperimentUpdateResponse {
            previous,
            current: config,
        }))),
        Err(e) => {
            warn!("Rejected experiment update: {}", e);
            Err(bad_request(e.to_string()))
        }
    }
}
