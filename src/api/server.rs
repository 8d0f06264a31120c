//! HTTP server implementation

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::AppState;
use crate::api::routes;
use crate::config::AppConfig;
use crate::pipeline::MatchPipeline;
use crate::Result;

/// Router with the `/api` routes and middleware layers
pub fn build_app(pipeline: Arc<MatchPipeline>, enable_cors: bool) -> Router {
    let state = AppState { pipeline };

    let mut app = Router::new()
        .nest("/api", routes::api_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        );

    if enable_cors {
        info!("CORS enabled");
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Start the API server
pub async fn serve_api(config: &AppConfig, host: String, port: u16, enable_cors: bool) -> Result<()> {
    info!("Starting cohort-match API server...");

    let pipeline = Arc::new(MatchPipeline::from_config(config).await?);
    let app = build_app(pipeline, enable_cors);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET  /api/health      - Health check and pipeline status");
    info!("  POST /api/match       - Match a questionnaire submission");
    info!("  GET  /api/stats       - Match and cache statistics");
    info!("  GET  /api/experiment  - Current experiment split");
    info!("  PUT  /api/experiment  - Replace the experiment split");

    axum::serve(listener, app).await?;

    Ok(())
}
