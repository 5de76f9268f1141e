use crate::api::{handlers, AppState};
use crate::metrics::track_metrics;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        .route("/health/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        // Search
        .route("/v1/search", post(handlers::search))
        // Field catalog
        .route("/v1/fields", get(handlers::list_fields))
        .route("/v1/fields/:name", get(handlers::get_field))
        .route("/v1/schema/refresh", post(handlers::refresh_schema))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(middleware::from_fn(track_metrics))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
