//! Router assembly: routes, middleware layers, and API documentation.

use std::time::Duration;

use axum::{Router, routing::get};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers::{
    ApiDoc, export_get_handler, export_post_handler, health_check_handler, liveness_handler,
    readiness_handler,
};
use crate::app::AppState;

/// Handler-level timeout; generous because large buffered exports encode
/// in-line.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Filter payloads are small; anything bigger is malformed.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/export", get(export_get_handler).post(export_post_handler))
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
