//! REST API module using Axum
//!
//! Session uploads, view evaluation, cascading filters and CSV export under
//! `/api/v1`, plus a root-level `/health` for load balancers.

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::DashboardState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `DWDM_CORS_ORIGINS` to a comma-separated list of allowed origins
/// for development.
fn build_cors_layer() -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE];
    match std::env::var("DWDM_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(methods)
                .allow_headers([header::CONTENT_TYPE])
        }
        Err(_) => CorsLayer::new().allow_methods(methods).allow_headers([header::CONTENT_TYPE]),
    }
}

/// Create the complete application router.
///
/// Request bodies are capped at `server.max_upload_mb`.
pub fn create_app(state: DashboardState) -> Router {
    let cors = build_cors_layer();
    let limit_bytes = state.config.server.max_upload_mb.saturating_mul(1024 * 1024);

    Router::new()
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(routes::legacy_routes(state))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
