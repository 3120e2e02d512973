//! API route definitions
//!
//! - /api/v1/health - Liveness plus current uploads
//! - /api/v1/views - View catalogue and readiness
//! - /api/v1/uploads/:slot - Replace or clear one input
//! - /api/v1/views/:view - Evaluate a view
//! - /api/v1/views/:view/filter - Cascading filter pass
//! - /api/v1/views/:view/export.csv - CSV download
//! - /api/v1/config - Active configuration and validation

use axum::{
    routing::{get, post, put},
    Router,
};

use super::handlers::{self, DashboardState};

/// Create all API routes
pub fn api_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/views", get(handlers::list_views))
        .route("/uploads", axum::routing::delete(handlers::delete_all_uploads))
        .route(
            "/uploads/:slot",
            put(handlers::put_upload).delete(handlers::delete_upload),
        )
        .route("/views/:view", get(handlers::get_view))
        .route("/views/:view/filter", post(handlers::filter_view))
        .route("/views/:view/export.csv", get(handlers::export_view))
        .route("/config", get(handlers::get_config))
        .route("/config/validate", post(handlers::validate_config))
        .with_state(state)
}

/// Root-level health endpoint for load balancers
pub fn legacy_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::reference::InMemoryReferenceStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> DashboardState {
        DashboardState::new(Arc::new(InMemoryReferenceStore::new()), MonitorConfig::default())
    }

    async fn status_of(app: Router, method: &str, uri: &str, body: &str) -> StatusCode {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_api_routes_health() {
        let app = api_routes(create_test_state());
        assert_eq!(status_of(app, "GET", "/health", "").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_views() {
        let app = api_routes(create_test_state());
        assert_eq!(status_of(app, "GET", "/views", "").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_view_is_not_found() {
        let app = api_routes(create_test_state());
        assert_eq!(status_of(app, "GET", "/views/temperature", "").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_view_without_upload_is_conflict() {
        let app = api_routes(create_test_state());
        assert_eq!(status_of(app, "GET", "/views/wason", "").await, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_slot_is_not_found() {
        let app = api_routes(create_test_state());
        assert_eq!(status_of(app, "PUT", "/uploads/pdh", "a\n1\n").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_upload_is_bad_request() {
        let app = api_routes(create_test_state());
        assert_eq!(status_of(app, "PUT", "/uploads/cpu", "\n\n").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_legacy_health() {
        let app = legacy_routes(create_test_state());
        assert_eq!(status_of(app, "GET", "/health", "").await, StatusCode::OK);
    }
}
