//! API route handlers
//!
//! Upload management, view evaluation, cascading filters, CSV export and
//! configuration inspection. All handlers return the [`super::envelope`]
//! shapes except the CSV export.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::analysis::{export_csv, AnalysisError, Selections};
use crate::config::validation::validate_document;
use crate::config::MonitorConfig;
use crate::ingest::write_csv;
use crate::reference::{ReferenceError, ReferenceStore};
use crate::session::{SessionContext, UploadSlot};
use crate::views::{run_view, View, ViewError, ViewReport};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct DashboardState {
    /// Uploaded inputs and filter state
    pub session: Arc<RwLock<SessionContext>>,
    /// Source of per-family reference tables
    pub store: Arc<dyn ReferenceStore>,
    /// Configuration the server was started with
    pub config: Arc<MonitorConfig>,
}

impl DashboardState {
    pub fn new(store: Arc<dyn ReferenceStore>, config: MonitorConfig) -> Self {
        Self {
            session: Arc::new(RwLock::new(SessionContext::new())),
            store,
            config: Arc::new(config),
        }
    }
}

// ============================================================================
// Error mapping
// ============================================================================

fn view_error_response(err: ViewError) -> Response {
    match err {
        ViewError::MissingUpload { view, slot } => ApiErrorResponse::conflict(
            format!("view '{view}' needs an upload in slot '{slot}'"),
            serde_json::json!({ "view": view, "slot": slot }),
        ),
        ViewError::Analysis(e) => {
            let message = e.to_string();
            let AnalysisError::MissingColumns {
                role,
                required,
                detected,
                missing,
            } = e;
            ApiErrorResponse::schema(
                message,
                serde_json::json!({
                    "role": role,
                    "required": required,
                    "detected": detected,
                    "missing": missing,
                }),
            )
        }
        ViewError::Reference(e @ ReferenceError::NotFound { .. }) => ApiErrorResponse::not_found(e.to_string()),
        ViewError::Reference(e) => {
            warn!(error = %e, "Reference store failure");
            ApiErrorResponse::internal(e.to_string())
        }
    }
}

fn parse_view(raw: &str) -> Result<View, Response> {
    raw.parse::<View>().map_err(ApiErrorResponse::not_found)
}

fn parse_slot(raw: &str) -> Result<UploadSlot, Response> {
    raw.parse::<UploadSlot>().map_err(ApiErrorResponse::not_found)
}

/// Run `view` over a read snapshot of the session.
async fn compute(state: &DashboardState, view: View, me: Option<&str>) -> Result<ViewReport, Response> {
    let session = state.session.read().await;
    let report = run_view(view, &session, state.store.as_ref(), &state.config).map_err(view_error_response)?;
    Ok(match me {
        Some(me) if !me.trim().is_empty() => report.for_managed_element(me.trim()),
        _ => report,
    })
}

// ============================================================================
// Health & catalogue
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub site: String,
    pub reference_backend: &'static str,
    pub uploads: Vec<UploadSlot>,
}

/// GET /api/v1/health
pub async fn get_health(State(state): State<DashboardState>) -> Response {
    let uploads = state.session.read().await.uploaded();
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        site: state.config.site.name.clone(),
        reference_backend: state.store.backend_name(),
        uploads,
    })
}

#[derive(Debug, Serialize)]
pub struct ViewInfo {
    pub view: View,
    pub required_uploads: Vec<UploadSlot>,
    pub missing_uploads: Vec<UploadSlot>,
    pub ready: bool,
    pub filter_columns: Vec<String>,
}

/// GET /api/v1/views - Every view with its readiness
pub async fn list_views(State(state): State<DashboardState>) -> Response {
    let session = state.session.read().await;
    let views: Vec<ViewInfo> = View::ALL
        .into_iter()
        .map(|view| {
            let required = view.required_uploads().to_vec();
            let missing: Vec<UploadSlot> = required.iter().copied().filter(|s| !session.has(*s)).collect();
            ViewInfo {
                view,
                ready: missing.is_empty(),
                required_uploads: required,
                missing_uploads: missing,
                filter_columns: view.filter_columns(&state.config),
            }
        })
        .collect();
    ApiResponse::ok(views)
}

// ============================================================================
// Uploads
// ============================================================================

/// PUT /api/v1/uploads/:slot - Replace the slot with the request body
///
/// A body that fails to parse leaves the previous upload untouched.
pub async fn put_upload(
    State(state): State<DashboardState>,
    Path(slot): Path<String>,
    body: Bytes,
) -> Response {
    let slot = match parse_slot(&slot) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let mut session = state.session.write().await;
    match session.store_upload(slot, &body) {
        Ok(summary) => ApiResponse::ok(summary),
        Err(e) => {
            warn!(slot = %slot, error = %e, "Upload rejected");
            ApiErrorResponse::bad_request(e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub slot: UploadSlot,
    pub cleared: bool,
}

/// DELETE /api/v1/uploads/:slot
pub async fn delete_upload(State(state): State<DashboardState>, Path(slot): Path<String>) -> Response {
    let slot = match parse_slot(&slot) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let cleared = state.session.write().await.clear(slot);
    ApiResponse::ok(ClearResponse { slot, cleared })
}

/// DELETE /api/v1/uploads - Reset the whole session
pub async fn delete_all_uploads(State(state): State<DashboardState>) -> Response {
    state.session.write().await.clear_all();
    info!("Session cleared");
    ApiResponse::ok(serde_json::json!({ "cleared": true }))
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    /// Restrict attenuation views to links naming this managed element.
    pub me: Option<String>,
}

/// GET /api/v1/views/:view
pub async fn get_view(
    State(state): State<DashboardState>,
    Path(view): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let view = match parse_view(&view) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match compute(&state, view, query.me.as_deref()).await {
        Ok(report) => ApiResponse::ok(report),
        Err(resp) => resp,
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterRequest {
    /// Replaces the stored selections when present.
    #[serde(default)]
    pub selections: Option<Selections>,
    /// Drop every stored selection before the pass.
    #[serde(default)]
    pub reset: bool,
}

/// POST /api/v1/views/:view/filter - One cascading filter pass
///
/// Selections persist in the session; pruned values are reported and
/// dropped.
pub async fn filter_view(
    State(state): State<DashboardState>,
    Path(view): Path<String>,
    Json(request): Json<FilterRequest>,
) -> Response {
    let view = match parse_view(&view) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut session = state.session.write().await;
    let table = match run_view(view, &session, state.store.as_ref(), &state.config) {
        Ok(report) => report.to_table(),
        Err(e) => return view_error_response(e),
    };

    let filter = session.filter_mut(view, view.filter_columns(&state.config));
    if request.reset {
        filter.clear();
    }
    if let Some(selections) = request.selections {
        filter.set_selections(selections);
    }
    let pass = filter.apply(&table);
    if !pass.pruned.is_empty() {
        info!(view = %view, pruned = pass.pruned.len(), "Stale selections pruned");
    }
    ApiResponse::ok(pass)
}

/// GET /api/v1/views/:view/export.csv
pub async fn export_view(
    State(state): State<DashboardState>,
    Path(view): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let view = match parse_view(&view) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let report = match compute(&state, view, query.me.as_deref()).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let body = match &report {
        ViewReport::Wason(wason) => export_csv(wason),
        other => write_csv(&other.to_table()),
    };
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{view}.csv\"")),
        ],
        body,
    )
        .into_response()
}

// ============================================================================
// Configuration
// ============================================================================

/// GET /api/v1/config - Active configuration
pub async fn get_config(State(state): State<DashboardState>) -> Response {
    ApiResponse::ok(state.config.as_ref())
}

/// POST /api/v1/config/validate - Validate a TOML document without loading it
pub async fn validate_config(body: String) -> Response {
    let report = validate_document(&body);
    if !report.valid {
        info!(errors = report.errors.len(), "Candidate config rejected");
    }
    ApiResponse::ok(report)
}
