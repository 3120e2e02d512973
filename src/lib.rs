//! dwdm-monitor: DWDM optical transport monitoring
//!
//! Turns NMS exports into pass/fail verdicts.
//!
//! ## Architecture
//!
//! - **Ingest**: CSV exports and raw log text into typed [`types::Table`]s
//! - **Analysis**: threshold evaluation per metric family, flapping
//!   reconciliation, WASON call classification, attenuation margins and
//!   the cascading filter
//! - **Views**: one named report per screen, computed from a
//!   [`session::SessionContext`] and a [`reference::ReferenceStore`]
//! - **API**: axum router exposing uploads, views, filters and export

pub mod analysis;
pub mod api;
pub mod config;
pub mod ingest;
pub mod reference;
pub mod session;
pub mod types;
pub mod views;

// Re-export configuration
pub use config::MonitorConfig;

// Re-export commonly used types
pub use types::{Cell, Status, Summary, Table};

// Re-export the engines
pub use analysis::{
    analyze_log, compute_core, compute_eol, evaluate_family, reconcile, AnalysisError, CascadingFilter,
    MetricFamily, ThresholdEvaluator,
};

// Re-export session and views
pub use reference::{DirectoryReferenceStore, InMemoryReferenceStore, ReferenceStore};
pub use session::{SessionContext, UploadSlot};
pub use views::{run_view, View, ViewReport};
