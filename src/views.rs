//! View dispatcher: fetch inputs from the session, run the matching engine,
//! return a report.

use crate::analysis::{
    compute_core, compute_eol, evaluate_family, reconcile, analyze_log, AnalysisError, CoreReport, EolReport,
    FamilyReport, FlappingReport, MetricFamily, ThresholdEvaluator, WasonReport,
};
use crate::config::MonitorConfig;
use crate::reference::{ReferenceError, ReferenceStore};
use crate::session::{SessionContext, UploadSlot};
use crate::types::{Summary, Table};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Cpu,
    Fan,
    Msu,
    Line,
    Client,
    Osc,
    LossEol,
    LossCore,
    Wason,
}

impl View {
    pub const ALL: [Self; 9] = [
        Self::Cpu,
        Self::Fan,
        Self::Msu,
        Self::Line,
        Self::Client,
        Self::Osc,
        Self::LossEol,
        Self::LossCore,
        Self::Wason,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Fan => "fan",
            Self::Msu => "msu",
            Self::Line => "line",
            Self::Client => "client",
            Self::Osc => "osc",
            Self::LossEol => "loss-eol",
            Self::LossCore => "loss-core",
            Self::Wason => "wason",
        }
    }

    pub fn family(self) -> Option<MetricFamily> {
        match self {
            Self::Cpu => Some(MetricFamily::Cpu),
            Self::Fan => Some(MetricFamily::Fan),
            Self::Msu => Some(MetricFamily::Msu),
            Self::Line => Some(MetricFamily::Line),
            Self::Client => Some(MetricFamily::Client),
            _ => None,
        }
    }

    /// Uploads the view cannot run without. Family views also need a
    /// reference table, from the session or the store.
    pub fn required_uploads(self) -> &'static [UploadSlot] {
        match self {
            Self::Cpu => &[UploadSlot::Measurement(MetricFamily::Cpu)],
            Self::Fan => &[UploadSlot::Measurement(MetricFamily::Fan)],
            Self::Msu => &[UploadSlot::Measurement(MetricFamily::Msu)],
            Self::Line => &[UploadSlot::Measurement(MetricFamily::Line)],
            Self::Client => &[UploadSlot::Measurement(MetricFamily::Client)],
            Self::Osc => &[UploadSlot::OscOptical, UploadSlot::FmAlarms],
            Self::LossEol | Self::LossCore => &[UploadSlot::EolRaw, UploadSlot::EolReference],
            Self::Wason => &[UploadSlot::WasonLog],
        }
    }

    /// Cascading filter columns for this view's result table.
    pub fn filter_columns(self, config: &MonitorConfig) -> Vec<String> {
        let fixed: &[&str] = match self {
            Self::Osc => &["ME", "Measure Object"],
            Self::LossEol => &["Link Name", "Status"],
            Self::LossCore => &["Forward Link", "Status"],
            Self::Wason => &["Verdict", "Reason"],
            _ => return config.filter.columns.clone(),
        };
        fixed.iter().map(|c| (*c).to_string()).collect()
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("unknown view '{s}'"))
    }
}

// ============================================================================
// Reports
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewReport {
    Family(FamilyReport),
    Flapping(FlappingReport),
    Eol(EolReport),
    Core(CoreReport),
    Wason(WasonReport),
}

impl ViewReport {
    pub fn summary(&self) -> Summary {
        match self {
            Self::Family(r) => r.summary,
            Self::Flapping(r) => r.summary,
            Self::Eol(r) => r.summary,
            Self::Core(r) => r.summary,
            Self::Wason(r) => r.summary,
        }
    }

    /// Flattened result table with a trailing `Status` column.
    pub fn to_table(&self) -> Table {
        match self {
            Self::Family(r) => r.to_table(),
            Self::Flapping(r) => r.to_table(),
            Self::Eol(r) => r.to_table(),
            Self::Core(r) => r.to_table(),
            Self::Wason(r) => r.to_table(),
        }
    }

    /// Narrow attenuation reports to links naming `me`; other reports are
    /// returned unchanged.
    pub fn for_managed_element(self, me: &str) -> Self {
        match self {
            Self::Eol(r) => Self::Eol(r.filtered(me)),
            Self::Core(r) => Self::Core(r.filtered(me)),
            other => other,
        }
    }
}

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view '{view}' needs an upload in slot '{slot}'")]
    MissingUpload { view: View, slot: UploadSlot },
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
}

fn required_table(session: &SessionContext, view: View, slot: UploadSlot) -> Result<&Table, ViewError> {
    session.table(slot).ok_or(ViewError::MissingUpload { view, slot })
}

fn reference_table<'s>(
    session: &'s SessionContext,
    store: &dyn ReferenceStore,
    family: MetricFamily,
) -> Result<Cow<'s, Table>, ViewError> {
    match session.reference_override(family) {
        Some(table) => Ok(Cow::Borrowed(table)),
        None => Ok(Cow::Owned(store.reference_table(family)?)),
    }
}

fn run_family(
    view: View,
    family: MetricFamily,
    session: &SessionContext,
    store: &dyn ReferenceStore,
    config: &MonitorConfig,
) -> Result<ViewReport, ViewError> {
    let measurements = required_table(session, view, UploadSlot::Measurement(family))?;
    let reference = reference_table(session, store, family)?;
    let evaluator = ThresholdEvaluator::new(family, config.thresholds.fan.caps.clone());
    Ok(ViewReport::Family(evaluate_family(measurements, &reference, &evaluator)?))
}

/// Run one view over the session's current uploads.
pub fn run_view(
    view: View,
    session: &SessionContext,
    store: &dyn ReferenceStore,
    config: &MonitorConfig,
) -> Result<ViewReport, ViewError> {
    let started = Instant::now();
    let thresholds = &config.thresholds;

    let report = match view {
        View::Cpu => run_family(view, MetricFamily::Cpu, session, store, config)?,
        View::Fan => run_family(view, MetricFamily::Fan, session, store, config)?,
        View::Msu => run_family(view, MetricFamily::Msu, session, store, config)?,
        View::Line => run_family(view, MetricFamily::Line, session, store, config)?,
        View::Client => run_family(view, MetricFamily::Client, session, store, config)?,
        View::Osc => {
            let optical = required_table(session, view, UploadSlot::OscOptical)?;
            let alarms = required_table(session, view, UploadSlot::FmAlarms)?;
            ViewReport::Flapping(reconcile(optical, alarms, thresholds.flapping.swing_db)?)
        }
        View::LossEol | View::LossCore => {
            let raw = required_table(session, view, UploadSlot::EolRaw)?;
            let reference = required_table(session, view, UploadSlot::EolReference)?;
            let eol = compute_eol(reference, raw, &thresholds.attenuation)?;
            if view == View::LossCore {
                ViewReport::Core(compute_core(&eol, &thresholds.attenuation))
            } else {
                ViewReport::Eol(eol)
            }
        }
        View::Wason => {
            let log = session.wason_log().ok_or(ViewError::MissingUpload {
                view,
                slot: UploadSlot::WasonLog,
            })?;
            ViewReport::Wason(analyze_log(log))
        }
    };

    info!(
        view = %view,
        summary = %report.summary(),
        elapsed_ms = started.elapsed().as_millis(),
        "View computed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::InMemoryReferenceStore;

    #[test]
    fn test_view_names_round_trip() {
        for view in View::ALL {
            assert_eq!(view.as_str().parse::<View>().unwrap(), view);
            assert_eq!(
                serde_json::to_value(view).unwrap(),
                serde_json::Value::String(view.as_str().to_string())
            );
        }
    }

    #[test]
    fn test_missing_upload_names_slot() {
        let err = run_view(
            View::Osc,
            &SessionContext::new(),
            &InMemoryReferenceStore::new(),
            &MonitorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ViewError::MissingUpload { slot: UploadSlot::OscOptical, .. }));
    }

    #[test]
    fn test_missing_reference_is_reference_error() {
        let mut session = SessionContext::new();
        session
            .store_upload(UploadSlot::Measurement(MetricFamily::Cpu), b"ME,Measure Object\nA,B\n")
            .unwrap();
        let err = run_view(View::Cpu, &session, &InMemoryReferenceStore::new(), &MonitorConfig::default())
            .unwrap_err();
        assert!(matches!(err, ViewError::Reference(_)));
    }

    #[test]
    fn test_session_reference_overrides_store() {
        let mut session = SessionContext::new();
        session
            .store_upload(
                UploadSlot::Measurement(MetricFamily::Msu),
                b"ME,Measure Object,Laser Bias Current(mA)\nNE1,1-MSU,80\n",
            )
            .unwrap();
        session
            .store_upload(UploadSlot::Reference(MetricFamily::Msu), b"Mapping,Maximum threshold\nNE11-MSU,70\n")
            .unwrap();
        let report = run_view(View::Msu, &session, &InMemoryReferenceStore::new(), &MonitorConfig::default())
            .unwrap();
        assert_eq!(report.summary(), Summary::NotOk);
        assert_eq!(report.to_table().cell(0, "Status").to_text(), "fail");
    }

    #[test]
    fn test_loss_core_runs_from_eol_uploads() {
        let mut session = SessionContext::new();
        session
            .store_upload(UploadSlot::EolReference, b"Link Name,EOL(dB)\nA_B,20\nB_A,20\n")
            .unwrap();
        session
            .store_upload(
                UploadSlot::EolRaw,
                b"Source Port,Sink Port,Optical Attenuation (dB)\nA,B,21\nB,A,24.5\n",
            )
            .unwrap();
        let report = run_view(View::LossCore, &session, &InMemoryReferenceStore::new(), &MonitorConfig::default())
            .unwrap();
        let ViewReport::Core(core) = report else {
            panic!("expected core report");
        };
        assert_eq!(core.pairs.len(), 1);
        assert_eq!(core.summary, Summary::NotOk);
    }
}
