//! Analysis engine: pure computations over in-memory tables.
//!
//! ## Components
//!
//! - [`keys`]: header normalization and composite lookup keys
//! - [`join`]: measurement ⋈ reference on the composite key
//! - [`families`] + [`evaluator`]: declarative per-family threshold rules
//! - [`flapping`]: swing events reconciled against fault alarms
//! - [`wason`]: routing log call blocks and restoration verdicts
//! - [`attenuation`]: EOL margins and forward/reverse core loss
//! - [`cascade`]: cascading result filter
//!
//! Nothing here performs I/O. Schema problems surface as [`AnalysisError`];
//! empty joins and unparsable cells do not.

pub mod attenuation;
pub mod cascade;
pub mod error;
pub mod evaluator;
pub mod families;
pub mod flapping;
pub mod join;
pub mod keys;
pub mod wason;

pub use attenuation::{compute_core, compute_eol, AttenuationSettings, CoreReport, EolReport, PairingMode};
pub use cascade::{CascadingFilter, FilterPass, Selections};
pub use error::{AnalysisError, TableRole};
pub use evaluator::{evaluate_family, Breach, FamilyReport, ThresholdEvaluator, Verdict};
pub use families::{default_fan_caps, FanCap, MetricFamily};
pub use flapping::{reconcile, FlappingReport};
pub use join::{join, JoinOutcome, JoinedRow};
pub use wason::{analyze_log, export_csv, WasonReport};
