//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Config discovery
// ============================================================================

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "DWDM_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "dwdm_config.toml";

// ============================================================================
// Server
// ============================================================================

pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

/// Upload body limit (MiB). NMS exports of a month of 15-minute samples for
/// a large ring stay well under this.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 32;

// ============================================================================
// Reference data
// ============================================================================

pub const DEFAULT_REFERENCE_DIR: &str = "data/reference";

// ============================================================================
// Thresholds
// ============================================================================

/// Input-power swing above which an OSC row is a flapping candidate (dB).
pub const DEFAULT_SWING_DB: f64 = 2.0;

/// Default cascading-filter columns for the metric-family views.
pub const DEFAULT_FILTER_COLUMNS: [&str; 3] = ["Site Name", "ME", "Measure Object"];
