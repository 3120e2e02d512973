//! Monitor configuration: every operator-tunable threshold as a TOML value.
//!
//! Each struct implements `Default` with the values the dashboard has always
//! used, so a missing config file changes nothing.

use super::defaults;
use crate::analysis::{default_fan_caps, AttenuationSettings, FanCap};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `MonitorConfig::load()` which searches:
/// 1. `$DWDM_CONFIG` env var
/// 2. `./dwdm_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Deployment identification
    #[serde(default)]
    pub site: SiteInfo,

    /// Evaluation thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Reference table location
    #[serde(default)]
    pub reference: ReferenceConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Cascading filter columns
    #[serde(default)]
    pub filter: FilterConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$DWDM_CONFIG` environment variable
    /// 2. `./dwdm_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), site = %config.site.name, "Loaded config from DWDM_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from DWDM_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "DWDM_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(site = %config.site.name, "Loaded config from ./dwdm_config.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./dwdm_config.toml, using defaults");
                }
            }
        }

        info!("No dwdm_config.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate thresholds for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        let mut errors: Vec<String> = Vec::new();

        let mut patterns = HashSet::new();
        for cap in &t.fan.caps {
            if cap.pattern.trim().is_empty() {
                errors.push("thresholds.fan.caps: pattern must not be empty".to_string());
            } else if !patterns.insert(cap.pattern.as_str()) {
                errors.push(format!("thresholds.fan.caps: pattern '{}' listed twice", cap.pattern));
            }
            Self::check_positive(cap.max_rps, &format!("thresholds.fan.caps[{}].max_rps", cap.pattern), &mut errors);
        }

        if !t.flapping.swing_db.is_finite() || t.flapping.swing_db < 0.0 {
            errors.push(format!(
                "thresholds.flapping.swing_db: must be finite and >= 0 (got {})",
                t.flapping.swing_db
            ));
        }

        let a = &t.attenuation;
        if !a.eol_margin_db.is_finite() {
            errors.push(format!(
                "thresholds.attenuation.eol_margin_db: must be finite (got {})",
                a.eol_margin_db
            ));
        }
        Self::check_positive(a.eol_error_db, "thresholds.attenuation.eol_error_db", &mut errors);
        Self::check_positive(a.core_error_db, "thresholds.attenuation.core_error_db", &mut errors);

        if self.server.addr.parse::<SocketAddr>().is_err() {
            errors.push(format!("server.addr: '{}' is not a socket address", self.server.addr));
        }
        if self.server.max_upload_mb == 0 {
            errors.push("server.max_upload_mb: must be > 0".to_string());
        }

        if self.filter.columns.iter().any(|c| c.trim().is_empty()) {
            errors.push("filter.columns: column names must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
        // NaN comparisons silently pass, so test finiteness first
        if !value.is_finite() || value <= 0.0 {
            errors.push(format!("{name}: must be finite and > 0 (got {value})"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) if path.as_os_str().is_empty() => write!(f, "Config parse error: {}", e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Site Info
// ============================================================================

/// Identification metadata; appears in logs and report headers only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    #[serde(default = "default_site_name")]
    pub name: String,
}

fn default_site_name() -> String {
    "DEFAULT".to_string()
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            name: default_site_name(),
        }
    }
}

// ============================================================================
// Thresholds
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default)]
    pub fan: FanThresholds,

    #[serde(default)]
    pub flapping: FlappingThresholds,

    #[serde(default)]
    pub attenuation: AttenuationSettings,
}

/// Fan speed caps per fan-unit type.
///
/// ```toml
/// [[thresholds.fan.caps]]
/// pattern = "FCC"
/// max_rps = 120.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanThresholds {
    #[serde(default = "default_fan_caps")]
    pub caps: Vec<FanCap>,
}

impl Default for FanThresholds {
    fn default() -> Self {
        Self {
            caps: default_fan_caps(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlappingThresholds {
    /// Max − min input power above which a row is a swing event (dB).
    #[serde(default = "default_swing_db")]
    pub swing_db: f64,
}

fn default_swing_db() -> f64 {
    defaults::DEFAULT_SWING_DB
}

impl Default for FlappingThresholds {
    fn default() -> Self {
        Self {
            swing_db: default_swing_db(),
        }
    }
}

// ============================================================================
// Reference / Server / Filter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Directory holding `CPU.csv`, `FAN.csv`, `MSU.csv`, `LINE.csv`, `CLIENT.csv`.
    #[serde(default = "default_reference_dir")]
    pub dir: PathBuf,
}

fn default_reference_dir() -> PathBuf {
    PathBuf::from(defaults::DEFAULT_REFERENCE_DIR)
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            dir: default_reference_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `DWDM_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Upload body limit in MiB.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_server_addr() -> String {
    defaults::DEFAULT_SERVER_ADDR.to_string()
}

fn default_max_upload_mb() -> usize {
    defaults::DEFAULT_MAX_UPLOAD_MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Cascading filter columns for the metric-family views, in order.
    #[serde(default = "default_filter_columns")]
    pub columns: Vec<String>,
}

fn default_filter_columns() -> Vec<String> {
    defaults::DEFAULT_FILTER_COLUMNS.iter().map(|c| (*c).to_string()).collect()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            columns: default_filter_columns(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::PairingMode;

    #[test]
    fn test_defaults_validate() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = MonitorConfig::from_toml_str(
            r#"
[thresholds.attenuation]
pairing = "positional"
"#,
        )
        .unwrap();
        assert_eq!(config.thresholds.attenuation.pairing, PairingMode::Positional);
        assert_eq!(config.thresholds.attenuation.eol_margin_db, 1.0);
        assert_eq!(config.thresholds.fan.caps.len(), 4);
        assert_eq!(config.server.addr, defaults::DEFAULT_SERVER_ADDR);
    }

    #[test]
    fn test_custom_fan_caps_replace_defaults() {
        let config = MonitorConfig::from_toml_str(
            r#"
[[thresholds.fan.caps]]
pattern = "FCX"
max_rps = 90.0
"#,
        )
        .unwrap();
        assert_eq!(config.thresholds.fan.caps, vec![FanCap::new("FCX", 90.0)]);
    }

    #[test]
    fn test_duplicate_fan_pattern_is_error() {
        let mut config = MonitorConfig::default();
        config.thresholds.fan.caps.push(FanCap::new("FCC", 10.0));
        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert!(errors[0].contains("'FCC' listed twice")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_nan_threshold_is_error() {
        let mut config = MonitorConfig::default();
        config.thresholds.attenuation.core_error_db = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_bad_addr_is_error() {
        let err = MonitorConfig::from_toml_str("[server]\naddr = \"not an addr\"\n").unwrap_err();
        assert!(err.to_string().contains("server.addr"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = MonitorConfig::from_toml_str("[site\nname = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(..)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = MonitorConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(MonitorConfig::from_toml_str(&text).unwrap(), config);
    }
}
