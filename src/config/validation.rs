//! Config validation: unknown-key detection with Levenshtein suggestions
//! and operational range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for MonitorConfig.
///
/// Maintained by hand to match the struct hierarchy in monitor_config.rs.
/// Any new field added to MonitorConfig must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [site]
        "site",
        "site.name",
        // [thresholds]
        "thresholds",
        // [thresholds.fan]
        "thresholds.fan",
        "thresholds.fan.caps",
        // [thresholds.flapping]
        "thresholds.flapping",
        "thresholds.flapping.swing_db",
        // [thresholds.attenuation]
        "thresholds.attenuation",
        "thresholds.attenuation.eol_margin_db",
        "thresholds.attenuation.eol_error_db",
        "thresholds.attenuation.core_error_db",
        "thresholds.attenuation.pairing",
        // [reference]
        "reference",
        "reference.dir",
        // [server]
        "server",
        "server.addr",
        "server.max_upload_mb",
        // [filter]
        "filter",
        "filter.columns",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.len();
    let b_len = b.len();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist <= 3 {
            if let Some((_, best_dist)) = best {
                if dist < best_dist {
                    best = Some((k, dist));
                }
            } else {
                best = Some((k, dist));
            }
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns. Existing configs
/// always continue to work.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(key, &known);
            let message = format!("Unknown config key '{key}'");
            warnings.push(ValidationWarning {
                field: key.clone(),
                message,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Operational Range Validation
// ============================================================================

fn range_warning(field: &str, message: String) -> ValidationWarning {
    ValidationWarning {
        field: field.to_string(),
        message,
        suggestion: None,
    }
}

/// Flag values that parse and validate but are unusual for DWDM equipment.
pub fn validate_operational_ranges(config: &super::MonitorConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let t = &config.thresholds;

    for cap in &t.fan.caps {
        if cap.max_rps < 10.0 || cap.max_rps > 1000.0 {
            warnings.push(range_warning(
                "thresholds.fan.caps",
                format!(
                    "fan cap for '{}' = {:.0} rps is outside typical range (10-1000 rps)",
                    cap.pattern, cap.max_rps
                ),
            ));
        }
    }

    let swing = t.flapping.swing_db;
    if swing < 0.5 || swing > 10.0 {
        warnings.push(range_warning(
            "thresholds.flapping.swing_db",
            format!("swing_db = {swing:.1} is outside typical range (0.5-10 dB)"),
        ));
    }

    let margin = t.attenuation.eol_margin_db;
    if margin < 0.0 || margin > 5.0 {
        warnings.push(range_warning(
            "thresholds.attenuation.eol_margin_db",
            format!("eol_margin_db = {margin:.1} is outside typical range (0-5 dB)"),
        ));
    }

    if !config.reference.dir.is_dir() {
        warnings.push(range_warning(
            "reference.dir",
            format!(
                "reference.dir = {} does not exist; reference tables must be uploaded",
                config.reference.dir.display()
            ),
        ));
    }

    warnings
}

// ============================================================================
// Whole-document validation (API / CLI)
// ============================================================================

/// Outcome of validating a candidate TOML document without loading it.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Run every check: unknown keys, parse, consistency and ranges.
pub fn validate_document(raw_toml: &str) -> ValidationReport {
    let mut warnings: Vec<String> = validate_unknown_keys(raw_toml).iter().map(ToString::to_string).collect();
    let errors = match toml::from_str::<super::MonitorConfig>(raw_toml) {
        Ok(config) => {
            warnings.extend(validate_operational_ranges(&config).iter().map(ToString::to_string));
            match config.validate() {
                Ok(()) => Vec::new(),
                Err(super::ConfigError::Validation(errors)) => errors,
                Err(e) => vec![e.to_string()],
            }
        }
        Err(e) => vec![format!("Config parse error: {e}")],
    };
    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("swing_bd", "swing_db"), 2);
        assert_eq!(levenshtein("pairng", "pairing"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [thresholds]
            [thresholds.flapping]
            swing_db = 2.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"thresholds".to_string()));
        assert!(keys.contains(&"thresholds.flapping".to_string()));
        assert!(keys.contains(&"thresholds.flapping.swing_db".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[thresholds.attenuation]
eol_margn_db = 1.5
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("eol_margn_db"));
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("thresholds.attenuation.eol_margin_db")
        );
    }

    #[test]
    fn test_fan_cap_array_produces_zero_warnings() {
        let toml_str = r#"
[site]
name = "Metro Ring 3"

[[thresholds.fan.caps]]
pattern = "FCC"
max_rps = 120.0

[filter]
columns = ["Site Name", "ME"]
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let warnings = validate_unknown_keys("[thresholds.cpu]\nmax = 90\n");
        assert!(warnings.iter().any(|w| w.field == "thresholds.cpu"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_swing_outside_range_warns() {
        let mut config = MonitorConfig::default();
        config.thresholds.flapping.swing_db = 25.0;
        let warnings = validate_operational_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "thresholds.flapping.swing_db"));
    }

    #[test]
    fn test_validate_document_collects_everything() {
        let report = validate_document("[server]\nadr = \"x\"\n[thresholds.attenuation]\neol_error_db = -1.0\n");
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("eol_error_db")));
        assert!(report.warnings.iter().any(|w| w.contains("server.adr")));
    }

    #[test]
    fn test_validate_document_parse_failure() {
        let report = validate_document("thresholds = [");
        assert!(!report.valid);
        assert!(report.errors[0].starts_with("Config parse error"));
    }
}
