//! Analysis error types.
//!
//! Only schema problems are errors. Empty joins are reported through
//! [`crate::types::Summary::NoData`] and unparsable cells are substituted
//! locally, so neither appears here.

use serde::Serialize;
use thiserror::Error;

/// Which input a schema error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRole {
    Measurement,
    Reference,
    Alarm,
    Optical,
    AttenuationRaw,
    AttenuationReference,
    Result,
}

impl std::fmt::Display for TableRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Measurement => "measurement",
            Self::Reference => "reference",
            Self::Alarm => "alarm",
            Self::Optical => "optical",
            Self::AttenuationRaw => "attenuation",
            Self::AttenuationReference => "EOL reference",
            Self::Result => "result",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum AnalysisError {
    #[error(
        "{role} table must contain columns: {}; missing: {}; detected: {}",
        .required.join(", "),
        .missing.join(", "),
        .detected.join(", ")
    )]
    MissingColumns {
        role: TableRole,
        required: Vec<String>,
        detected: Vec<String>,
        missing: Vec<String>,
    },
}

impl AnalysisError {
    pub fn missing_columns(role: TableRole, required: &[&str], detected: &[String], missing: &[&str]) -> Self {
        Self::MissingColumns {
            role,
            required: required.iter().map(|s| (*s).to_string()).collect(),
            detected: detected.to_vec(),
            missing: missing.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Fail with [`AnalysisError::MissingColumns`] unless every `required`
/// column is present.
pub fn require_columns(
    table: &crate::types::Table,
    role: TableRole,
    required: &[&str],
) -> Result<(), AnalysisError> {
    let missing = table.missing_columns(required);
    if missing.is_empty() {
        return Ok(());
    }
    tracing::warn!(
        role = %role,
        missing = ?missing,
        detected = ?table.columns,
        "Required columns absent"
    );
    Err(AnalysisError::missing_columns(role, required, &table.columns, &missing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, Table};

    #[test]
    fn test_require_columns_reports_all_sets() {
        let t = Table::from_rows(&["ME", "Value"], Vec::<Vec<Cell>>::new());
        let err = require_columns(&t, TableRole::Measurement, &["ME", "Measure Object"]).unwrap_err();
        let AnalysisError::MissingColumns { required, detected, missing, role } = &err;
        assert_eq!(*role, TableRole::Measurement);
        assert_eq!(required, &vec!["ME".to_string(), "Measure Object".to_string()]);
        assert_eq!(detected, &vec!["ME".to_string(), "Value".to_string()]);
        assert_eq!(missing, &vec!["Measure Object".to_string()]);
        assert!(err.to_string().contains("missing: Measure Object"));
    }
}
