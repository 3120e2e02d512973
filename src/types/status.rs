//! Row status and report summary enums.
//!
//! The analysis engine never emits colors. Rendering layers map [`Status`]
//! to a highlight and [`Summary`] to the banner under each table.

use serde::{Deserialize, Serialize};

/// Per-row outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Ok,
    /// Out of range / error
    Fail,
    /// Fiber break or unstable reading
    Flapping,
    /// Nothing to compare against
    NoData,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Fail => "fail",
            Self::Flapping => "flapping",
            Self::NoData => "no_data",
        }
    }

    pub fn is_problem(self) -> bool {
        matches!(self, Self::Fail | Self::Flapping)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report-level tri-state banner: "OK", "NOT OK" or "no data".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Summary {
    Ok,
    NotOk,
    NoData,
}

impl Summary {
    /// Fold row statuses: no rows → `NoData`, any problem → `NotOk`.
    pub fn from_statuses<I: IntoIterator<Item = Status>>(statuses: I) -> Self {
        let mut seen = false;
        for s in statuses {
            seen = true;
            if s.is_problem() {
                return Self::NotOk;
            }
        }
        if seen {
            Self::Ok
        } else {
            Self::NoData
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NotOk => "NOT OK",
            Self::NoData => "no data",
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_fold() {
        assert_eq!(Summary::from_statuses(std::iter::empty()), Summary::NoData);
        assert_eq!(Summary::from_statuses([Status::Ok, Status::NoData]), Summary::Ok);
        assert_eq!(Summary::from_statuses([Status::Ok, Status::Flapping]), Summary::NotOk);
        assert_eq!(Summary::NotOk.to_string(), "NOT OK");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Status::NoData).unwrap(), "\"no_data\"");
    }
}
