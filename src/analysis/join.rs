//! Reference joiner: measurement rows ⋈ reference entries on the composite key.

use super::keys::{measurement_key, reference_key};
use crate::types::{RowView, Table};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One matched pair.
#[derive(Debug, Clone, Copy)]
pub struct JoinedRow<'a> {
    /// Position of the reference entry in its source table (display order).
    pub reference_order: usize,
    pub measurement: RowView<'a>,
    pub reference: RowView<'a>,
}

impl<'a> JoinedRow<'a> {
    /// Look a column up in the measurement row first, then the reference row.
    pub fn lookup(&self, column: &str) -> Option<&'a crate::types::Cell> {
        if self.measurement.has(column) {
            Some(self.measurement.get(column))
        } else if self.reference.has(column) {
            Some(self.reference.get(column))
        } else {
            None
        }
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.lookup(column).and_then(crate::types::Cell::as_f64)
    }

    pub fn key(&self) -> String {
        measurement_key(&self.measurement)
    }
}

/// Result of a join. An empty join is an outcome, not an error.
#[derive(Debug)]
pub enum JoinOutcome<'a> {
    Matched(Vec<JoinedRow<'a>>),
    NoMatch,
}

impl<'a> JoinOutcome<'a> {
    pub fn rows(&self) -> &[JoinedRow<'a>] {
        match self {
            Self::Matched(rows) => rows,
            Self::NoMatch => &[],
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch)
    }
}

/// Inner-join `measurements` (keyed by `ME` + `Measure Object`) against
/// `reference` (keyed by `Mapping`).
///
/// Output follows reference row order; rows sharing a reference entry keep
/// their measurement order. Both tables must already carry normalized
/// headers and the key columns.
pub fn join<'a>(measurements: &'a Table, reference: &'a Table) -> JoinOutcome<'a> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(reference.len());
    let mut duplicates = 0usize;
    for row in reference.iter_rows() {
        let key = reference_key(&row);
        if key.is_empty() {
            continue;
        }
        if index.contains_key(&key) {
            duplicates += 1;
        } else {
            index.insert(key, row.index());
        }
    }
    if duplicates > 0 {
        warn!(duplicates, "Reference table repeats Mapping keys; first occurrence wins");
    }

    let mut joined: Vec<JoinedRow<'a>> = measurements
        .iter_rows()
        .filter_map(|m| {
            index.get(&measurement_key(&m)).map(|&ri| JoinedRow {
                reference_order: ri,
                measurement: m,
                reference: reference.row(ri),
            })
        })
        .collect();

    // Stable: equal reference_order keeps measurement order
    joined.sort_by_key(|j| j.reference_order);

    debug!(
        measurements = measurements.len(),
        reference = reference.len(),
        matched = joined.len(),
        "Reference join complete"
    );

    if joined.is_empty() {
        JoinOutcome::NoMatch
    } else {
        JoinOutcome::Matched(joined)
    }
}
