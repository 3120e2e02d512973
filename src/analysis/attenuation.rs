//! Span attenuation against end-of-life baselines.
//!
//! The EOL variant left-joins the current attenuation export onto the EOL
//! reference by link name. The core variant pairs each forward link with its
//! reverse direction and reports the absolute difference of their margins.

use super::error::{require_columns, AnalysisError, TableRole};
use super::keys::normalized;
use crate::types::{Cell, Status, Summary, Table};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const LINK_NAME: &str = "Link Name";
pub const EOL_DB: &str = "EOL(dB)";
pub const SOURCE_PORT: &str = "Source Port";
pub const SINK_PORT: &str = "Sink Port";
pub const OPTICAL_ATTENUATION: &str = "Optical Attenuation (dB)";
pub const CURRENT_ATTENUATION: &str = "Current Attenuation(dB)";
pub const EOL_DIFF: &str = "Loss current - Loss EOL";
pub const REMARK: &str = "Remark";
pub const CORE_LOSS: &str = "Loss between core";

/// Link-name column of the multi-day EOL workbook (its second `140` group).
pub const WORKBOOK_LINK_COLUMN: &str = "140.1";

pub const FIBER_BREAK: &str = "Fiber Break";
pub const NO_DATA: &str = "No Data";
/// Rendering of a core loss that could not be computed.
pub const UNAVAILABLE: &str = "--";

/// How forward and reverse rows are paired for the core variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingMode {
    /// (A, B) pairs with the first later unpaired (B, A).
    #[default]
    Endpoints,
    /// Rows 0/1, 2/3, ... regardless of link names.
    Positional,
}

/// Attenuation thresholds, all in dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttenuationSettings {
    /// Subtracted from `current − eol`.
    pub eol_margin_db: f64,
    /// EOL rows fail at or above this diff.
    pub eol_error_db: f64,
    /// Core pairs fail above this loss.
    pub core_error_db: f64,
    pub pairing: PairingMode,
}

impl Default for AttenuationSettings {
    fn default() -> Self {
        Self {
            eol_margin_db: 1.0,
            eol_error_db: 2.0,
            core_error_db: 2.0,
            pairing: PairingMode::Endpoints,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ============================================================================
// EOL variant
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EolRow {
    pub link: String,
    /// (source, sink) from the raw export, or from splitting the link name.
    pub endpoints: Option<(String, String)>,
    pub eol: Option<f64>,
    /// Raw current attenuation cell; text here means a fiber break.
    pub current: Cell,
    pub diff: Option<f64>,
    pub remark: String,
    pub status: Status,
}

/// Row status with fixed precedence: fail, then fiber break, then no data.
pub fn eol_status(diff: Option<f64>, remark: &str, error_db: f64) -> Status {
    match diff {
        Some(d) if d >= error_db => Status::Fail,
        _ if remark == FIBER_BREAK => Status::Flapping,
        None => Status::NoData,
        Some(_) => Status::Ok,
    }
}

/// Split `A_B` into endpoints when the name has exactly one `_`.
pub fn split_link_name(link: &str) -> Option<(String, String)> {
    let (a, b) = link.split_once('_')?;
    if b.contains('_') || a.trim().is_empty() || b.trim().is_empty() {
        return None;
    }
    Some((a.trim().to_string(), b.trim().to_string()))
}

struct RawReading {
    endpoints: (String, String),
    current: Cell,
}

fn raw_readings(raw: &Table) -> HashMap<String, RawReading> {
    let mut by_link = HashMap::with_capacity(raw.len());
    let mut duplicates = 0usize;
    for row in raw.iter_rows() {
        let source = row.text(SOURCE_PORT).trim().to_string();
        let sink = row.text(SINK_PORT).trim().to_string();
        let link = format!("{source}_{sink}");
        if by_link.contains_key(&link) {
            duplicates += 1;
            continue;
        }
        by_link.insert(
            link,
            RawReading {
                endpoints: (source, sink),
                current: row.get(OPTICAL_ATTENUATION).clone(),
            },
        );
    }
    if duplicates > 0 {
        warn!(duplicates, "Attenuation export repeats links; first reading wins");
    }
    by_link
}

#[derive(Debug, Clone, Serialize)]
pub struct EolReport {
    pub rows: Vec<EolRow>,
    pub summary: Summary,
    pub managed_elements: Vec<String>,
    pub settings: AttenuationSettings,
}

impl EolReport {
    pub const COLUMNS: [&'static str; 5] = [LINK_NAME, EOL_DB, CURRENT_ATTENUATION, EOL_DIFF, REMARK];

    /// Rows whose link name contains `me`; everything when `me` is empty.
    pub fn filtered(&self, me: &str) -> Self {
        let rows = filter_by_me(&self.rows, me);
        Self {
            summary: Summary::from_statuses(rows.iter().map(|r| r.status)),
            rows,
            managed_elements: self.managed_elements.clone(),
            settings: self.settings,
        }
    }

    pub fn to_table(&self) -> Table {
        let mut columns: Vec<String> = Self::COLUMNS.iter().map(|c| (*c).to_string()).collect();
        columns.push("Status".to_string());
        let rows = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    Cell::text(r.link.clone()),
                    r.eol.map_or(Cell::Empty, Cell::Number),
                    r.current.clone(),
                    r.diff.map_or(Cell::Empty, |d| Cell::Number(round2(d))),
                    Cell::text(r.remark.clone()),
                    Cell::text(r.status.as_str()),
                ]
            })
            .collect();
        Table::new(columns, rows)
    }
}

/// Bring a normalized EOL reference into the flat `Link Name, EOL(dB)` shape.
///
/// A table that already has both columns is returned as is. Otherwise it is
/// read as the multi-day workbook: row 0 labels the sub-columns, the first
/// column labelled `EOL(dB)` holds the baselines and [`WORKBOOK_LINK_COLUMN`]
/// holds the link names. The label row is skipped, as are rows without a
/// link name.
pub fn eol_reference(reference: Table) -> Result<Table, AnalysisError> {
    const REQUIRED: &[&str] = &[LINK_NAME, EOL_DB];
    if reference.missing_columns(REQUIRED).is_empty() {
        return Ok(reference);
    }

    let link_col = reference.column_index(WORKBOOK_LINK_COLUMN);
    let eol_col = reference
        .rows
        .first()
        .and_then(|labels| labels.iter().position(|c| c.to_text().trim() == EOL_DB));
    let (Some(link_col), Some(eol_col)) = (link_col, eol_col) else {
        require_columns(&reference, TableRole::AttenuationReference, REQUIRED)?;
        return Ok(reference);
    };

    let rows: Vec<Vec<Cell>> = reference
        .rows
        .iter()
        .skip(1)
        .filter_map(|row| {
            let link = row.get(link_col).filter(|c| !c.is_empty())?;
            let eol = row.get(eol_col).and_then(Cell::as_f64);
            Some(vec![Cell::text(link.to_text().trim()), eol.map_or(Cell::Empty, Cell::Number)])
        })
        .collect();
    info!(
        links = rows.len(),
        eol_column = %reference.columns[eol_col],
        "EOL baselines extracted from workbook layout"
    );
    Ok(Table::from_rows(REQUIRED, rows))
}

/// Left-join the raw export onto the EOL reference and compute margins.
///
/// `diff = current − eol − margin`. Reference order is preserved.
pub fn compute_eol(reference: &Table, raw: &Table, settings: &AttenuationSettings) -> Result<EolReport, AnalysisError> {
    let reference = eol_reference(normalized(reference))?;
    let raw = normalized(raw);
    require_columns(&raw, TableRole::AttenuationRaw, &[SOURCE_PORT, SINK_PORT, OPTICAL_ATTENUATION])?;

    let readings = raw_readings(&raw);
    let mut breaks = 0usize;
    let rows: Vec<EolRow> = reference
        .iter_rows()
        .filter(|r| !r.get(LINK_NAME).is_empty())
        .map(|r| {
            let link = r.text(LINK_NAME).trim().to_string();
            let eol = r.number(EOL_DB);
            let (endpoints, current, remark) = match readings.get(&link) {
                Some(reading) => {
                    let remark = if reading.current.as_f64().is_some() {
                        String::new()
                    } else {
                        breaks += 1;
                        FIBER_BREAK.to_string()
                    };
                    (Some(reading.endpoints.clone()), reading.current.clone(), remark)
                }
                None => (split_link_name(&link), Cell::Empty, NO_DATA.to_string()),
            };
            let diff = match (current.as_f64(), eol) {
                (Some(c), Some(e)) => Some(c - e - settings.eol_margin_db),
                _ => None,
            };
            EolRow {
                status: eol_status(diff, &remark, settings.eol_error_db),
                link,
                endpoints,
                eol,
                current,
                diff,
                remark,
            }
        })
        .collect();

    if breaks > 0 {
        debug!(links = breaks, "Non-numeric attenuation readings marked as fiber break");
    }

    let summary = Summary::from_statuses(rows.iter().map(|r| r.status));
    info!(
        links = rows.len(),
        failed = rows.iter().filter(|r| r.status == Status::Fail).count(),
        fiber_breaks = breaks,
        summary = %summary,
        "EOL attenuation computed"
    );

    Ok(EolReport {
        managed_elements: managed_element_names(&rows),
        rows,
        summary,
        settings: *settings,
    })
}

// ============================================================================
// Core variant
// ============================================================================

/// Loss between the two directions of a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoreLoss {
    Value(f64),
    /// One side has no numeric diff.
    Unavailable,
    /// No reverse row was found.
    Unpaired,
}

impl CoreLoss {
    pub fn to_cell(self) -> Cell {
        match self {
            Self::Value(v) => Cell::Number(v),
            Self::Unavailable => Cell::text(UNAVAILABLE),
            Self::Unpaired => Cell::Empty,
        }
    }
}

impl Serialize for CoreLoss {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE),
            Self::Unpaired => serializer.serialize_none(),
        }
    }
}

/// `|forward − reverse|` to two decimals, or unavailable if either is missing.
pub fn core_loss(forward: Option<f64>, reverse: Option<f64>) -> CoreLoss {
    match (forward, reverse) {
        (Some(f), Some(r)) => CoreLoss::Value(round2((f - r).abs())),
        _ => CoreLoss::Unavailable,
    }
}

pub fn core_status(loss: CoreLoss, error_db: f64) -> Status {
    match loss {
        CoreLoss::Value(v) if v > error_db => Status::Fail,
        CoreLoss::Value(_) => Status::Ok,
        CoreLoss::Unavailable => Status::Flapping,
        CoreLoss::Unpaired => Status::NoData,
    }
}

/// Pair rows by reversed endpoints. Returns (forward, reverse) index pairs in
/// forward order; rows left without a partner carry `None`.
pub fn pair_by_endpoints(rows: &[EolRow]) -> Vec<(usize, Option<usize>)> {
    let mut taken = vec![false; rows.len()];
    let mut pairs = Vec::new();
    for i in 0..rows.len() {
        if taken[i] {
            continue;
        }
        taken[i] = true;
        let partner = rows[i].endpoints.as_ref().and_then(|(a, b)| {
            (i + 1..rows.len()).find(|&j| {
                !taken[j]
                    && rows[j]
                        .endpoints
                        .as_ref()
                        .is_some_and(|(c, d)| c == b && d == a)
            })
        });
        if let Some(j) = partner {
            taken[j] = true;
        }
        pairs.push((i, partner));
    }
    pairs
}

/// Pair rows 0/1, 2/3, ...; an odd trailing row is unpaired.
pub fn pair_positional(len: usize) -> Vec<(usize, Option<usize>)> {
    (0..len)
        .step_by(2)
        .map(|i| (i, (i + 1 < len).then_some(i + 1)))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct CorePair {
    pub forward: String,
    pub reverse: Option<String>,
    pub forward_diff: Option<f64>,
    pub reverse_diff: Option<f64>,
    pub loss: CoreLoss,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoreReport {
    pub pairs: Vec<CorePair>,
    pub pairing: PairingMode,
    pub summary: Summary,
    pub managed_elements: Vec<String>,
}

impl CoreReport {
    pub fn filtered(&self, me: &str) -> Self {
        let pairs: Vec<CorePair> = self
            .pairs
            .iter()
            .filter(|p| me.is_empty() || p.forward.contains(me) || p.reverse.as_deref().is_some_and(|r| r.contains(me)))
            .cloned()
            .collect();
        Self {
            summary: Summary::from_statuses(pairs.iter().map(|p| p.status)),
            pairs,
            pairing: self.pairing,
            managed_elements: self.managed_elements.clone(),
        }
    }

    pub fn to_table(&self) -> Table {
        let columns = ["Forward Link", "Reverse Link", "Forward Diff", "Reverse Diff", CORE_LOSS, "Status"]
            .iter()
            .map(|c| (*c).to_string())
            .collect();
        let rows = self
            .pairs
            .iter()
            .map(|p| {
                vec![
                    Cell::text(p.forward.clone()),
                    p.reverse.clone().map_or(Cell::Empty, Cell::Text),
                    p.forward_diff.map_or(Cell::Empty, |d| Cell::Number(round2(d))),
                    p.reverse_diff.map_or(Cell::Empty, |d| Cell::Number(round2(d))),
                    p.loss.to_cell(),
                    Cell::text(p.status.as_str()),
                ]
            })
            .collect();
        Table::new(columns, rows)
    }
}

/// Forward/reverse loss over an EOL result.
pub fn compute_core(eol: &EolReport, settings: &AttenuationSettings) -> CoreReport {
    let rows = &eol.rows;
    let indices = match settings.pairing {
        PairingMode::Endpoints => pair_by_endpoints(rows),
        PairingMode::Positional => pair_positional(rows.len()),
    };

    let pairs: Vec<CorePair> = indices
        .into_iter()
        .map(|(f, r)| {
            let forward = &rows[f];
            let reverse = r.map(|j| &rows[j]);
            let loss = match reverse {
                Some(rev) => core_loss(forward.diff, rev.diff),
                None => CoreLoss::Unpaired,
            };
            CorePair {
                forward: forward.link.clone(),
                reverse: reverse.map(|r| r.link.clone()),
                forward_diff: forward.diff,
                reverse_diff: reverse.and_then(|r| r.diff),
                status: core_status(loss, settings.core_error_db),
                loss,
            }
        })
        .collect();

    let unpaired = pairs.iter().filter(|p| p.reverse.is_none()).count();
    if unpaired > 0 {
        warn!(unpaired, pairing = ?settings.pairing, "Links without a reverse direction");
    }
    let summary = Summary::from_statuses(pairs.iter().map(|p| p.status));
    info!(pairs = pairs.len(), unpaired, summary = %summary, "Core loss computed");

    CoreReport {
        pairs,
        pairing: settings.pairing,
        summary,
        managed_elements: eol.managed_elements.clone(),
    }
}

// ============================================================================
// Managed-element selection
// ============================================================================

/// Distinct link-name prefixes before the first `-`, in first-seen order.
pub fn managed_element_names(rows: &[EolRow]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for row in rows {
        let me = row.link.split('-').next().unwrap_or_default().trim();
        if !me.is_empty() && !names.iter().any(|n| n == me) {
            names.push(me.to_string());
        }
    }
    names
}

/// Rows whose link name contains `me`; all rows when `me` is empty.
pub fn filter_by_me(rows: &[EolRow], me: &str) -> Vec<EolRow> {
    rows.iter()
        .filter(|r| me.is_empty() || r.link.contains(me))
        .cloned()
        .collect()
}
