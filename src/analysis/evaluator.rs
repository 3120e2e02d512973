//! Generic threshold evaluator driven by [`FamilySpec`] records.
//!
//! Every comparison treats a non-numeric value or bound as a pass: an
//! unparsable cell is a local parse warning, never a failure.

use super::error::{require_columns, AnalysisError, TableRole};
use super::families::{FamilySpec, FanCap, MetricFamily, PowerBand, Rule};
use super::join::{join, JoinOutcome, JoinedRow};
use super::keys::{normalized, normalized_reference, MEASURE_OBJECT};
use crate::types::{Cell, Status, Summary, Table};
use serde::Serialize;
use tracing::{debug, info};

// ============================================================================
// Verdicts
// ============================================================================

/// One violated condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Breach {
    AboveMaximum { column: String, value: f64, limit: f64 },
    BelowMinimum { column: String, value: f64, limit: f64 },
    FanCapExceeded { pattern: String, value: f64, cap: f64 },
    BitErrors { value: f64 },
}

impl std::fmt::Display for Breach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AboveMaximum { column, value, limit } => {
                write!(f, "{column} {value:.2} above maximum {limit:.2}")
            }
            Self::BelowMinimum { column, value, limit } => {
                write!(f, "{column} {value:.2} below minimum {limit:.2}")
            }
            Self::FanCapExceeded { pattern, value, cap } => {
                write!(f, "{pattern} fan speed {value:.2} above cap {cap:.0}")
            }
            Self::BitErrors { value } => write!(f, "BER after FEC {value:e} > 0"),
        }
    }
}

/// Pass/fail outcome for one joined row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Verdict {
    pub breaches: Vec<Breach>,
}

impl Verdict {
    pub fn is_out_of_range(&self) -> bool {
        !self.breaches.is_empty()
    }

    pub fn status(&self) -> Status {
        if self.is_out_of_range() {
            Status::Fail
        } else {
            Status::Ok
        }
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Applies a family's rule to joined rows.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    spec: &'static FamilySpec,
    fan_caps: Vec<FanCap>,
}

impl ThresholdEvaluator {
    pub fn new(family: MetricFamily, fan_caps: Vec<FanCap>) -> Self {
        Self {
            spec: family.spec(),
            fan_caps,
        }
    }

    pub fn family(&self) -> MetricFamily {
        self.spec.family
    }

    pub fn spec(&self) -> &'static FamilySpec {
        self.spec
    }

    pub fn evaluate(&self, row: &JoinedRow<'_>) -> Verdict {
        let mut breaches = Vec::new();
        match self.spec.rule {
            Rule::Band { value, max, min } => {
                check_band(row, value, max, min, &mut breaches);
            }
            Rule::Ceiling { value, max } => {
                check_max(row, value, max, &mut breaches);
            }
            Rule::FanCaps { value } => {
                if let Some(speed) = row.number(value) {
                    let name = row.measurement.text(MEASURE_OBJECT);
                    breaches.extend(fan_breaches(&name, speed, &self.fan_caps));
                }
            }
            Rule::OpticalPower { output, input, ber } => {
                check_power(row, output, &mut breaches);
                check_power(row, input, &mut breaches);
                if let Some(ber_col) = ber {
                    if let Some(v) = row.number(ber_col) {
                        if v > 0.0 {
                            breaches.push(Breach::BitErrors { value: v });
                        }
                    }
                }
            }
        }
        Verdict { breaches }
    }
}

/// Fan rule on its own: every configured pattern contained in `object_name`
/// whose cap `speed` exceeds.
pub fn fan_breaches(object_name: &str, speed: f64, caps: &[FanCap]) -> Vec<Breach> {
    caps.iter()
        .filter(|c| object_name.contains(c.pattern.as_str()) && speed > c.max_rps)
        .map(|c| Breach::FanCapExceeded {
            pattern: c.pattern.clone(),
            value: speed,
            cap: c.max_rps,
        })
        .collect()
}

fn check_max(row: &JoinedRow<'_>, value: &str, max: &str, out: &mut Vec<Breach>) {
    if let (Some(v), Some(limit)) = (row.number(value), row.number(max)) {
        if v > limit {
            out.push(Breach::AboveMaximum {
                column: value.to_string(),
                value: v,
                limit,
            });
        }
    }
}

fn check_min(row: &JoinedRow<'_>, value: &str, min: &str, out: &mut Vec<Breach>) {
    if let (Some(v), Some(limit)) = (row.number(value), row.number(min)) {
        if v < limit {
            out.push(Breach::BelowMinimum {
                column: value.to_string(),
                value: v,
                limit,
            });
        }
    }
}

fn check_band(row: &JoinedRow<'_>, value: &str, max: &str, min: &str, out: &mut Vec<Breach>) {
    check_max(row, value, max, out);
    check_min(row, value, min, out);
}

fn check_power(row: &JoinedRow<'_>, band: PowerBand, out: &mut Vec<Breach>) {
    check_band(row, band.value, band.max, band.min, out);
}

// ============================================================================
// Family run
// ============================================================================

/// One evaluated row, ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct VerdictRow {
    pub reference_order: usize,
    pub key: String,
    pub cells: Vec<Cell>,
    pub breaches: Vec<Breach>,
    pub status: Status,
}

/// Verdict table for one family.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyReport {
    pub family: MetricFamily,
    pub columns: Vec<String>,
    pub rows: Vec<VerdictRow>,
    pub summary: Summary,
    pub message: Option<String>,
}

impl FamilyReport {
    pub fn failed_rows(&self) -> impl Iterator<Item = &VerdictRow> {
        self.rows.iter().filter(|r| r.status == Status::Fail)
    }

    /// Flatten into a table with a trailing `Status` column.
    pub fn to_table(&self) -> Table {
        let mut columns = self.columns.clone();
        columns.push("Status".to_string());
        let rows = self
            .rows
            .iter()
            .map(|r| {
                let mut cells = r.cells.clone();
                cells.push(Cell::text(r.status.as_str()));
                cells
            })
            .collect();
        Table::new(columns, rows)
    }
}

/// Normalize, validate, join and evaluate one family.
///
/// Schema problems on either table halt with [`AnalysisError::MissingColumns`].
/// An empty join yields a report with [`Summary::NoData`].
pub fn evaluate_family(
    measurements: &Table,
    reference: &Table,
    evaluator: &ThresholdEvaluator,
) -> Result<FamilyReport, AnalysisError> {
    let spec = evaluator.spec();
    let measurements = normalized(measurements);
    let reference = normalized_reference(reference);

    require_columns(&measurements, TableRole::Measurement, spec.measurement_columns)?;
    require_columns(&reference, TableRole::Reference, spec.reference_columns)?;

    let columns: Vec<String> = spec
        .display_columns
        .iter()
        .filter(|c| measurements.has_column(c) || reference.has_column(c))
        .map(|c| (*c).to_string())
        .collect();

    let joined = join(&measurements, &reference);
    if let JoinOutcome::NoMatch = joined {
        info!(family = %spec.family, rows = measurements.len(), "No measurement rows match the reference");
        return Ok(FamilyReport {
            family: spec.family,
            columns,
            rows: Vec::new(),
            summary: Summary::NoData,
            message: Some(format!(
                "No {} rows match the {} reference mapping",
                spec.family, spec.family
            )),
        });
    }

    let mut unparsable = 0usize;
    let rows: Vec<VerdictRow> = joined
        .rows()
        .iter()
        .map(|j| {
            if primary_value(spec.rule).and_then(|c| j.number(c)).is_none() {
                unparsable += 1;
            }
            let verdict = evaluator.evaluate(j);
            VerdictRow {
                reference_order: j.reference_order,
                key: j.key(),
                cells: columns
                    .iter()
                    .map(|c| j.lookup(c).cloned().unwrap_or_default())
                    .collect(),
                status: verdict.status(),
                breaches: verdict.breaches,
            }
        })
        .collect();

    if unparsable > 0 {
        debug!(family = %spec.family, rows = unparsable, "Non-numeric values treated as pass");
    }

    let summary = Summary::from_statuses(rows.iter().map(|r| r.status));
    info!(
        family = %spec.family,
        matched = rows.len(),
        failed = rows.iter().filter(|r| r.status == Status::Fail).count(),
        summary = %summary,
        "Family evaluated"
    );

    Ok(FamilyReport {
        family: spec.family,
        columns,
        rows,
        summary,
        message: None,
    })
}

fn primary_value(rule: Rule) -> Option<&'static str> {
    match rule {
        Rule::Band { value, .. } | Rule::Ceiling { value, .. } | Rule::FanCaps { value } => Some(value),
        Rule::OpticalPower { output, .. } => Some(output.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::families::*;
    use crate::analysis::keys::{MAPPING, ME};

    fn fan_evaluator() -> ThresholdEvaluator {
        ThresholdEvaluator::new(MetricFamily::Fan, default_fan_caps())
    }

    fn fan_tables(object: &str, speed: Cell) -> (Table, Table) {
        let m = Table::from_rows(
            &[ME, MEASURE_OBJECT, BEGIN_TIME, END_TIME, FAN_SPEED],
            [vec![
                Cell::text("NE1"),
                Cell::text(object),
                Cell::text("2024-05-01 10:00:00"),
                Cell::text("2024-05-01 10:15:00"),
                speed,
            ]],
        );
        let r = Table::from_rows(
            &[MAPPING, SITE_NAME],
            [vec![Cell::text(format!("NE1{object}")), Cell::text("Bangkok")]],
        );
        (m, r)
    }

    fn fan_fails(object: &str, speed: Cell) -> bool {
        let (m, r) = fan_tables(object, speed);
        let report = evaluate_family(&m, &r, &fan_evaluator()).unwrap();
        assert_eq!(report.rows.len(), 1);
        report.rows[0].status == Status::Fail
    }

    #[test]
    fn test_fan_caps_by_unit_type() {
        assert!(fan_fails("FCC-1", Cell::Number(130.0)));
        assert!(!fan_fails("FCC-1", Cell::Number(110.0)));
        assert!(fan_fails("FCPP-2", Cell::Number(260.0)));
        assert!(!fan_fails("FCPP-2", Cell::Number(200.0)));
        assert!(!fan_fails("FAN-9", Cell::Number(99999.0)));
    }

    #[test]
    fn test_fan_non_numeric_is_pass() {
        assert!(!fan_fails("FCC-1", Cell::text("--")));
    }

    #[test]
    fn test_fan_multiple_patterns_any_exceeded() {
        // Contains FCPL (cap 120) and FCPS (cap 230)
        let breaches = fan_breaches("FCPL/FCPS", 200.0, &default_fan_caps());
        assert_eq!(breaches.len(), 1);
        assert!(matches!(&breaches[0], Breach::FanCapExceeded { pattern, .. } if pattern == "FCPL"));
    }

    fn cpu_report(value: f64, max: f64, min: f64) -> FamilyReport {
        let m = Table::from_rows(
            &[ME, MEASURE_OBJECT, CPU_UTILIZATION],
            [vec![Cell::text("NE1"), Cell::text("CPU-1"), Cell::Number(value)]],
        );
        let r = Table::from_rows(
            &[MAPPING, SITE_NAME, MAXIMUM_THRESHOLD, MINIMUM_THRESHOLD],
            [vec![
                Cell::text("NE1CPU-1"),
                Cell::text("Site A"),
                Cell::Number(max),
                Cell::Number(min),
            ]],
        );
        evaluate_family(&m, &r, &ThresholdEvaluator::new(MetricFamily::Cpu, Vec::new())).unwrap()
    }

    #[test]
    fn test_cpu_band() {
        assert_eq!(cpu_report(95.0, 90.0, 5.0).summary, Summary::NotOk);
        assert_eq!(cpu_report(2.0, 90.0, 5.0).summary, Summary::NotOk);
        assert_eq!(cpu_report(50.0, 90.0, 5.0).summary, Summary::Ok);
        // Boundaries are inside the band
        assert_eq!(cpu_report(90.0, 90.0, 5.0).summary, Summary::Ok);
    }

    #[test]
    fn test_cpu_display_columns_and_table() {
        let report = cpu_report(95.0, 90.0, 5.0);
        assert_eq!(report.columns[0], SITE_NAME);
        assert_eq!(report.rows[0].cells[0], Cell::text("Site A"));
        let table = report.to_table();
        assert_eq!(table.columns.last().map(String::as_str), Some("Status"));
        assert_eq!(table.cell(0, "Status"), &Cell::text("fail"));
    }

    #[test]
    fn test_msu_ceiling_only() {
        let m = Table::from_rows(
            &[ME, MEASURE_OBJECT, LASER_BIAS_CURRENT],
            [
                vec![Cell::text("NE1"), Cell::text("1-MSU"), Cell::Number(80.0)],
                vec![Cell::text("NE1"), Cell::text("2-MSU"), Cell::Number(-10.0)],
            ],
        );
        let r = Table::from_rows(
            &[MAPPING, MAXIMUM_THRESHOLD],
            [
                vec![Cell::text("NE11-MSU"), Cell::Number(70.0)],
                vec![Cell::text("NE12-MSU"), Cell::Number(70.0)],
            ],
        );
        let report = evaluate_family(&m, &r, &ThresholdEvaluator::new(MetricFamily::Msu, Vec::new())).unwrap();
        let statuses: Vec<Status> = report.rows.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![Status::Fail, Status::Ok]);
    }

    fn line_row(out_power: f64, in_power: f64, ber: f64) -> Vec<Breach> {
        let m = Table::from_rows(
            &[ME, MEASURE_OBJECT, OUTPUT_POWER, INPUT_POWER, BER_AFTER_FEC],
            [vec![
                Cell::text("NE1"),
                Cell::text("L1"),
                Cell::Number(out_power),
                Cell::Number(in_power),
                Cell::Number(ber),
            ]],
        );
        let r = Table::from_rows(
            &[MAPPING, MAX_OUTPUT_POWER, MIN_OUTPUT_POWER, MAX_INPUT_POWER, MIN_INPUT_POWER],
            [vec![
                Cell::text("NE1L1"),
                Cell::Number(3.0),
                Cell::Number(-3.0),
                Cell::Number(-5.0),
                Cell::Number(-20.0),
            ]],
        );
        let report =
            evaluate_family(&m, &r, &ThresholdEvaluator::new(MetricFamily::Line, Vec::new())).unwrap();
        report.rows[0].breaches.clone()
    }

    #[test]
    fn test_line_power_and_ber_are_independent() {
        assert!(line_row(0.0, -10.0, 0.0).is_empty());
        assert_eq!(line_row(4.0, -10.0, 0.0).len(), 1);
        assert_eq!(line_row(0.0, -25.0, 0.0).len(), 1);
        assert!(matches!(line_row(0.0, -10.0, 1e-9)[..], [Breach::BitErrors { .. }]));
        assert_eq!(line_row(4.0, -25.0, 1e-6).len(), 3);
    }

    #[test]
    fn test_missing_measurement_columns_is_schema_error() {
        let m = Table::from_rows(&[ME, "Value"], Vec::<Vec<Cell>>::new());
        let r = Table::from_rows(&[MAPPING, SITE_NAME], Vec::<Vec<Cell>>::new());
        let err = evaluate_family(&m, &r, &fan_evaluator()).unwrap_err();
        let AnalysisError::MissingColumns { role, missing, .. } = err;
        assert_eq!(role, TableRole::Measurement);
        assert!(missing.contains(&FAN_SPEED.to_string()));
    }

    #[test]
    fn test_missing_reference_columns_is_schema_error() {
        let (m, _) = fan_tables("FCC-1", Cell::Number(1.0));
        let r = Table::from_rows(&["Key"], Vec::<Vec<Cell>>::new());
        let err = evaluate_family(&m, &r, &fan_evaluator()).unwrap_err();
        let AnalysisError::MissingColumns { role, .. } = err;
        assert_eq!(role, TableRole::Reference);
    }

    #[test]
    fn test_no_match_is_no_data_not_error() {
        let (m, _) = fan_tables("FCC-1", Cell::Number(1.0));
        let r = Table::from_rows(&[MAPPING, SITE_NAME], [vec![Cell::text("ME1OBJ1"), Cell::text("x")]]);
        let report = evaluate_family(&m, &r, &fan_evaluator()).unwrap();
        assert_eq!(report.summary, Summary::NoData);
        assert!(report.rows.is_empty());
        assert!(report.message.is_some());
    }

    #[test]
    fn test_headers_with_nbsp_are_normalized() {
        let m = Table::from_rows(
            &["ME ", "Measure\u{00a0}Object", "CPU  utilization ratio"],
            [vec![Cell::text("NE1"), Cell::text("CPU-1"), Cell::Number(99.0)]],
        );
        let r = Table::from_rows(
            &["Mapping", "Site Name", "Maximum threshold", "Minimum threshold"],
            [vec![Cell::text("NE1CPU-1"), Cell::text("S"), Cell::Number(90.0), Cell::Number(0.0)]],
        );
        let report = evaluate_family(&m, &r, &ThresholdEvaluator::new(MetricFamily::Cpu, Vec::new())).unwrap();
        assert_eq!(report.summary, Summary::NotOk);
    }

    #[test]
    fn test_reference_headers_with_symbols_are_normalized() {
        let m = Table::from_rows(
            &[ME, MEASURE_OBJECT, CPU_UTILIZATION],
            [vec![Cell::text("NE1"), Cell::text("CPU-1"), Cell::Number(99.0)]],
        );
        let r = Table::from_rows(
            &["Mapping", "Site Name\u{2122}", "Maximum threshold\u{ff08}\u{ff09}", "Minimum\u{3000}threshold"],
            [vec![Cell::text("NE1CPU-1"), Cell::text("S"), Cell::Number(90.0), Cell::Number(0.0)]],
        );
        let report = evaluate_family(&m, &r, &ThresholdEvaluator::new(MetricFamily::Cpu, Vec::new())).unwrap();
        assert_eq!(report.summary, Summary::NotOk);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let (m, r) = fan_tables("FCPS-1", Cell::Number(240.0));
        let evaluator = fan_evaluator();
        let a = evaluate_family(&m, &r, &evaluator).unwrap();
        let b = evaluate_family(&m, &r, &evaluator).unwrap();
        assert_eq!(a.rows[0].breaches, b.rows[0].breaches);
        assert_eq!(a.rows[0].status, Status::Fail);
    }
}
