//! OSC power flapping: wide input-power swings reconciled against FM alarms.
//!
//! A swing event is explained when some alarm on a link naming both the
//! event's ME and its target overlaps the event window. Unexplained events
//! are the output.

use super::error::{require_columns, AnalysisError, TableRole};
use super::families::{BEGIN_TIME, END_TIME, INPUT_POWER};
use super::keys::{normalized, ME, MEASURE_OBJECT};
use crate::types::{Cell, Status, Summary, Table};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::{debug, info};

pub const MAX_INPUT_VALUE: &str = "Max Value of Input Optical Power(dBm)";
pub const MIN_INPUT_VALUE: &str = "Min Value of Input Optical Power(dBm)";
pub const OCCURRENCE_TIME: &str = "Occurrence Time";
pub const CLEAR_TIME: &str = "Clear Time";
/// Derived swing column appended to the output.
pub const SWING: &str = "Max - Min (dB)";
const LINK_PREFIX: &str = "Link";

const OPTICAL_COLUMNS: &[&str] = &[ME, MEASURE_OBJECT, BEGIN_TIME, END_TIME, MAX_INPUT_VALUE, MIN_INPUT_VALUE];

const DISPLAY_COLUMNS: &[&str] = &[
    BEGIN_TIME,
    END_TIME,
    "Granularity",
    ME,
    "ME IP",
    MEASURE_OBJECT,
    MAX_INPUT_VALUE,
    MIN_INPUT_VALUE,
    INPUT_POWER,
];

fn target_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]+)\)").expect("valid target regex"))
}

/// Content of the first `(...)` group of a measured-object name.
pub fn extract_target(measure_object: &str) -> Option<String> {
    target_pattern()
        .captures(measure_object)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

// ============================================================================
// Events and alarms
// ============================================================================

/// One optical row whose input-power swing exceeded the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwingEvent {
    /// Row index in the optical table.
    pub row: usize,
    pub me: String,
    pub target: Option<String>,
    pub begin: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub swing_db: f64,
}

/// Filter the optical table down to swing events (`max − min > threshold`).
///
/// Rows whose max or min is not numeric are skipped. Headers must already be
/// normalized.
pub fn swing_events(optical: &Table, threshold_db: f64) -> Vec<SwingEvent> {
    let mut skipped = 0usize;
    let events: Vec<SwingEvent> = optical
        .iter_rows()
        .filter_map(|row| {
            let (Some(max), Some(min)) = (row.number(MAX_INPUT_VALUE), row.number(MIN_INPUT_VALUE)) else {
                skipped += 1;
                return None;
            };
            let swing_db = max - min;
            (swing_db > threshold_db).then(|| SwingEvent {
                row: row.index(),
                me: row.text(ME),
                target: extract_target(&row.text(MEASURE_OBJECT)),
                begin: row.timestamp(BEGIN_TIME),
                end: row.timestamp(END_TIME),
                swing_db,
            })
        })
        .collect();
    if skipped > 0 {
        debug!(rows = skipped, "Optical rows without numeric max/min skipped");
    }
    events
}

/// One fault alarm. A missing clear time means the alarm is still active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmRecord {
    pub link: String,
    pub occurred: Option<NaiveDateTime>,
    pub cleared: Option<NaiveDateTime>,
}

impl AlarmRecord {
    fn overlaps(&self, begin: NaiveDateTime, end: NaiveDateTime) -> bool {
        match self.occurred {
            Some(occurred) => occurred <= end && self.cleared.map_or(true, |c| c >= begin),
            None => false,
        }
    }

    fn names(&self, me: &str, target: &str) -> bool {
        self.link.contains(me) && self.link.contains(target)
    }
}

/// First column whose name starts with `Link`.
pub fn link_column(alarms: &Table) -> Option<&str> {
    alarms
        .columns
        .iter()
        .find(|c| c.starts_with(LINK_PREFIX))
        .map(String::as_str)
}

/// Read alarm records from a normalized FM table.
pub fn alarm_records(alarms: &Table) -> Result<Vec<AlarmRecord>, AnalysisError> {
    require_columns(alarms, TableRole::Alarm, &[OCCURRENCE_TIME, CLEAR_TIME])?;
    let Some(link) = link_column(alarms) else {
        return Err(AnalysisError::missing_columns(
            TableRole::Alarm,
            &[OCCURRENCE_TIME, CLEAR_TIME, "Link*"],
            &alarms.columns,
            &["Link*"],
        ));
    };
    Ok(alarms
        .iter_rows()
        .map(|row| AlarmRecord {
            link: row.text(link),
            occurred: row.timestamp(OCCURRENCE_TIME),
            cleared: row.timestamp(CLEAR_TIME),
        })
        .collect())
}

/// Alarms sorted by occurrence time. Records without an occurrence time are
/// dropped since they can never overlap an event.
#[derive(Debug, Clone, Default)]
pub struct AlarmIndex {
    records: Vec<AlarmRecord>,
}

impl AlarmIndex {
    pub fn new(records: Vec<AlarmRecord>) -> Self {
        let mut records: Vec<AlarmRecord> = records.into_iter().filter(|r| r.occurred.is_some()).collect();
        records.sort_by_key(|r| r.occurred);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any alarm explains `event`.
    pub fn explains(&self, event: &SwingEvent) -> bool {
        let (Some(target), Some(begin), Some(end)) = (event.target.as_deref(), event.begin, event.end) else {
            return false;
        };
        // Only alarms raised no later than the event end can overlap it
        let candidates = self.records.partition_point(|r| r.occurred.is_some_and(|o| o <= end));
        self.records[..candidates]
            .iter()
            .any(|r| r.overlaps(begin, end) && r.names(&event.me, target))
    }
}

/// Events no alarm explains, in their original order.
pub fn find_unmatched<'e>(events: &'e [SwingEvent], alarms: &AlarmIndex) -> Vec<&'e SwingEvent> {
    events.iter().filter(|e| !alarms.explains(e)).collect()
}

// ============================================================================
// Report
// ============================================================================

/// Unmatched events on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    /// Distinct MEs with an unmatched event that day.
    pub sites: usize,
    pub events: usize,
}

/// Group unmatched events by the date of their begin time.
pub fn daily_site_counts(events: &[&SwingEvent]) -> Vec<DailyCount> {
    let mut by_day: BTreeMap<NaiveDate, (BTreeSet<&str>, usize)> = BTreeMap::new();
    for event in events {
        if let Some(begin) = event.begin {
            let entry = by_day.entry(begin.date()).or_default();
            entry.0.insert(event.me.as_str());
            entry.1 += 1;
        }
    }
    by_day
        .into_iter()
        .map(|(date, (sites, events))| DailyCount {
            date,
            sites: sites.len(),
            events,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct FlappingRow {
    pub event: SwingEvent,
    pub cells: Vec<Cell>,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlappingReport {
    pub columns: Vec<String>,
    pub rows: Vec<FlappingRow>,
    pub daily: Vec<DailyCount>,
    pub swing_events: usize,
    pub alarms: usize,
    pub summary: Summary,
    pub message: Option<String>,
}

impl FlappingReport {
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

/// Find swing events in `optical` that no alarm in `alarms` explains.
pub fn reconcile(optical: &Table, alarms: &Table, swing_threshold_db: f64) -> Result<FlappingReport, AnalysisError> {
    let optical = normalized(optical);
    let alarms = normalized(alarms);
    require_columns(&optical, TableRole::Optical, OPTICAL_COLUMNS)?;
    let index = AlarmIndex::new(alarm_records(&alarms)?);

    let events = swing_events(&optical, swing_threshold_db);
    let unmatched = find_unmatched(&events, &index);

    let mut columns: Vec<String> = DISPLAY_COLUMNS
        .iter()
        .filter(|c| optical.has_column(c))
        .map(|c| (*c).to_string())
        .collect();
    let source_columns = columns.clone();
    columns.push(SWING.to_string());

    let rows: Vec<FlappingRow> = unmatched
        .iter()
        .map(|e| {
            let row = optical.row(e.row);
            let mut cells: Vec<Cell> = source_columns.iter().map(|c| row.get(c).clone()).collect();
            cells.push(Cell::from((e.swing_db * 100.0).round() / 100.0));
            FlappingRow {
                event: (*e).clone(),
                cells,
                status: Status::Flapping,
            }
        })
        .collect();

    let daily = daily_site_counts(&unmatched);
    let summary = if rows.is_empty() { Summary::Ok } else { Summary::NotOk };
    let message = rows
        .is_empty()
        .then(|| "No flapping event without a matching alarm".to_string());

    info!(
        optical_rows = optical.len(),
        swing_events = events.len(),
        alarms = index.len(),
        unmatched = rows.len(),
        "Flapping reconciliation complete"
    );

    Ok(FlappingReport {
        columns,
        rows,
        daily,
        swing_events: events.len(),
        alarms: index.len(),
        summary,
        message,
    })
}
