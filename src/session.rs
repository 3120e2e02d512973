//! Per-session upload context.
//!
//! Holds every uploaded table and log plus one cascading filter per view.
//! Passed explicitly into view runs; nothing here is global.

use crate::analysis::{CascadingFilter, MetricFamily};
use crate::ingest::{decode_upload, parse_csv_with, HeaderPolicy, IngestError};
use crate::types::Table;
use crate::views::View;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Named upload slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadSlot {
    Measurement(MetricFamily),
    OscOptical,
    FmAlarms,
    EolRaw,
    EolReference,
    WasonLog,
    /// Session override of a family's reference table.
    Reference(MetricFamily),
}

impl UploadSlot {
    pub const ALL: [Self; 15] = [
        Self::Measurement(MetricFamily::Cpu),
        Self::Measurement(MetricFamily::Fan),
        Self::Measurement(MetricFamily::Msu),
        Self::Measurement(MetricFamily::Line),
        Self::Measurement(MetricFamily::Client),
        Self::OscOptical,
        Self::FmAlarms,
        Self::EolRaw,
        Self::EolReference,
        Self::WasonLog,
        Self::Reference(MetricFamily::Cpu),
        Self::Reference(MetricFamily::Fan),
        Self::Reference(MetricFamily::Msu),
        Self::Reference(MetricFamily::Line),
        Self::Reference(MetricFamily::Client),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Measurement(MetricFamily::Cpu) => "cpu",
            Self::Measurement(MetricFamily::Fan) => "fan",
            Self::Measurement(MetricFamily::Msu) => "msu",
            Self::Measurement(MetricFamily::Line) => "line",
            Self::Measurement(MetricFamily::Client) => "client",
            Self::OscOptical => "osc",
            Self::FmAlarms => "fm",
            Self::EolRaw => "eol-raw",
            Self::EolReference => "eol-reference",
            Self::WasonLog => "wason",
            Self::Reference(MetricFamily::Cpu) => "reference-cpu",
            Self::Reference(MetricFamily::Fan) => "reference-fan",
            Self::Reference(MetricFamily::Msu) => "reference-msu",
            Self::Reference(MetricFamily::Line) => "reference-line",
            Self::Reference(MetricFamily::Client) => "reference-client",
        }
    }

    /// WASON logs are kept as text; everything else is a CSV table.
    pub fn is_text(self) -> bool {
        matches!(self, Self::WasonLog)
    }

    /// The EOL workbook repeats its day-group headers.
    pub fn header_policy(self) -> HeaderPolicy {
        match self {
            Self::EolReference => HeaderPolicy::Mangle,
            _ => HeaderPolicy::Reject,
        }
    }
}

impl std::fmt::Display for UploadSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UploadSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| format!("unknown upload slot '{s}'"))
    }
}

impl Serialize for UploadSlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What an accepted upload contained.
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub slot: UploadSlot,
    pub rows: usize,
    pub columns: Vec<String>,
}

/// Uploaded inputs and filter state for one user session.
#[derive(Debug, Default)]
pub struct SessionContext {
    tables: HashMap<UploadSlot, Table>,
    wason_log: Option<String>,
    filters: HashMap<View, CascadingFilter>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and parse an upload, replacing the slot only on success.
    pub fn store_upload(&mut self, slot: UploadSlot, body: &[u8]) -> Result<UploadSummary, IngestError> {
        let text = decode_upload(body)?;
        if slot.is_text() {
            let rows = text.lines().count();
            self.store_log(text);
            info!(slot = %slot, lines = rows, "Log uploaded");
            return Ok(UploadSummary {
                slot,
                rows,
                columns: Vec::new(),
            });
        }
        let table = parse_csv_with(&text, slot.header_policy())?;
        let summary = UploadSummary {
            slot,
            rows: table.len(),
            columns: table.columns.clone(),
        };
        self.store_table(slot, table);
        Ok(summary)
    }

    pub fn store_table(&mut self, slot: UploadSlot, table: Table) {
        info!(slot = %slot, rows = table.len(), columns = table.columns.len(), "Table uploaded");
        self.tables.insert(slot, table);
    }

    pub fn store_log(&mut self, text: impl Into<String>) {
        self.wason_log = Some(text.into());
    }

    pub fn table(&self, slot: UploadSlot) -> Option<&Table> {
        self.tables.get(&slot)
    }

    pub fn wason_log(&self) -> Option<&str> {
        self.wason_log.as_deref()
    }

    pub fn has(&self, slot: UploadSlot) -> bool {
        if slot.is_text() {
            self.wason_log.is_some()
        } else {
            self.tables.contains_key(&slot)
        }
    }

    /// Uploaded reference table that replaces the store for `family`.
    pub fn reference_override(&self, family: MetricFamily) -> Option<&Table> {
        self.table(UploadSlot::Reference(family))
    }

    /// Drop one slot. Returns whether anything was stored there.
    pub fn clear(&mut self, slot: UploadSlot) -> bool {
        if slot.is_text() {
            self.wason_log.take().is_some()
        } else {
            self.tables.remove(&slot).is_some()
        }
    }

    pub fn clear_all(&mut self) {
        self.tables.clear();
        self.wason_log = None;
        self.filters.clear();
    }

    /// Slots currently holding data, in [`UploadSlot::ALL`] order.
    pub fn uploaded(&self) -> Vec<UploadSlot> {
        UploadSlot::ALL.into_iter().filter(|s| self.has(*s)).collect()
    }

    /// Cascading filter for `view`, created with `columns` on first use.
    pub fn filter_mut(&mut self, view: View, columns: Vec<String>) -> &mut CascadingFilter {
        self.filters
            .entry(view)
            .or_insert_with(|| CascadingFilter::new(columns))
    }

    pub fn filter(&self, view: View) -> Option<&CascadingFilter> {
        self.filters.get(&view)
    }
}
