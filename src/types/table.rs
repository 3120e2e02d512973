//! In-memory table model shared by ingestion, analysis and the API.
//!
//! A [`Table`] is a list of named columns plus rows of typed [`Cell`]s. It is
//! the contract between the spreadsheet/CSV layer and the analysis engine:
//! every evaluator reads columns by name and coerces cells on demand.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Cell
// ============================================================================

/// One typed cell value.
///
/// Serialized untagged: `null`, a JSON number, or a string. Strings in an
/// ISO-8601 date-time layout deserialize to [`Cell::DateTime`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    DateTime(NaiveDateTime),
    Text(String),
}

/// Date-time layouts found in NMS exports, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Parse a timestamp string in any of the supported export layouts.
///
/// RFC 3339 strings with an offset are accepted and reduced to their local
/// wall-clock time, matching how the other layouts carry no zone.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_local())
        .or_else(|| {
            DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z")
                .ok()
                .map(|dt| dt.naive_local())
        })
}

impl Cell {
    /// Type a raw text field: blank → `Empty`, a number whose rendering
    /// reproduces the source → `Number`, anything else → `Text` (verbatim).
    ///
    /// Identifiers such as `00123` or `1.10` stay text so that
    /// [`Cell::to_text`] gives back exactly what the export held. They still
    /// coerce through [`Cell::as_f64`].
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() && format_number(v) == trimmed => Self::Number(v),
            _ => Self::Text(raw.to_string()),
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric coercion. Non-numeric text and non-finite numbers yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) if v.is_finite() => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(ts) => Some(*ts),
            Self::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Render as an identifier string. Integral numbers drop the fraction so
    /// that `ME = 12` keys as `"12"`, not `"12.0"`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Number(v) => format_number(*v),
            Self::DateTime(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
        #[allow(clippy::cast_possible_truncation)]
        let int = v as i64;
        int.to_string()
    } else {
        v.to_string()
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        if v.is_finite() {
            Self::Number(v)
        } else {
            Self::Empty
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ============================================================================
// Table
// ============================================================================

static EMPTY_CELL: Cell = Cell::Empty;

/// Column-named rows of typed cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table, padding or truncating rows to the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Cell::Empty);
                r
            })
            .collect();
        Self { columns, rows }
    }

    /// Convenience constructor used by tests and fixtures.
    pub fn from_rows<C, R>(columns: &[&str], rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator<Item = Cell>,
    {
        Self::new(
            columns.iter().map(|c| (*c).to_string()).collect(),
            rows.into_iter().map(|r| r.into_iter().collect()).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Names from `required` that this table lacks, in `required` order.
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|c| !self.has_column(c))
            .collect()
    }

    /// Cell at (`row`, `column`); `Empty` when either is out of range.
    pub fn cell(&self, row: usize, column: &str) -> &Cell {
        self.column_index(column)
            .and_then(|ci| self.rows.get(row).and_then(|r| r.get(ci)))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn row(&self, index: usize) -> RowView<'_> {
        RowView { table: self, index }
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.rows.len()).map(move |index| RowView { table: self, index })
    }

    /// A new table holding the rows at `indices`, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> RowView<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn get(&self, column: &str) -> &'a Cell {
        self.table.cell(self.index, column)
    }

    pub fn has(&self, column: &str) -> bool {
        self.table.has_column(column)
    }

    pub fn text(&self, column: &str) -> String {
        self.get(column).to_text()
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).as_f64()
    }

    pub fn timestamp(&self, column: &str) -> Option<NaiveDateTime> {
        self.get(column).as_datetime()
    }
}
