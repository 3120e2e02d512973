//! Quote-aware CSV reading and writing for NMS exports.

use super::IngestError;
use crate::analysis::keys::normalize_header;
use crate::types::{Cell, Table};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Split a CSV line respecting quoted fields (handles commas inside quotes).
/// Returns owned strings because quoted fields need unquoting.
pub(crate) fn csv_split(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    // Escaped quote ("")
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c == delimiter && !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Pick `;` or tab when the header clearly uses it, otherwise `,`.
fn detect_delimiter(header: &str) -> char {
    let count = |d: char| csv_split(header, d).len();
    let comma = count(',');
    let semi = count(';');
    let tab = count('\t');
    if tab > comma && tab >= semi {
        '\t'
    } else if semi > comma {
        ';'
    } else {
        ','
    }
}

/// What to do when two headers normalize to the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    #[default]
    Reject,
    /// Suffix repeats as `name.1`, `name.2`, ... Spreadsheet exports with
    /// grouped day columns repeat their group labels.
    Mangle,
}

/// Parse CSV text into a [`Table`], rejecting duplicate headers.
///
/// The first non-blank record is the header. Quoted fields may span lines.
/// Short rows are padded with `Empty`; long rows are truncated. Blank lines
/// are skipped.
pub fn parse_csv(text: &str) -> Result<Table, IngestError> {
    parse_csv_with(text, HeaderPolicy::Reject)
}

/// [`parse_csv`] with an explicit duplicate-header policy.
pub fn parse_csv_with(text: &str, policy: HeaderPolicy) -> Result<Table, IngestError> {
    let header_line = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or(IngestError::NoHeader)?;
    let delimiter = detect_delimiter(header_line);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(u8::try_from(delimiter).unwrap_or(b','))
        .from_reader(text.as_bytes());

    let mut records = reader
        .records()
        .filter(|r| r.as_ref().map_or(true, |rec| rec.iter().any(|f| !f.trim().is_empty())));
    let header = records.next().ok_or(IngestError::NoHeader)??;

    let width = header.len();
    let mut columns = Vec::with_capacity(width);
    let mut seen = HashSet::with_capacity(width);
    for raw in &header {
        let name = normalize_header(raw);
        if name.is_empty() || seen.insert(name.clone()) {
            columns.push(raw.to_string());
            continue;
        }
        match policy {
            HeaderPolicy::Reject => return Err(IngestError::DuplicateColumn(name)),
            HeaderPolicy::Mangle => {
                let renamed = (1usize..)
                    .map(|n| format!("{name}.{n}"))
                    .find(|c| !seen.contains(c))
                    .unwrap_or_default();
                debug!(column = %name, renamed = %renamed, "Repeated header renamed");
                seen.insert(renamed.clone());
                columns.push(renamed);
            }
        }
    }

    let mut rows = Vec::new();
    let mut truncated = 0usize;
    for record in records {
        let record = record?;
        if record.len() > width {
            truncated += 1;
        }
        let row: Vec<Cell> = record.iter().take(width).map(Cell::from_raw).collect();
        rows.push(row);
    }
    if truncated > 0 {
        warn!(rows = truncated, width, "CSV rows wider than header were truncated");
    }
    debug!(columns = width, rows = rows.len(), delimiter = %delimiter.escape_default(), "Parsed CSV table");

    Ok(Table::new(columns, rows))
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render a table as comma-separated text with a header line.
pub fn write_csv(table: &Table) -> String {
    let mut out = String::new();
    let header: Vec<String> = table.columns.iter().map(|c| quote_field(c)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in &table.rows {
        let fields: Vec<String> = row.iter().map(|c| quote_field(&c.to_text())).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}
