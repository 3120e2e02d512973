//! Table ingestion: CSV exports and raw log text.
//!
//! Spreadsheet exports arrive as CSV (the NMS "Export → CSV" path); WASON
//! routing logs arrive as plain text. Parsing is all-or-nothing so a failed
//! upload never replaces a previously cached table.

mod delimited;

pub use delimited::{parse_csv, parse_csv_with, write_csv, HeaderPolicy};

use crate::types::Table;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Input has no header line")]
    NoHeader,

    #[error("Input is not valid UTF-8")]
    NotUtf8,

    #[error("Duplicate column after header normalization: {0}")]
    DuplicateColumn(String),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Load a CSV file from disk.
pub fn load_table(path: &Path) -> Result<Table, IngestError> {
    let text = load_text(path)?;
    parse_csv(&text)
}

/// Load a text file from disk (WASON logs).
pub fn load_text(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::InvalidData {
            IngestError::NotUtf8
        } else {
            IngestError::Io(path.to_path_buf(), e)
        }
    })
}

/// Decode an uploaded body, tolerating a UTF-8 BOM.
pub fn decode_upload(bytes: &[u8]) -> Result<String, IngestError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|_| IngestError::NotUtf8)
}
