//! ReferenceStore trait: where per-family threshold tables come from.
//!
//! - `DirectoryReferenceStore`: `<dir>/CPU.csv`, `FAN.csv`, ... on disk
//! - `InMemoryReferenceStore`: tables held in memory for tests and embedding
//!
//! A reference table uploaded into a session overrides the store for that
//! session only; see [`crate::session::SessionContext::reference_override`].

use crate::analysis::MetricFamily;
use crate::ingest::{load_table, IngestError};
use crate::types::Table;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Source of reference tables, shared across request handlers.
pub trait ReferenceStore: Send + Sync {
    /// Current reference table for `family`.
    fn reference_table(&self, family: MetricFamily) -> Result<Table, ReferenceError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("no {family} reference table at {}", .path.display())]
    NotFound { family: MetricFamily, path: PathBuf },
    #[error("{family} reference table is unreadable: {source}")]
    Ingest {
        family: MetricFamily,
        #[source]
        source: IngestError,
    },
    #[error("reference storage error: {0}")]
    Storage(String),
}

// ============================================================================
// Directory
// ============================================================================

/// Reads `<dir>/<FAMILY>.csv` on every call so edits on disk apply to the
/// next run without a restart.
#[derive(Debug, Clone)]
pub struct DirectoryReferenceStore {
    dir: PathBuf,
}

impl DirectoryReferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, family: MetricFamily) -> PathBuf {
        self.dir.join(format!("{}.csv", family.reference_name()))
    }
}

impl ReferenceStore for DirectoryReferenceStore {
    fn reference_table(&self, family: MetricFamily) -> Result<Table, ReferenceError> {
        let path = self.path_for(family);
        if !path.is_file() {
            return Err(ReferenceError::NotFound { family, path });
        }
        let table = load_table(&path).map_err(|source| ReferenceError::Ingest { family, source })?;
        debug!(family = %family, path = %path.display(), rows = table.len(), "Loaded reference table");
        Ok(table)
    }

    fn backend_name(&self) -> &'static str {
        "directory"
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Thread-safe via `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryReferenceStore {
    tables: RwLock<HashMap<MetricFamily, Table>>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, family: MetricFamily, table: Table) -> Self {
        // Fresh lock, cannot be poisoned
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(family, table);
        }
        self
    }

    pub fn insert(&self, family: MetricFamily, table: Table) -> Result<(), ReferenceError> {
        self.tables
            .write()
            .map_err(|e| ReferenceError::Storage(e.to_string()))?
            .insert(family, table);
        Ok(())
    }
}

impl ReferenceStore for InMemoryReferenceStore {
    fn reference_table(&self, family: MetricFamily) -> Result<Table, ReferenceError> {
        self.tables
            .read()
            .map_err(|e| ReferenceError::Storage(e.to_string()))?
            .get(&family)
            .cloned()
            .ok_or_else(|| ReferenceError::NotFound {
                family,
                path: PathBuf::from("<memory>"),
            })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
