//! Cascading multi-column filter over result tables.
//!
//! Column *i*'s options are the values left after applying the selections on
//! columns *1..i-1*. Selected values that fall out of their options are
//! pruned, so no stale selection survives a pass.

use crate::types::Table;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Chosen values per column name.
pub type Selections = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnOptions {
    pub column: String,
    /// Sorted distinct values available for this column.
    pub options: Vec<String>,
    /// Selection actually applied (after pruning).
    pub selected: Vec<String>,
}

/// A selected value removed because it was no longer an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pruned {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterPass {
    pub table: Table,
    pub options: Vec<ColumnOptions>,
    pub pruned: Vec<Pruned>,
}

impl FilterPass {
    /// Selections that survived pruning.
    pub fn effective_selections(&self) -> Selections {
        self.options
            .iter()
            .filter(|o| !o.selected.is_empty())
            .map(|o| (o.column.clone(), o.selected.iter().cloned().collect()))
            .collect()
    }
}

/// One filtering pass over `table`.
///
/// Columns absent from the table get no options and filter nothing. Blank
/// cells never appear as options.
pub fn apply(table: &Table, columns: &[String], selections: &Selections) -> FilterPass {
    let mut candidates: Vec<usize> = (0..table.len()).collect();
    let mut options = Vec::with_capacity(columns.len());
    let mut pruned = Vec::new();

    for column in columns {
        if !table.has_column(column) {
            options.push(ColumnOptions {
                column: column.clone(),
                options: Vec::new(),
                selected: Vec::new(),
            });
            continue;
        }

        let available: BTreeSet<String> = candidates
            .iter()
            .map(|&i| table.cell(i, column).to_text())
            .filter(|v| !v.trim().is_empty())
            .collect();

        let mut selected = Vec::new();
        if let Some(chosen) = selections.get(column) {
            for value in chosen {
                if available.contains(value) {
                    selected.push(value.clone());
                } else {
                    pruned.push(Pruned {
                        column: column.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        if !selected.is_empty() {
            candidates.retain(|&i| selected.contains(&table.cell(i, column).to_text()));
        }

        options.push(ColumnOptions {
            column: column.clone(),
            options: available.into_iter().collect(),
            selected,
        });
    }

    if !pruned.is_empty() {
        debug!(pruned = pruned.len(), "Stale filter selections dropped");
    }

    FilterPass {
        table: table.select_rows(&candidates),
        options,
        pruned,
    }
}

/// Session-scoped filter that remembers its selections between passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CascadingFilter {
    columns: Vec<String>,
    selections: Selections,
}

impl CascadingFilter {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            selections: Selections::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn selections(&self) -> &Selections {
        &self.selections
    }

    /// Replace the selection of one column. An empty set clears it.
    pub fn select<I, S>(&mut self, column: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.selections.remove(column);
        } else {
            self.selections.insert(column.to_string(), values);
        }
    }

    /// Replace every selection at once.
    pub fn set_selections(&mut self, selections: Selections) {
        self.selections = selections
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
    }

    pub fn clear(&mut self) {
        self.selections.clear();
    }

    /// Run a pass and keep only the selections that survived it.
    pub fn apply(&mut self, table: &Table) -> FilterPass {
        let pass = apply(table, &self.columns, &self.selections);
        self.selections = pass.effective_selections();
        pass
    }
}
