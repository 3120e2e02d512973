//! Shared data structures for the DWDM monitoring engine
//!
//! - `Table` / `Cell`: the typed tabular contract between ingestion and analysis
//! - `Status` / `Summary`: per-row outcome and per-report banner

mod status;
mod table;

pub use status::*;
pub use table::*;
