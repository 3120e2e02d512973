//! WASON routing log parser and restoration classifier.
//!
//! A log is split into call blocks at header lines of the form
//! `[WASON][CALL <id>] [<endpoint> <endpoint> <call-number>]`. Each block that
//! carries a WR attribute line is classified PASS or FAIL from its WR
//! NO_ALARM marker and its used working preroute entry.

use crate::ingest::write_csv;
use crate::types::{Cell, Status, Summary, Table};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::{debug, info};

struct Patterns {
    header: Regex,
    wr: Regex,
    wr_no_alarm: Regex,
    preroute: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        header: Regex::new(r"\[WASON\]\s*\[CALL\s+(\d+)\]\s*\[([^\]]*)\]").expect("valid header regex"),
        wr: Regex::new(r"connection has attribute\s+WR\b").expect("valid WR regex"),
        wr_no_alarm: Regex::new(r"\bWR\s+NO_ALARM\b").expect("valid NO_ALARM regex"),
        preroute: Regex::new(r"--(\d+)--WORK--\((\w+)\)--\((\w+)\)").expect("valid preroute regex"),
    })
}

// ============================================================================
// Blocks
// ============================================================================

/// Endpoint triple from a call header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoints {
    pub raw: String,
    pub parts: Vec<String>,
}

impl Endpoints {
    fn parse(raw: &str) -> Self {
        Self {
            raw: raw.trim().to_string(),
            parts: raw.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Raw lines of one call, header included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallBlock {
    pub call_id: u64,
    pub endpoints: Endpoints,
    pub lines: Vec<String>,
}

fn parse_header(line: &str) -> Option<(u64, Endpoints)> {
    let caps = patterns().header.captures(line)?;
    let call_id = caps.get(1)?.as_str().parse().ok()?;
    let endpoints = Endpoints::parse(caps.get(2).map_or("", |m| m.as_str()));
    Some((call_id, endpoints))
}

/// Split `text` into call blocks in one pass. Lines before the first header
/// are ignored; a log without headers yields no blocks.
pub fn parse_blocks(text: &str) -> Vec<CallBlock> {
    let mut blocks: Vec<CallBlock> = Vec::new();
    let mut preamble = 0usize;
    for line in text.lines() {
        if let Some((call_id, endpoints)) = parse_header(line) {
            blocks.push(CallBlock {
                call_id,
                endpoints,
                lines: vec![line.to_string()],
            });
        } else if let Some(current) = blocks.last_mut() {
            current.lines.push(line.to_string());
        } else {
            preamble += 1;
        }
    }
    if preamble > 0 {
        debug!(lines = preamble, "Lines before the first call header ignored");
    }
    blocks
}

// ============================================================================
// Classification
// ============================================================================

/// One `--<n>--WORK--(<usage>)--(<result>)` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrerouteEntry {
    pub index: u32,
    pub usage: String,
    pub result: String,
}

impl PrerouteEntry {
    pub fn is_used(&self) -> bool {
        self.usage == "USED"
    }
}

fn preroute_entry(line: &str) -> Option<PrerouteEntry> {
    let caps = patterns().preroute.captures(line)?;
    Some(PrerouteEntry {
        index: caps.get(1)?.as_str().parse().ok()?,
        usage: caps.get(2)?.as_str().to_string(),
        result: caps.get(3)?.as_str().to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallVerdict {
    pub call_id: u64,
    pub endpoints: Endpoints,
    pub outcome: Outcome,
    pub reason: String,
    /// Index of the used working preroute, set on PASS.
    pub preroute_index: Option<u32>,
    pub lines: Vec<String>,
}

impl CallVerdict {
    pub fn status(&self) -> Status {
        match self.outcome {
            Outcome::Pass => Status::Ok,
            Outcome::Fail => Status::Fail,
        }
    }
}

/// Classify one block. Blocks without a WR attribute line are excluded.
pub fn classify(block: &CallBlock) -> Option<CallVerdict> {
    let p = patterns();
    let wr_lines: Vec<&String> = block.lines.iter().filter(|l| p.wr.is_match(l)).collect();
    if wr_lines.is_empty() {
        return None;
    }

    let used: Vec<PrerouteEntry> = block
        .lines
        .iter()
        .filter_map(|l| preroute_entry(l))
        .filter(PrerouteEntry::is_used)
        .collect();

    let (outcome, reason, preroute_index) = if !wr_lines.iter().any(|l| p.wr_no_alarm.is_match(l)) {
        (Outcome::Fail, "WR found but not WR NO_ALARM".to_string(), None)
    } else if used.len() != 1 {
        (Outcome::Fail, format!("found {} used rows (expected 1)", used.len()), None)
    } else if used[0].result != "SUCCESS" {
        (Outcome::Fail, "USED row is not SUCCESS".to_string(), None)
    } else {
        (Outcome::Pass, "Normal".to_string(), Some(used[0].index))
    };

    Some(CallVerdict {
        call_id: block.call_id,
        endpoints: block.endpoints.clone(),
        outcome,
        reason,
        preroute_index,
        lines: block.lines.clone(),
    })
}

// ============================================================================
// Report
// ============================================================================

pub const EXPORT_COLUMNS: [&str; 5] = ["Call ID", "Endpoints", "Verdict", "Reason", "Preroute Index"];

#[derive(Debug, Clone, Serialize)]
pub struct WasonReport {
    pub blocks: usize,
    /// Blocks without a WR line.
    pub excluded: usize,
    pub verdicts: Vec<CallVerdict>,
    pub summary: Summary,
}

impl WasonReport {
    pub fn passed(&self) -> usize {
        self.verdicts.iter().filter(|v| v.outcome == Outcome::Pass).count()
    }

    pub fn failed(&self) -> usize {
        self.verdicts.len() - self.passed()
    }

    /// Flattened summary table (one row per classified call).
    pub fn to_table(&self) -> Table {
        let mut columns: Vec<String> = EXPORT_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        columns.push("Status".to_string());
        let rows = self
            .verdicts
            .iter()
            .map(|v| {
                vec![
                    Cell::from(v.call_id.to_string()),
                    Cell::text(v.endpoints.raw.clone()),
                    Cell::text(v.outcome.as_str()),
                    Cell::text(v.reason.clone()),
                    v.preroute_index.map_or(Cell::Empty, |i| Cell::Number(f64::from(i))),
                    Cell::text(v.status().as_str()),
                ]
            })
            .collect();
        Table::new(columns, rows)
    }
}

/// Parse and classify a whole log.
pub fn analyze_log(text: &str) -> WasonReport {
    let blocks = parse_blocks(text);
    let verdicts: Vec<CallVerdict> = blocks.iter().filter_map(classify).collect();
    let summary = Summary::from_statuses(verdicts.iter().map(CallVerdict::status));
    let report = WasonReport {
        blocks: blocks.len(),
        excluded: blocks.len() - verdicts.len(),
        verdicts,
        summary,
    };
    info!(
        blocks = report.blocks,
        excluded = report.excluded,
        passed = report.passed(),
        failed = report.failed(),
        "WASON log classified"
    );
    report
}

/// CSV of the flattened summary: `Call ID, Endpoints, Verdict, Reason, Preroute Index`.
pub fn export_csv(report: &WasonReport) -> String {
    let mut table = report.to_table();
    table.columns.truncate(EXPORT_COLUMNS.len());
    for row in &mut table.rows {
        row.truncate(EXPORT_COLUMNS.len());
    }
    write_csv(&table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSING: &str = "\
[WASON][CALL 17] [NE-A NE-B 4]
2024-05-01 10:00:01 connection has attribute WR
2024-05-01 10:00:01 connection has attribute WR NO_ALARM
preroute --1--WORK--(UNUSED)--(SUCCESS)
preroute --3--WORK--(USED)--(SUCCESS)
";

    #[test]
    fn test_single_used_success_passes() {
        let report = analyze_log(PASSING);
        assert_eq!(report.verdicts.len(), 1);
        let v = &report.verdicts[0];
        assert_eq!(v.call_id, 17);
        assert_eq!(v.outcome, Outcome::Pass);
        assert_eq!(v.reason, "Normal");
        assert_eq!(v.preroute_index, Some(3));
        assert_eq!(v.endpoints.parts, vec!["NE-A", "NE-B", "4"]);
        assert_eq!(report.summary, Summary::Ok);
    }

    #[test]
    fn test_two_used_rows_fail_with_count() {
        let log = format!("{PASSING}preroute --4--WORK--(USED)--(SUCCESS)\n");
        let v = &analyze_log(&log).verdicts[0];
        assert_eq!(v.outcome, Outcome::Fail);
        assert_eq!(v.reason, "found 2 used rows (expected 1)");
        assert_eq!(v.preroute_index, None);
    }

    #[test]
    fn test_missing_no_alarm_fails_first() {
        let log = "[WASON][CALL 1] [A B 1]\nconnection has attribute WR\n--1--WORK--(USED)--(FAIL)\n";
        let v = &analyze_log(log).verdicts[0];
        assert_eq!(v.reason, "WR found but not WR NO_ALARM");
    }

    #[test]
    fn test_used_row_not_success() {
        let log = "[WASON][CALL 1] [A B 1]\nconnection has attribute WR NO_ALARM\n--2--WORK--(USED)--(FAIL)\n";
        let v = &analyze_log(log).verdicts[0];
        assert_eq!(v.outcome, Outcome::Fail);
        assert_eq!(v.reason, "USED row is not SUCCESS");
    }

    #[test]
    fn test_block_without_wr_is_excluded() {
        let log = format!("[WASON][CALL 9] [X Y 2]\nsome other line\n{PASSING}");
        let report = analyze_log(&log);
        assert_eq!(report.blocks, 2);
        assert_eq!(report.excluded, 1);
        assert_eq!(report.verdicts[0].call_id, 17);
    }

    #[test]
    fn test_blocks_end_at_next_header_and_skip_preamble() {
        let log = "boot banner\n[WASON][CALL 1] [A B 1]\nline a\n[WASON][CALL 2] [C D 2]\nline b\nline c\n";
        let blocks = parse_blocks(log);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines.len(), 2);
        assert_eq!(blocks[1].lines, vec!["[WASON][CALL 2] [C D 2]", "line b", "line c"]);
    }

    #[test]
    fn test_unstructured_log_yields_nothing() {
        let report = analyze_log("nothing to see\nhere\n");
        assert_eq!(report.blocks, 0);
        assert_eq!(report.summary, Summary::NoData);
    }

    #[test]
    fn test_export_csv_columns() {
        let csv = export_csv(&analyze_log(PASSING));
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Call ID,Endpoints,Verdict,Reason,Preroute Index"));
        assert_eq!(lines.next(), Some("17,NE-A NE-B 4,PASS,Normal,3"));
    }
}
