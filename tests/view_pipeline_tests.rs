//! View Pipeline Tests
//!
//! End-to-end runs: CSV and log fixtures written to a temp directory, loaded
//! into a session, evaluated through `run_view` against a directory-backed
//! reference store.

use dwdm_monitor::analysis::CascadingFilter;
use dwdm_monitor::config::MonitorConfig;
use dwdm_monitor::reference::DirectoryReferenceStore;
use dwdm_monitor::session::{SessionContext, UploadSlot};
use dwdm_monitor::types::{Status, Summary};
use dwdm_monitor::views::{run_view, View, ViewReport};
use dwdm_monitor::MetricFamily;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

const FAN_REFERENCE: &str = "\
Mapping,Site Name
NE1FCC-1,North
NE1FCPP-2,North
NE2FCPS-1,South
";

const FAN_EXPORT: &str = "\
ME,Measure Object,Begin Time,End Time,Value of Fan Rotate Speed(Rps)
NE1,FCC-1,2024-05-01 10:00:00,2024-05-01 10:15:00,130
NE1,FCPP-2,2024-05-01 10:00:00,2024-05-01 10:15:00,200
NE2,FCPS-1,2024-05-01 10:00:00,2024-05-01 10:15:00,--
";

const LINE_REFERENCE: &str = "\
Mapping,Site Name,Max Output Power(dBm),Min Output Power(dBm),Max Input Power(dBm),Min Input Power(dBm)
NE1LINE-1,North,5,-3,0,-18
NE2LINE-1,South,5,-3,0,-18
";

const LINE_EXPORT: &str = "\
ME,Measure Object,Output Optical Power(dBm),Input Optical Power(dBm),BER After FEC
NE1,LINE-1,1.5,-10.2,0
NE2,LINE-1,1.2,-11.0,1.0E-09
";

const OSC_EXPORT: &str = "\
Begin Time,End Time,ME,Measure Object,Max Value of Input Optical Power(dBm),Min Value of Input Optical Power(dBm)
2024-05-01 10:00:00,2024-05-01 10:15:00,NE-A,OSC(NE-B),-10,-13
2024-05-01 10:00:00,2024-05-01 10:15:00,NE-C,OSC(NE-D),-10,-11
2024-05-02 08:00:00,2024-05-02 08:15:00,NE-E,OSC(NE-F),-5,-10
";

const FM_EXPORT: &str = "\
Alarm Name,Occurrence Time,Clear Time,Link Name
R_LOS,2024-05-01 09:58:00,2024-05-01 10:30:00,NE-A:1-OSC--NE-B:2-OSC
";

const EOL_REFERENCE: &str = "\
Link Name,EOL(dB)
NEA-1_NEB-1,20
NEB-1_NEA-1,20
NEC-1_NED-1,18
";

const EOL_RAW: &str = "\
Source Port,Sink Port,Optical Attenuation (dB)
NEA-1,NEB-1,21
NEB-1,NEA-1,24.5
NEC-1,NED-1,--
";

const WASON_LOG: &str = "\
[WASON][CALL 17] [NE-A NE-B 4]
connection has attribute WR NO_ALARM
preroute --1--WORK--(UNUSED)--(SUCCESS)
preroute --3--WORK--(USED)--(SUCCESS)
[WASON][CALL 21] [NE-C NE-D 1]
no restoration attribute here
";

struct Fixture {
    dir: TempDir,
    session: SessionContext,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            session: SessionContext::new(),
        }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn upload(&mut self, slot: UploadSlot, name: &str, content: &str) {
        let path = self.write(name, content);
        self.session.store_upload(slot, &std::fs::read(&path).unwrap()).unwrap();
    }

    fn reference_dir(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, view: View) -> ViewReport {
        let store = DirectoryReferenceStore::new(self.reference_dir());
        run_view(view, &self.session, &store, &MonitorConfig::default()).unwrap()
    }
}

// ============================================================================
// Metric families
// ============================================================================

#[test]
fn fan_caps_flag_only_the_overspeed_unit() {
    let mut fx = Fixture::new();
    fx.write("FAN.csv", FAN_REFERENCE);
    fx.upload(UploadSlot::Measurement(MetricFamily::Fan), "fan.csv", FAN_EXPORT);

    let ViewReport::Family(report) = fx.run(View::Fan) else {
        panic!("expected family report");
    };
    let statuses: Vec<Status> = report.rows.iter().map(|r| r.status).collect();
    // Non-numeric speed is a pass
    assert_eq!(statuses, vec![Status::Fail, Status::Ok, Status::Ok]);
    assert_eq!(report.summary, Summary::NotOk);
    assert_eq!(report.failed_rows().count(), 1);
}

#[test]
fn line_fails_on_ber_above_zero() {
    let mut fx = Fixture::new();
    fx.write("LINE.csv", LINE_REFERENCE);
    fx.upload(UploadSlot::Measurement(MetricFamily::Line), "line.csv", LINE_EXPORT);

    let report = fx.run(View::Line);
    let table = report.to_table();
    assert_eq!(table.cell(0, "Status").to_text(), "ok");
    assert_eq!(table.cell(1, "Status").to_text(), "fail");
    assert_eq!(table.cell(1, "Site Name").to_text(), "South");
}

#[test]
fn measurements_without_reference_match_report_no_data() {
    let mut fx = Fixture::new();
    fx.write("FAN.csv", "Mapping,Site Name\nNE9FCC-1,East\n");
    fx.upload(UploadSlot::Measurement(MetricFamily::Fan), "fan.csv", FAN_EXPORT);

    let ViewReport::Family(report) = fx.run(View::Fan) else {
        panic!("expected family report");
    };
    assert_eq!(report.summary, Summary::NoData);
    assert!(report.rows.is_empty());
    assert!(report.message.is_some());
}

#[test]
fn numeric_looking_identifiers_join_as_written() {
    let mut fx = Fixture::new();
    fx.write(
        "CPU.csv",
        "Mapping,Site Name,Maximum threshold,Minimum threshold\n00123CPU-1,South,90,0\nNE11.10,North,90,0\n",
    );
    fx.upload(
        UploadSlot::Measurement(MetricFamily::Cpu),
        "cpu.csv",
        "ME,Measure Object,CPU utilization ratio\n00123,CPU-1,99\nNE1,1.10,95\n",
    );

    let ViewReport::Family(report) = fx.run(View::Cpu) else {
        panic!("expected family report");
    };
    assert_eq!(report.summary, Summary::NotOk);
    let statuses: Vec<Status> = report.rows.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![Status::Fail, Status::Fail]);
}

#[test]
fn reference_edits_on_disk_apply_to_next_run() {
    let mut fx = Fixture::new();
    fx.write("LINE.csv", LINE_REFERENCE);
    fx.upload(UploadSlot::Measurement(MetricFamily::Line), "line.csv", LINE_EXPORT);
    assert_eq!(fx.run(View::Line).summary(), Summary::NotOk);

    fx.write("LINE.csv", "Mapping,Max Output Power(dBm),Min Output Power(dBm),Max Input Power(dBm),Min Input Power(dBm)\nNE1LINE-1,5,-3,0,-18\n");
    assert_eq!(fx.run(View::Line).summary(), Summary::Ok);
}

// ============================================================================
// OSC flapping
// ============================================================================

#[test]
fn osc_reports_only_unexplained_swings() {
    let mut fx = Fixture::new();
    fx.upload(UploadSlot::OscOptical, "osc.csv", OSC_EXPORT);
    fx.upload(UploadSlot::FmAlarms, "fm.csv", FM_EXPORT);

    let ViewReport::Flapping(report) = fx.run(View::Osc) else {
        panic!("expected flapping report");
    };
    assert_eq!(report.swing_events, 2);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].event.me, "NE-E");
    assert_eq!(report.rows[0].status, Status::Flapping);
    assert_eq!(report.daily.len(), 1);
}

#[test]
fn osc_result_feeds_cascading_filter() {
    let mut fx = Fixture::new();
    fx.upload(UploadSlot::OscOptical, "osc.csv", OSC_EXPORT);
    fx.upload(UploadSlot::FmAlarms, "fm.csv", "Occurrence Time,Clear Time,Link Name\n");

    let table = fx.run(View::Osc).to_table();
    assert_eq!(table.len(), 2);

    let mut filter = CascadingFilter::new(View::Osc.filter_columns(&MonitorConfig::default()));
    filter.select("ME", ["NE-E"]);
    let pass = filter.apply(&table);
    assert_eq!(pass.table.len(), 1);
    assert_eq!(pass.options[0].options, vec!["NE-A", "NE-E"]);
    assert_eq!(pass.options[1].options, vec!["OSC(NE-F)"]);
}

// ============================================================================
// Attenuation
// ============================================================================

fn attenuation_fixture() -> Fixture {
    let mut fx = Fixture::new();
    fx.upload(UploadSlot::EolReference, "eol.csv", EOL_REFERENCE);
    fx.upload(UploadSlot::EolRaw, "raw.csv", EOL_RAW);
    fx
}

#[test]
fn eol_marks_overrun_and_fiber_break() {
    let fx = attenuation_fixture();
    let ViewReport::Eol(report) = fx.run(View::LossEol) else {
        panic!("expected EOL report");
    };
    let statuses: Vec<Status> = report.rows.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![Status::Ok, Status::Fail, Status::Flapping]);
    assert_eq!(report.rows[1].diff, Some(3.5));
    assert_eq!(report.rows[2].remark, "Fiber Break");
    assert_eq!(report.managed_elements, vec!["NEA", "NEB", "NEC"]);
}

/// Multi-day workbook as operators export it: day groups repeat the `140`
/// header and the first data row labels each sub-column.
const EOL_WORKBOOK: &str = "\
No.,140,140,Day 1,Day 1,Day 2,Day 2
,Port,Link,EOL(dB),Current(dB),EOL(dB),Current(dB)
1,NEA-1,NEA-1_NEB-1,20,19.5,20.5,19.8
2,NEB-1,NEB-1_NEA-1,20,19.9,20.5,20.1
3,NEC-1,NEC-1_NED-1,18,17.2,18.5,17.9
";

#[test]
fn eol_reads_workbook_layout_reference() {
    let mut fx = Fixture::new();
    fx.upload(UploadSlot::EolReference, "eol.csv", EOL_WORKBOOK);
    fx.upload(UploadSlot::EolRaw, "raw.csv", EOL_RAW);

    let ViewReport::Eol(report) = fx.run(View::LossEol) else {
        panic!("expected EOL report");
    };
    let links: Vec<&str> = report.rows.iter().map(|r| r.link.as_str()).collect();
    assert_eq!(links, vec!["NEA-1_NEB-1", "NEB-1_NEA-1", "NEC-1_NED-1"]);
    let statuses: Vec<Status> = report.rows.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![Status::Ok, Status::Fail, Status::Flapping]);
    assert_eq!(report.rows[1].diff, Some(3.5));
}

#[test]
fn eol_filters_by_managed_element() {
    let fx = attenuation_fixture();
    let report = fx.run(View::LossEol).for_managed_element("NEC");
    let ViewReport::Eol(eol) = &report else {
        panic!("expected EOL report");
    };
    assert_eq!(eol.rows.len(), 1);
    assert_eq!(report.summary(), Summary::NotOk);
}

#[test]
fn core_pairs_forward_and_reverse_links() {
    let fx = attenuation_fixture();
    let ViewReport::Core(report) = fx.run(View::LossCore) else {
        panic!("expected core report");
    };
    assert_eq!(report.pairs.len(), 2);
    assert_eq!(report.pairs[0].forward, "NEA-1_NEB-1");
    assert_eq!(report.pairs[0].reverse.as_deref(), Some("NEB-1_NEA-1"));
    assert_eq!(report.pairs[0].status, Status::Fail);
    assert_eq!(report.pairs[1].reverse, None);
    assert_eq!(report.pairs[1].status, Status::NoData);
}

// ============================================================================
// WASON
// ============================================================================

#[test]
fn wason_log_from_file() {
    let mut fx = Fixture::new();
    fx.upload(UploadSlot::WasonLog, "wason.log", WASON_LOG);

    let ViewReport::Wason(report) = fx.run(View::Wason) else {
        panic!("expected WASON report");
    };
    assert_eq!(report.blocks, 2);
    assert_eq!(report.excluded, 1);
    assert_eq!(report.passed(), 1);
    assert_eq!(report.summary, Summary::Ok);
}
