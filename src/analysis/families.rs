//! Declarative metric-family records.
//!
//! Each family states which columns it needs, which columns it shows and
//! which rule decides pass/fail. One generic evaluator consumes them.

use super::keys::{MAPPING, ME, MEASURE_OBJECT};
use serde::{Deserialize, Serialize};

pub const BEGIN_TIME: &str = "Begin Time";
pub const END_TIME: &str = "End Time";
pub const SITE_NAME: &str = "Site Name";
pub const MAXIMUM_THRESHOLD: &str = "Maximum threshold";
pub const MINIMUM_THRESHOLD: &str = "Minimum threshold";

pub const CPU_UTILIZATION: &str = "CPU utilization ratio";
pub const FAN_SPEED: &str = "Value of Fan Rotate Speed(Rps)";
pub const LASER_BIAS_CURRENT: &str = "Laser Bias Current(mA)";
pub const OUTPUT_POWER: &str = "Output Optical Power(dBm)";
pub const INPUT_POWER: &str = "Input Optical Power(dBm)";
pub const BER_AFTER_FEC: &str = "BER After FEC";
pub const MAX_OUTPUT_POWER: &str = "Max Output Power(dBm)";
pub const MIN_OUTPUT_POWER: &str = "Min Output Power(dBm)";
pub const MAX_INPUT_POWER: &str = "Max Input Power(dBm)";
pub const MIN_INPUT_POWER: &str = "Min Input Power(dBm)";

/// Metric families with reference-table thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricFamily {
    Cpu,
    Fan,
    Msu,
    Client,
    Line,
}

impl MetricFamily {
    pub const ALL: [Self; 5] = [Self::Cpu, Self::Fan, Self::Msu, Self::Client, Self::Line];

    /// Stem of the reference file name (`CPU.csv`, `FAN.csv`, ...).
    pub fn reference_name(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Fan => "FAN",
            Self::Msu => "MSU",
            Self::Client => "CLIENT",
            Self::Line => "LINE",
        }
    }

    pub fn spec(self) -> &'static FamilySpec {
        match self {
            Self::Cpu => &CPU,
            Self::Fan => &FAN,
            Self::Msu => &MSU,
            Self::Client => &CLIENT,
            Self::Line => &LINE,
        }
    }
}

impl std::fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reference_name())
    }
}

/// A bounded optical power reading: value column plus its reference bounds.
#[derive(Debug, Clone, Copy)]
pub struct PowerBand {
    pub value: &'static str,
    pub max: &'static str,
    pub min: &'static str,
}

/// Pass/fail rule of a family.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// Fail outside [min, max].
    Band {
        value: &'static str,
        max: &'static str,
        min: &'static str,
    },
    /// Fail above max; no lower bound.
    Ceiling { value: &'static str, max: &'static str },
    /// Fail when the object name carries a fan-unit pattern whose cap is exceeded.
    FanCaps { value: &'static str },
    /// Output and input power bands, plus BER > 0 when a BER column is set.
    OpticalPower {
        output: PowerBand,
        input: PowerBand,
        ber: Option<&'static str>,
    },
}

/// Declarative record for one metric family.
#[derive(Debug)]
pub struct FamilySpec {
    pub family: MetricFamily,
    /// Required in the uploaded measurement table.
    pub measurement_columns: &'static [&'static str],
    /// Required in the reference table.
    pub reference_columns: &'static [&'static str],
    /// Output columns; looked up in measurement then reference, absent ones skipped.
    pub display_columns: &'static [&'static str],
    pub rule: Rule,
}

pub static CPU: FamilySpec = FamilySpec {
    family: MetricFamily::Cpu,
    measurement_columns: &[ME, MEASURE_OBJECT, CPU_UTILIZATION],
    reference_columns: &[MAPPING, SITE_NAME, MAXIMUM_THRESHOLD, MINIMUM_THRESHOLD],
    display_columns: &[
        SITE_NAME,
        ME,
        MEASURE_OBJECT,
        MAXIMUM_THRESHOLD,
        MINIMUM_THRESHOLD,
        CPU_UTILIZATION,
    ],
    rule: Rule::Band {
        value: CPU_UTILIZATION,
        max: MAXIMUM_THRESHOLD,
        min: MINIMUM_THRESHOLD,
    },
};

pub static FAN: FamilySpec = FamilySpec {
    family: MetricFamily::Fan,
    measurement_columns: &[ME, MEASURE_OBJECT, BEGIN_TIME, END_TIME, FAN_SPEED],
    reference_columns: &[MAPPING, SITE_NAME],
    display_columns: &[
        BEGIN_TIME,
        END_TIME,
        SITE_NAME,
        ME,
        MEASURE_OBJECT,
        MAXIMUM_THRESHOLD,
        MINIMUM_THRESHOLD,
        FAN_SPEED,
    ],
    rule: Rule::FanCaps { value: FAN_SPEED },
};

pub static MSU: FamilySpec = FamilySpec {
    family: MetricFamily::Msu,
    measurement_columns: &[ME, MEASURE_OBJECT, LASER_BIAS_CURRENT],
    reference_columns: &[MAPPING, MAXIMUM_THRESHOLD],
    display_columns: &[SITE_NAME, ME, MEASURE_OBJECT, MAXIMUM_THRESHOLD, LASER_BIAS_CURRENT],
    rule: Rule::Ceiling {
        value: LASER_BIAS_CURRENT,
        max: MAXIMUM_THRESHOLD,
    },
};

const OUTPUT_BAND: PowerBand = PowerBand {
    value: OUTPUT_POWER,
    max: MAX_OUTPUT_POWER,
    min: MIN_OUTPUT_POWER,
};

const INPUT_BAND: PowerBand = PowerBand {
    value: INPUT_POWER,
    max: MAX_INPUT_POWER,
    min: MIN_INPUT_POWER,
};

pub static CLIENT: FamilySpec = FamilySpec {
    family: MetricFamily::Client,
    measurement_columns: &[ME, MEASURE_OBJECT, OUTPUT_POWER, INPUT_POWER],
    reference_columns: &[
        MAPPING,
        MAX_OUTPUT_POWER,
        MIN_OUTPUT_POWER,
        MAX_INPUT_POWER,
        MIN_INPUT_POWER,
    ],
    display_columns: &[
        BEGIN_TIME,
        END_TIME,
        SITE_NAME,
        ME,
        MEASURE_OBJECT,
        MIN_OUTPUT_POWER,
        MAX_OUTPUT_POWER,
        OUTPUT_POWER,
        MIN_INPUT_POWER,
        MAX_INPUT_POWER,
        INPUT_POWER,
    ],
    rule: Rule::OpticalPower {
        output: OUTPUT_BAND,
        input: INPUT_BAND,
        ber: None,
    },
};

pub static LINE: FamilySpec = FamilySpec {
    family: MetricFamily::Line,
    measurement_columns: &[ME, MEASURE_OBJECT, OUTPUT_POWER, INPUT_POWER, BER_AFTER_FEC],
    reference_columns: &[
        MAPPING,
        MAX_OUTPUT_POWER,
        MIN_OUTPUT_POWER,
        MAX_INPUT_POWER,
        MIN_INPUT_POWER,
    ],
    display_columns: &[
        BEGIN_TIME,
        END_TIME,
        SITE_NAME,
        ME,
        MEASURE_OBJECT,
        MIN_OUTPUT_POWER,
        MAX_OUTPUT_POWER,
        OUTPUT_POWER,
        MIN_INPUT_POWER,
        MAX_INPUT_POWER,
        INPUT_POWER,
        BER_AFTER_FEC,
    ],
    rule: Rule::OpticalPower {
        output: OUTPUT_BAND,
        input: INPUT_BAND,
        ber: Some(BER_AFTER_FEC),
    },
};

/// Speed cap for one fan-unit type, matched by substring of the object name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanCap {
    pub pattern: String,
    pub max_rps: f64,
}

impl FanCap {
    pub fn new(pattern: &str, max_rps: f64) -> Self {
        Self {
            pattern: pattern.to_string(),
            max_rps,
        }
    }
}

/// Built-in fan caps: FCC 120, FCPP 250, FCPL 120, FCPS 230 rps.
pub fn default_fan_caps() -> Vec<FanCap> {
    vec![
        FanCap::new("FCC", 120.0),
        FanCap::new("FCPP", 250.0),
        FanCap::new("FCPL", 120.0),
        FanCap::new("FCPS", 230.0),
    ]
}
