use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub link: LinkConfig,
    pub tuning: TuningConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// `None` autodetects the controller
    pub port: Option<String>,
    pub timeout_ms: u64,
    /// RP2040 vendor id, preferred when autodetecting
    pub preferred_vid: u16,
}

/// One PID tuning to try, sent as the p, i, d, t and c commands.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GainSet {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub ts: f32, // sample time in seconds
    pub fc: f32, // filter cutoff in Hz
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TuningConfig {
    pub baud_rate: u32,
    pub fader_index: u8,
    pub gains: Vec<GainSet>,
    pub speed_divisor: f32,
    pub repeats: usize,
    /// lowest RMSE repetitions averaged per gain set
    pub keep_best: usize,
    pub command_gap_ms: u64,
    /// wall clock cap on a single run
    pub run_budget_ms: u64,
    /// reference step size, relative to its amplitude, marking the start of a run
    pub edge_threshold: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CalibrationConfig {
    pub baud_rate: u32,
    pub segments: usize,
    pub measure_secs: f64,
    pub move_secs: f64,
    pub rate_hz: f64,
    pub k: f64,
    pub margin_pct: f64, // 0.02 is +2%
}

impl Config {
    pub fn new() -> Self {
        Config {
            link: LinkConfig::new(),
            tuning: TuningConfig::new(),
            calibration: CalibrationConfig::new(),
        }
    }
}

impl LinkConfig {
    pub fn new() -> Self {
        LinkConfig {
            port: None,
            timeout_ms: 500,
            preferred_vid: 0x2E8A,
        }
    }
}

impl GainSet {
    pub fn new(kp: f32, ki: f32, kd: f32, ts: f32, fc: f32) -> Self {
        GainSet { kp, ki, kd, ts, fc }
    }

    /// Compact name used in data file names.
    pub fn name(&self) -> String {
        format!("p{}i{}d{}t{}c{}", self.kp, self.ki, self.kd, self.ts, self.fc)
    }
}

impl TuningConfig {
    pub fn new() -> Self {
        TuningConfig {
            baud_rate: 1_000_000,
            fader_index: 1,
            gains: vec![
                GainSet::new(6.0, 2.0, 0.035, 0.001, 60.0),
                GainSet::new(6.0, 8.0, 0.035, 0.001, 60.0),
                GainSet::new(6.0, 64.0, 0.035, 0.001, 60.0),
                GainSet::new(6.0, 256.0, 0.035, 0.001, 60.0),
            ],
            speed_divisor: 8.0,
            repeats: 5,
            keep_best: 4,
            command_gap_ms: 10,
            run_budget_ms: 30_000,
            edge_threshold: 0.02,
        }
    }
}

impl CalibrationConfig {
    pub fn new() -> Self {
        CalibrationConfig {
            baud_rate: 115_200,
            segments: 16,
            measure_secs: 10.0,
            move_secs: 3.0,
            rate_hz: 50.0,
            k: 3.0,
            margin_pct: 0.02,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig::new()
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        TuningConfig::new()
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig::new()
    }
}
