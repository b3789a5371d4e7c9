//! Run configuration shared by the tuning and calibration flows.
//!
//! Defaults live in the `new()` constructors. A JSON file only needs the
//! fields it changes, everything else keeps its default.

mod config;

use std::path::{Path, PathBuf};

pub use crate::config::{CalibrationConfig, Config, GainSet, LinkConfig, TuningConfig};

/// Slowest accepted raw ADC polling rate.
pub const MIN_RATE_HZ: f64 = 0.001;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    pub fn from_json(text: &str) -> Result<Config, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Config::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.tuning;
        if t.fader_index > 9 {
            return Err(ConfigError::Invalid(format!("fader index {} must be a single digit", t.fader_index)));
        }
        if t.repeats == 0 || t.keep_best == 0 {
            return Err(ConfigError::Invalid("repeats and keep_best must be at least 1".into()));
        }
        let c = &self.calibration;
        if c.segments == 0 {
            return Err(ConfigError::Invalid("at least one segment is required".into()));
        }
        if !c.rate_hz.is_finite() || c.rate_hz < MIN_RATE_HZ {
            return Err(ConfigError::Invalid(format!("sample rate {} Hz must be at least {} Hz", c.rate_hz, MIN_RATE_HZ)));
        }
        for (name, secs) in [("move_secs", c.move_secs), ("measure_secs", c.measure_secs)] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::Invalid(format!("{} {} must be a finite, non-negative duration", name, secs)));
            }
        }
        if !(c.k >= 0.0) || !(c.margin_pct >= 0.0) {
            return Err(ConfigError::Invalid("k and margin_pct must not be negative".into()));
        }
        Ok(())
    }
}
