//! Segmented ADC calibration.
//!
//! The operator moves the fader into each segment while the cue is on, then
//! holds it still while raw readings are sampled. Each segment is reduced to
//! a center and a deadzone.

use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use calibration::{CalibrationProfile, Estimator, ProfileBuilder, SegmentEstimate};
use config::CalibrationConfig;

use crate::app::comms::{Link, Port};
use crate::app::report::ResultSink;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRun {
    pub index: usize,
    pub bounds: (u32, u32),
    /// (seconds since the measurement started, raw count)
    pub rows: Vec<(f64, u16)>,
    pub estimate: SegmentEstimate,
}

impl SegmentRun {
    pub fn values(&self) -> Vec<i32> {
        self.rows.iter().map(|&(_, v)| v as i32).collect()
    }
}

/// Polls the raw ADC `round(measure_secs * rate_hz)` times, one poll per
/// sample period. Unanswered polls are skipped.
pub fn acquire<P: Port>(link: &mut Link<P>, measure_secs: f64, rate_hz: f64) -> Result<Vec<(f64, u16)>> {
    let period = Duration::try_from_secs_f64(1.0 / rate_hz)
        .with_context(|| format!("bad sample rate {} Hz", rate_hz))?;
    let polls = (measure_secs * rate_hz).round().max(0.0) as usize;
    let start = Instant::now();

    let mut rows = Vec::with_capacity(polls);
    for _ in 0..polls {
        if let Some(value) = link.read_raw_adc()? {
            let t = start.elapsed().as_secs_f64();
            debug!("{:6.3}\t{}", t, value);
            rows.push((t, value));
        }
        sleep(period);
    }
    Ok(rows)
}

pub fn calibrate<P: Port, S: ResultSink>(link: &mut Link<P>, cfg: &CalibrationConfig, sink: &mut S) -> Result<CalibrationProfile> {
    let mut builder = ProfileBuilder::new(cfg.segments, Estimator::new(cfg.k, cfg.margin_pct))?;
    let move_window = Duration::try_from_secs_f64(cfg.move_secs)
        .with_context(|| format!("bad move window {}s", cfg.move_secs))?;

    for index in 0..builder.segments() {
        let bounds = builder.bounds(index).unwrap_or_default();
        info!("=== segment {}/{} [{}..{}) ===", index + 1, builder.segments(), bounds.0, bounds.1);

        link.cue(true)?;
        info!("move now ({:.1}s)", cfg.move_secs);
        sleep(move_window);
        link.cue(false)?;
        info!("hold still, measuring");

        let mut run = SegmentRun {
            index,
            bounds,
            rows: acquire(link, cfg.measure_secs, cfg.rate_hz)?,
            estimate: SegmentEstimate::default(),
        };
        if run.rows.is_empty() {
            warn!("segment {} has no valid readings", index);
        }
        run.estimate = builder.update(&run.values());
        info!("segment {}: center {} deadzone {}", index, run.estimate.center, run.estimate.deadzone);

        sink.segment(&run)?;
    }

    let profile = builder.build()?;
    sink.profile(&profile)?;
    Ok(profile)
}
