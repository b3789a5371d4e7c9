//! PID tuning sweep: every gain set is run several times, the runs are aligned
//! on the reference step and the best ones averaged.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use config::{GainSet, TuningConfig};
use slip::{Command, GainKind};

use crate::app::comms::{Link, Port};
use crate::app::telemetry::{capture_run, Telemetry};

#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub gains: GainSet,
    pub reference: Vec<f64>,
    pub position: Vec<f64>,
    /// RMSE of each averaged repetition, best first
    pub rmse: Vec<f64>,
}

pub fn gain_commands(index: u8, gains: &GainSet) -> [Command; 5] {
    let values = [gains.kp, gains.ki, gains.kd, gains.ts, gains.fc];
    core::array::from_fn(|i| Command::SetGain { index, kind: GainKind::ALL[i], value: values[i] })
}

pub fn run_name(tuning: &TuningConfig, gains: &GainSet) -> String {
    format!("i{}-{}s{}", tuning.fader_index, gains.name(), tuning.speed_divisor)
}

/// Pushes the gains, starts a run and captures it into `data_file`.
pub fn run_once<P: Port>(link: &mut Link<P>, tuning: &TuningConfig, gains: &GainSet, data_file: &Path) -> Result<Vec<Telemetry>> {
    let gap = Duration::from_millis(tuning.command_gap_ms);

    link.purge()?;
    for command in gain_commands(tuning.fader_index, gains) {
        link.send(&command)?;
        sleep(gap);
    }
    // drop an acknowledgement, if the firmware sends one
    link.recv()?;
    link.purge()?;

    link.send(&Command::Start {
        index: tuning.fader_index,
        speed_divisor: tuning.speed_divisor,
    })?;

    let file = File::create(data_file).with_context(|| format!("failed to create {}", data_file.display()))?;
    let mut sink = BufWriter::new(file);
    let samples = capture_run(link, Duration::from_millis(tuning.run_budget_ms), &mut sink)?;
    info!("{} samples -> {}", samples.len(), data_file.display());
    Ok(samples)
}

/// First two numeric columns: reference and position.
pub fn columns(samples: &[Telemetry]) -> (Vec<f64>, Vec<f64>) {
    let mut reference = Vec::new();
    let mut position = Vec::new();
    for fields in samples.iter().filter_map(Telemetry::row) {
        if let (Some(r), Some(p)) = (
            fields.first().and_then(|f| f.as_f64()),
            fields.get(1).and_then(|f| f.as_f64()),
        ) {
            reference.push(r);
            position.push(p);
        }
    }
    (reference, position)
}

/// Index of the first reference step larger than `threshold` times the
/// reference amplitude, 0 if there is none.
pub fn edge_index(reference: &[f64], threshold: f64) -> usize {
    if reference.len() < 3 {
        return 0;
    }
    let max = reference.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = reference.iter().cloned().fold(f64::INFINITY, f64::min);
    let limit = threshold * (max - min + 1e-9);

    reference
        .windows(2)
        .position(|w| (w[1] - w[0]).abs() > limit)
        .unwrap_or(0)
}

pub fn rmse(reference: &[f64], position: &[f64]) -> f64 {
    let n = reference.len().min(position.len());
    if n == 0 {
        return f64::INFINITY;
    }
    let sum: f64 = reference.iter().zip(position).map(|(r, p)| (p - r) * (p - r)).sum();
    (sum / n as f64).sqrt()
}

/// Keeps the `keep` lowest RMSE repetitions, truncates them to a common
/// length and averages them sample by sample.
pub fn average_best(gains: GainSet, repetitions: Vec<(Vec<f64>, Vec<f64>)>, keep: usize) -> Option<SweepResult> {
    let mut scored: Vec<(f64, Vec<f64>, Vec<f64>)> = repetitions
        .into_iter()
        .map(|(r, p)| (rmse(&r, &p), r, p))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.truncate(keep);

    let len = scored.iter().map(|(_, r, p)| r.len().min(p.len())).min()?;
    let count = scored.len() as f64;

    let mut reference = vec![0.0; len];
    let mut position = vec![0.0; len];
    for (_, r, p) in &scored {
        for i in 0..len {
            reference[i] += r[i] / count;
            position[i] += p[i] / count;
        }
    }

    Some(SweepResult {
        gains,
        reference,
        position,
        rmse: scored.iter().map(|(e, _, _)| *e).collect(),
    })
}

pub fn sweep<P: Port>(link: &mut Link<P>, tuning: &TuningConfig, data_dir: &Path) -> Result<Vec<SweepResult>> {
    let mut results = Vec::new();

    for gains in &tuning.gains {
        let name = run_name(tuning, gains);
        info!("==> {}", name);

        let mut repetitions = Vec::new();
        for r in 1..=tuning.repeats {
            let data_file = data_dir.join(format!("data{}_r{}.tsv", name, r));
            let samples = run_once(link, tuning, gains, &data_file)?;

            let (reference, position) = columns(&samples);
            if reference.is_empty() {
                warn!("{}: repetition {} returned no samples, skipping", name, r);
                continue;
            }
            let start = edge_index(&reference, tuning.edge_threshold);
            repetitions.push((reference[start..].to_vec(), position[start..].to_vec()));
        }

        match average_best(*gains, repetitions, tuning.keep_best) {
            Some(result) => {
                info!("{}: averaged {} repetitions, best rmse {:.4}", name, result.rmse.len(), result.rmse[0]);
                results.push(result);
            }
            None => warn!("{}: no usable repetition", name),
        }
    }

    Ok(results)
}
