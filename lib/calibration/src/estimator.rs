//! Robust center and deadzone of a resting fader reading.
//!
//! The center is the mode of the samples, the deadzone is `k` times a MAD
//! based spread measured on the samples clustered around that mode.

use alloc::vec;
use alloc::vec::Vec;

/// Scale turning a MAD into a normal-equivalent standard deviation.
pub const MAD_TO_SIGMA: f64 = 1.4826;
pub const CLIP_COUNTS: i32 = 6;
pub const MIN_INLIERS: usize = 10;
pub const DEFAULT_K: f64 = 3.0;
pub const DEFAULT_MARGIN_PCT: f64 = 0.02;

// histogram sizing for `mode`, wider spans fall back to sorting
const HISTOGRAM_SPAN_FACTOR: u64 = 4;
const HISTOGRAM_MIN_SPAN: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentEstimate {
    pub center: i32,
    pub deadzone: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimator {
    pub k: f64,
    /// Relative margin, 0.02 is +2%.
    pub margin_pct: f64,
    pub clip_counts: i32,
    pub min_inliers: usize,
}

impl Estimator {
    pub fn new(k: f64, margin_pct: f64) -> Estimator {
        Estimator {
            k,
            margin_pct,
            clip_counts: CLIP_COUNTS,
            min_inliers: MIN_INLIERS,
        }
    }

    pub fn estimate(&self, samples: &[i32]) -> SegmentEstimate {
        let center = match mode(samples) {
            Some(center) => center,
            None => return SegmentEstimate::default(),
        };

        let lo = center.saturating_sub(self.clip_counts);
        let hi = center.saturating_add(self.clip_counts);
        let inliers: Vec<f64> = samples
            .iter()
            .filter(|&&v| v >= lo && v <= hi)
            .map(|&v| v as f64)
            .collect();

        let basis = if inliers.len() >= self.min_inliers {
            inliers
        } else {
            samples.iter().map(|&v| v as f64).collect()
        };

        let mad = mad(&basis);
        let spread = if mad > 0.0 { MAD_TO_SIGMA * mad } else { std_dev(&basis) };

        let raw = libm::rint(self.k * spread).max(1.0);
        let deadzone = libm::ceil(raw * (1.0 + self.margin_pct));

        SegmentEstimate {
            center,
            deadzone: deadzone as u32,
        }
    }
}

impl Default for Estimator {
    fn default() -> Estimator {
        Estimator::new(DEFAULT_K, DEFAULT_MARGIN_PCT)
    }
}

/// Returns `(center, deadzone)` for one segment, `(0, 0)` when empty.
pub fn estimate(samples: &[i32], k: f64, margin_pct: f64) -> (i32, u32) {
    let e = Estimator::new(k, margin_pct).estimate(samples);
    (e.center, e.deadzone)
}

/// Most frequent value, the smallest one on ties.
///
/// Uses a histogram shifted by the minimum when the span is small compared
/// to the sample count, a sorted copy otherwise.
fn mode(samples: &[i32]) -> Option<i32> {
    let min = *samples.iter().min()?;
    let max = *samples.iter().max()?;

    let span = (max as i64 - min as i64) as u64 + 1;
    if span > HISTOGRAM_SPAN_FACTOR * samples.len() as u64 + HISTOGRAM_MIN_SPAN {
        return sorted_mode(samples);
    }

    let mut counts = vec![0u32; span as usize];
    for &v in samples {
        counts[(v as i64 - min as i64) as usize] += 1;
    }

    let mut best = 0;
    for (offset, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = offset;
        }
    }
    Some((min as i64 + best as i64) as i32)
}

fn sorted_mode(samples: &[i32]) -> Option<i32> {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();

    let mut best = (*sorted.first()?, 0usize);
    let mut run = best;
    for &v in &sorted {
        if v == run.0 {
            run.1 += 1;
        } else {
            run = (v, 1);
        }
        // strictly greater keeps the smallest value on ties
        if run.1 > best.1 {
            best = run;
        }
    }
    Some(best.0)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn mad(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| libm::fabs(v - m)).collect();
    median(&deviations)
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    libm::sqrt(var)
}
