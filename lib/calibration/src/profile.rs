use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::estimator::{Estimator, SegmentEstimate};

/// Raw ADC domain is `0..ADC_DOMAIN`.
pub const ADC_DOMAIN: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("a profile needs at least one segment")]
    NoSegments,
    #[error("expected {expected} segments, got {got}")]
    SegmentCount { expected: usize, got: usize },
}

/// `segments + 1` edges splitting `0..domain` into equal width bands,
/// `edges[i] = floor(i * domain / segments)`.
pub fn segment_edges(segments: usize, domain: u32) -> Result<Vec<u32>, ProfileError> {
    if segments == 0 {
        return Err(ProfileError::NoSegments);
    }
    Ok((0..=segments)
        .map(|i| (i as u64 * domain as u64 / segments as u64) as u32)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub segments: usize,
    pub edges: Vec<u32>,
    pub centers: Vec<i32>,
    pub deadzones: Vec<u32>,
    pub k: f64,
    pub margin_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEntry {
    pub segment: usize,
    pub center: i32,
    pub deadzone: u32,
}

impl CalibrationProfile {
    /// Segment whose `[lo, hi)` band contains `raw`.
    pub fn lookup(&self, raw: u32) -> Option<SegmentEntry> {
        let segment = self.edges.windows(2).position(|w| raw >= w[0] && raw < w[1])?;
        Some(SegmentEntry {
            segment,
            center: self.centers[segment],
            deadzone: self.deadzones[segment],
        })
    }

    /// Lookup tables as a C++ header for the firmware.
    pub fn to_c_header(&self, banner: &str) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = writeln!(out, "// {}", banner);
        let _ = writeln!(out);
        let _ = writeln!(out, "constexpr int FADER_SEGMENTS = {};", self.segments);
        let _ = writeln!(out, "constexpr int FADER_EDGES[FADER_SEGMENTS+1] = {{{}}};", join(&self.edges));
        let _ = writeln!(out);
        let _ = writeln!(out, "constexpr int FADER_CENTER_LUT[FADER_SEGMENTS] = {{{}}};", join(&self.centers));
        let _ = writeln!(out);
        let _ = writeln!(out, "constexpr int FADER_DEADZONE_LUT[FADER_SEGMENTS] = {{{}}};", join(&self.deadzones));
        out
    }
}

fn join<T: core::fmt::Display>(values: &[T]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}", v);
    }
    out
}

/// Collects one estimate per segment, in segment order.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    estimator: Estimator,
    edges: Vec<u32>,
    estimates: Vec<SegmentEstimate>,
}

impl ProfileBuilder {
    pub fn new(segments: usize, estimator: Estimator) -> Result<ProfileBuilder, ProfileError> {
        Ok(ProfileBuilder {
            estimator,
            edges: segment_edges(segments, ADC_DOMAIN)?,
            estimates: Vec::with_capacity(segments),
        })
    }

    pub fn segments(&self) -> usize {
        self.edges.len() - 1
    }

    /// `[lo, hi)` of segment `i`.
    pub fn bounds(&self, i: usize) -> Option<(u32, u32)> {
        Some((*self.edges.get(i)?, *self.edges.get(i + 1)?))
    }

    /// Estimates the next segment. An empty set gives `(0, 0)`; check
    /// `samples.is_empty()` to warn about it.
    pub fn update(&mut self, samples: &[i32]) -> SegmentEstimate {
        let estimate = self.estimator.estimate(samples);
        self.estimates.push(estimate);
        estimate
    }

    pub fn build(self) -> Result<CalibrationProfile, ProfileError> {
        let expected = self.segments();
        if self.estimates.len() != expected {
            return Err(ProfileError::SegmentCount { expected, got: self.estimates.len() });
        }
        Ok(CalibrationProfile {
            segments: expected,
            edges: self.edges,
            centers: self.estimates.iter().map(|e| e.center).collect(),
            deadzones: self.estimates.iter().map(|e| e.deadzone).collect(),
            k: self.estimator.k,
            margin_pct: self.estimator.margin_pct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges() {
        assert_eq!(segment_edges(4, 4096).unwrap(), vec![0, 1024, 2048, 3072, 4096]);
        let e = segment_edges(3, 4096).unwrap();
        assert_eq!(e, vec![0, 1365, 2730, 4096]);
        let e = segment_edges(16, ADC_DOMAIN).unwrap();
        assert_eq!(e.len(), 17);
        assert_eq!(e[1], 256);
        assert_eq!(segment_edges(0, 4096), Err(ProfileError::NoSegments));
    }

    fn two_segment_profile() -> CalibrationProfile {
        let mut builder = ProfileBuilder::new(2, Estimator::new(3.0, 0.0)).unwrap();
        assert_eq!(builder.bounds(1), Some((2048, 4096)));
        assert_eq!(builder.bounds(2), None);
        builder.update(&[1000; 12]);
        let empty = builder.update(&[]);
        assert_eq!(empty, SegmentEstimate { center: 0, deadzone: 0 });
        builder.build().unwrap()
    }

    #[test]
    fn test_build() {
        let profile = two_segment_profile();
        assert_eq!(profile.segments, 2);
        assert_eq!(profile.edges, vec![0, 2048, 4096]);
        assert_eq!(profile.centers, vec![1000, 0]);
        assert_eq!(profile.deadzones, vec![1, 0]);
        assert_eq!(profile.k, 3.0);
    }

    #[test]
    fn test_build_incomplete() {
        let mut builder = ProfileBuilder::new(3, Estimator::default()).unwrap();
        builder.update(&[5; 20]);
        assert_eq!(
            builder.build(),
            Err(ProfileError::SegmentCount { expected: 3, got: 1 })
        );
    }

    #[test]
    fn test_lookup() {
        let profile = two_segment_profile();
        assert_eq!(profile.lookup(0).map(|e| e.segment), Some(0));
        assert_eq!(profile.lookup(2047).map(|e| e.center), Some(1000));
        assert_eq!(profile.lookup(2048).map(|e| e.segment), Some(1));
        assert_eq!(profile.lookup(4095).map(|e| e.segment), Some(1));
        assert_eq!(profile.lookup(4096), None);
    }

    #[test]
    fn test_header() {
        let header = two_segment_profile().to_c_header("generated");
        assert!(header.starts_with("// generated\n"));
        assert!(header.contains("constexpr int FADER_SEGMENTS = 2;\n"));
        assert!(header.contains("FADER_EDGES[FADER_SEGMENTS+1] = {0,2048,4096};"));
        assert!(header.contains("FADER_CENTER_LUT[FADER_SEGMENTS] = {1000,0};"));
        assert!(header.contains("FADER_DEADZONE_LUT[FADER_SEGMENTS] = {1,0};"));
    }
}
