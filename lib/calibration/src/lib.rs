#![no_std]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

extern crate alloc;

pub mod estimator;
pub mod profile;

pub use estimator::{estimate, Estimator, SegmentEstimate};
pub use profile::{segment_edges, CalibrationProfile, ProfileBuilder, ProfileError, SegmentEntry, ADC_DOMAIN};
