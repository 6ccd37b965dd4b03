//! Detectors & Validators (C2): the library of `dom → []hit` functions
//! and the `value → {valid, reason?}` checks that gate every value
//! before it enters a result.

pub mod detectors;
pub mod validators;

pub use detectors::{all_detector_names, run, DetectorHit};
