// Calibration module - systemic latency measurement
//
// This module provides two main components:
// 1. CalibrationEngine: Collects taps against audible reference clicks and
//    derives the average offset used to correct later deviations
// 2. CalibrationProgress: Progress reporting for the calibration window
//
// The calibration workflow:
// 1. Session plays silent preparation beats, then N audible clicks
// 2. The first audible click time becomes the reference start
// 3. Every tap is compared with `start + i * beat`; after N taps the
//    result is published and its average becomes the active offset

pub mod engine;
pub mod progress;

pub use engine::{CalibrationEngine, CalibrationResult};
pub use progress::{CalibrationPhase, CalibrationProgress};
