//! Tap analysis - timing judgement types and the tap classifier
//!
//! A tap goes through [`TapClassifier::classify`], which either records a
//! [`TapResult`] (scored or rest tap) or reports why nothing was recorded.

pub mod classifier;


pub use classifier::TapClassifier;

use serde::{Deserialize, Serialize};

/// Timing category for one tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingCategory {
    /// |deviation| within the perfect tolerance
    Perfect,
    /// |deviation| within the good tolerance
    Good,
    /// Outside tolerance, before the beat
    Early,
    /// Outside tolerance, after the beat
    Late,
    /// Tap landed on a rest beat
    Missed,
}

impl TimingCategory {
    pub fn points(&self) -> u32 {
        match self {
            TimingCategory::Perfect => 100,
            TimingCategory::Good => 50,
            TimingCategory::Early | TimingCategory::Late | TimingCategory::Missed => 0,
        }
    }

    /// Perfect or good
    pub fn is_hit(&self) -> bool {
        matches!(self, TimingCategory::Perfect | TimingCategory::Good)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TimingCategory::Perfect => "PERFECT",
            TimingCategory::Good => "GOOD",
            TimingCategory::Early => "EARLY",
            TimingCategory::Late => "LATE",
            TimingCategory::Missed => "MISSED",
        }
    }
}

/// Outcome of classifying one tap. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapResult {
    pub category: TimingCategory,
    /// Signed deviation after calibration correction
    /// - Positive values indicate late (after beat)
    /// - Negative values indicate early (before beat)
    pub deviation_ms: f64,
    /// When the tap arrived
    pub tap_ms: f64,
    /// Matched beat time; `None` for rest taps
    pub target_ms: Option<f64>,
    pub is_rest_tap: bool,
    /// Index into the active-beat schedule
    pub beat_index: Option<usize>,
}

impl TapResult {
    pub fn points(&self) -> u32 {
        self.category.points()
    }

    pub(crate) fn rest_tap(tap_ms: f64) -> Self {
        Self {
            category: TimingCategory::Missed,
            deviation_ms: 0.0,
            tap_ms,
            target_ms: None,
            is_rest_tap: true,
            beat_index: None,
        }
    }
}

/// What the classifier did with a tap
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
    /// A result was produced and should be appended to the log
    Recorded(TapResult),
    /// No unconsumed beat inside the search window; tap discarded
    OutOfRange { tap_ms: f64 },
    /// Dropped as a duplicate of the previous tap
    Debounced,
    /// Nothing to match against
    NoSchedule,
}
