//! Score aggregation
//!
//! [`ScoreAggregator`] is a pure accumulator over classified taps. It keeps
//! the full result log plus the running totals the UI shows during play;
//! post-session analysis lives in [`stats`].

pub mod stats;

pub use stats::{SegmentStats, TimingAdvice, TimingStats};

use serde::{Deserialize, Serialize};

use crate::analysis::{TapResult, TimingCategory};

/// Per-category tap counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub perfect: u32,
    pub good: u32,
    pub early: u32,
    pub late: u32,
    pub missed: u32,
}

impl ScoreBreakdown {
    fn increment(&mut self, category: TimingCategory) {
        match category {
            TimingCategory::Perfect => self.perfect += 1,
            TimingCategory::Good => self.good += 1,
            TimingCategory::Early => self.early += 1,
            TimingCategory::Late => self.late += 1,
            TimingCategory::Missed => self.missed += 1,
        }
    }

    pub fn count(&self, category: TimingCategory) -> u32 {
        match category {
            TimingCategory::Perfect => self.perfect,
            TimingCategory::Good => self.good,
            TimingCategory::Early => self.early,
            TimingCategory::Late => self.late,
            TimingCategory::Missed => self.missed,
        }
    }
}

/// Running score for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreAggregator {
    score: u32,
    total_taps: u32,
    rest_taps: u32,
    out_of_range: u32,
    count_out_of_range: bool,
    breakdown: ScoreBreakdown,
    results: Vec<TapResult>,
}

impl ScoreAggregator {
    /// # Arguments
    /// * `count_out_of_range` - Whether out-of-range taps add to `total_taps`
    pub fn new(count_out_of_range: bool) -> Self {
        Self {
            count_out_of_range,
            ..Self::default()
        }
    }

    /// Append a classified tap.
    ///
    /// Rest taps are logged and counted separately; they never add to the
    /// score or to `total_taps`.
    pub fn apply(&mut self, result: TapResult) {
        self.breakdown.increment(result.category);
        if result.is_rest_tap {
            self.rest_taps += 1;
        } else {
            self.total_taps += 1;
            self.score += result.points();
        }
        self.results.push(result);
    }

    /// Count a tap that matched no beat
    pub fn record_out_of_range(&mut self) {
        self.out_of_range += 1;
        if self.count_out_of_range {
            self.total_taps += 1;
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total_taps(&self) -> u32 {
        self.total_taps
    }

    pub fn rest_taps(&self) -> u32 {
        self.rest_taps
    }

    pub fn out_of_range(&self) -> u32 {
        self.out_of_range
    }

    pub fn breakdown(&self) -> ScoreBreakdown {
        self.breakdown
    }

    pub fn results(&self) -> &[TapResult] {
        &self.results
    }

    /// Accuracy percentage: score / (total taps x 100) x 100
    pub fn accuracy(&self) -> f64 {
        if self.total_taps == 0 {
            return 0.0;
        }
        self.score as f64 / (self.total_taps as f64 * 100.0) * 100.0
    }
}
