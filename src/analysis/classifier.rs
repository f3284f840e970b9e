//! TapClassifier - best-match tap-to-beat assignment
//!
//! Matches each tap to the closest unconsumed beat of the session schedule
//! inside a search window, applies the calibration offset and buckets the
//! corrected deviation into a [`TimingCategory`].
//!
//! The classifier owns the schedule for the whole session: a beat matched
//! once is consumed and can never be claimed by a later tap.

use crate::analysis::{TapOutcome, TapResult, TimingCategory};
use crate::config::TimingConfig;
use crate::level::{Level, Tolerances};
use crate::schedule::BeatSchedule;

pub struct TapClassifier {
    schedule: BeatSchedule,
    tolerances: Tolerances,
    search_window_ms: f64,
    debounce_ms: f64,
    last_tap_ms: Option<f64>,
}

impl TapClassifier {
    pub fn new(
        schedule: BeatSchedule,
        tolerances: Tolerances,
        search_window_ms: f64,
        debounce_ms: f64,
    ) -> Self {
        Self {
            schedule,
            tolerances,
            search_window_ms,
            debounce_ms,
            last_tap_ms: None,
        }
    }

    /// Create a classifier with tolerances and window resolved for `level`
    pub fn for_level(level: &Level, schedule: BeatSchedule, timing: &TimingConfig) -> Self {
        let tolerances = Tolerances::for_level(level, timing);
        let search_window_ms = tolerances.search_window_ms(level, timing);
        Self::new(schedule, tolerances, search_window_ms, timing.debounce_ms)
    }

    pub fn schedule(&self) -> &BeatSchedule {
        &self.schedule
    }

    pub fn tolerances(&self) -> Tolerances {
        self.tolerances
    }

    pub fn search_window_ms(&self) -> f64 {
        self.search_window_ms
    }

    /// Classify a tap.
    ///
    /// # Algorithm
    /// 1. Drop the tap if it follows the previous tap by less than the debounce
    /// 2. Rest taps are recorded as `Missed` without touching the schedule
    /// 3. Find the closest unconsumed beat within the search window
    /// 4. Consume it, subtract the calibration offset from the raw deviation
    /// 5. Bucket |deviation| against the perfect/good tolerances
    ///
    /// # Arguments
    /// * `tap_ms` - Clock time of the tap
    /// * `resting` - Whether the session is inside a rest beat
    /// * `calibration_offset_ms` - Systemic latency subtracted from deviations
    pub fn classify(
        &mut self,
        tap_ms: f64,
        resting: bool,
        calibration_offset_ms: f64,
    ) -> TapOutcome {
        if let Some(last) = self.last_tap_ms {
            if tap_ms - last < self.debounce_ms {
                log::debug!(
                    "[Classifier] Debounced tap at {:.2} ({:.2}ms after previous)",
                    tap_ms,
                    tap_ms - last
                );
                return TapOutcome::Debounced;
            }
        }
        self.last_tap_ms = Some(tap_ms);

        if resting {
            return TapOutcome::Recorded(TapResult::rest_tap(tap_ms));
        }

        if self.schedule.is_empty() {
            return TapOutcome::NoSchedule;
        }

        let Some((index, _)) = self
            .schedule
            .nearest_unconsumed(tap_ms, self.search_window_ms)
        else {
            return TapOutcome::OutOfRange { tap_ms };
        };

        self.schedule.mark_consumed(index);

        let target_ms = self.schedule.beats()[index].time_ms;
        let raw_deviation = tap_ms - target_ms;
        let deviation_ms = raw_deviation - calibration_offset_ms;
        let category = Self::judge(deviation_ms, &self.tolerances);

        log::debug!(
            "[Classifier] beat={} raw={:.2}ms offset={:.2}ms deviation={:.2}ms -> {:?}",
            index,
            raw_deviation,
            calibration_offset_ms,
            deviation_ms,
            category
        );

        TapOutcome::Recorded(TapResult {
            category,
            deviation_ms,
            tap_ms,
            target_ms: Some(target_ms),
            is_rest_tap: false,
            beat_index: Some(index),
        })
    }

    /// Bucket a corrected deviation. Boundaries are inclusive.
    pub fn judge(deviation_ms: f64, tolerances: &Tolerances) -> TimingCategory {
        let magnitude = deviation_ms.abs();
        if magnitude <= tolerances.perfect_ms {
            TimingCategory::Perfect
        } else if magnitude <= tolerances.good_ms {
            TimingCategory::Good
        } else if deviation_ms < 0.0 {
            TimingCategory::Early
        } else {
            TimingCategory::Late
        }
    }
}
