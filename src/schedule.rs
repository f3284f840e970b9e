//! Beat schedule generation
//!
//! Expands a [`Level`] into the absolute timestamps a player is expected to
//! tap, plus the full active/rest pattern used for display. Every timestamp is
//! computed as `start + beat_index * beat_ms` (beat index counting rest beats
//! too), the same expression the session uses for its tick wake times, so a
//! tick and the beat it announces compare equal bit for bit.

use serde::{Deserialize, Serialize};

use crate::level::Level;

/// Absolute time of the `index`-th beat after `origin_ms`.
#[inline]
pub fn beat_time_ms(origin_ms: f64, beat_ms: f64, index: u64) -> f64 {
    origin_ms + index as f64 * beat_ms
}

/// Whether a slot in the full pattern is tapped or rested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatKind {
    Active,
    Rest,
}

/// One tap-eligible beat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledBeat {
    pub time_ms: f64,
    /// Zero-based segment this beat belongs to
    pub segment: u32,
    /// Zero-based position among the segment's active beats
    pub beat_in_segment: u32,
    consumed: bool,
}

impl ScheduledBeat {
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}

/// Ordered expected tap times for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatSchedule {
    start_ms: f64,
    beat_ms: f64,
    beats: Vec<ScheduledBeat>,
    pattern: Vec<BeatKind>,
}

impl BeatSchedule {
    /// An empty schedule; classifying against it is a no-op
    pub fn empty() -> Self {
        Self {
            start_ms: 0.0,
            beat_ms: 0.0,
            beats: Vec::new(),
            pattern: Vec::new(),
        }
    }

    pub fn start_ms(&self) -> f64 {
        self.start_ms
    }

    pub fn beat_ms(&self) -> f64 {
        self.beat_ms
    }

    pub fn beats(&self) -> &[ScheduledBeat] {
        &self.beats
    }

    /// Active-beat timestamps in order
    pub fn timestamps(&self) -> Vec<f64> {
        self.beats.iter().map(|beat| beat.time_ms).collect()
    }

    /// Full active/rest pattern, one entry per beat slot
    pub fn pattern(&self) -> &[BeatKind] {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// End of the last beat slot (rests included)
    pub fn end_ms(&self) -> f64 {
        beat_time_ms(self.start_ms, self.beat_ms, self.pattern.len() as u64)
    }

    pub fn consumed_count(&self) -> usize {
        self.beats.iter().filter(|beat| beat.consumed).count()
    }

    /// Find the unconsumed beat closest to `time_ms` within `window_ms`.
    ///
    /// Only a strictly smaller distance replaces the current best, so ties
    /// go to the earliest index.
    pub fn nearest_unconsumed(&self, time_ms: f64, window_ms: f64) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (index, beat) in self.beats.iter().enumerate() {
            if beat.consumed {
                continue;
            }
            let distance = (time_ms - beat.time_ms).abs();
            if distance > window_ms {
                continue;
            }
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((index, distance)),
            }
        }

        best
    }

    /// Mark a beat as claimed by a tap. Returns false if it was already taken.
    pub(crate) fn mark_consumed(&mut self, index: usize) -> bool {
        match self.beats.get_mut(index) {
            Some(beat) if !beat.consumed => {
                beat.consumed = true;
                true
            }
            _ => false,
        }
    }
}

/// Builds [`BeatSchedule`]s from levels
pub struct ScheduleBuilder;

impl ScheduleBuilder {
    /// Expand `level` into a schedule starting at `start_ms`.
    ///
    /// For each segment, `active_beats_per_segment` timestamps are emitted one
    /// beat apart, then the cursor skips `rest_beats_per_segment` beats.
    pub fn build(level: &Level, start_ms: f64) -> BeatSchedule {
        let mut beats = Vec::with_capacity(level.total_active_beats());
        let mut pattern = Vec::with_capacity(level.total_beats());
        let mut cursor: u64 = 0;

        for segment in 0..level.segments_per_set {
            for beat_in_segment in 0..level.active_beats_per_segment {
                beats.push(ScheduledBeat {
                    time_ms: beat_time_ms(start_ms, level.beat_ms, cursor),
                    segment,
                    beat_in_segment,
                    consumed: false,
                });
                pattern.push(BeatKind::Active);
                cursor += 1;
            }
            for _ in 0..level.rest_beats_per_segment {
                pattern.push(BeatKind::Rest);
                cursor += 1;
            }
        }

        log::debug!(
            "[Schedule] Built {} active beats over {} slots from t0={:.2}",
            beats.len(),
            pattern.len(),
            start_ms
        );

        BeatSchedule {
            start_ms,
            beat_ms: level.beat_ms,
            beats,
            pattern,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(beat_ms: f64, active: u32, rest: u32, segments: u32) -> Level {
        Level {
            name: "test".to_string(),
            description: String::new(),
            beat_ms,
            active_beats_per_segment: active,
            rest_beats_per_segment: rest,
            segments_per_set: segments,
            countdown_beats: 4,
        }
    }

    #[test]
    fn test_lengths_for_all_presets() {
        for level in Level::presets() {
            let schedule = ScheduleBuilder::build(&level, 1000.0);
            assert_eq!(
                schedule.len(),
                level.segments_per_set as usize * level.active_beats_per_segment as usize
            );
            assert_eq!(schedule.pattern().len(), level.total_beats());
        }
    }

    #[test]
    fn test_timestamps_strictly_increasing_with_rest_gaps() {
        for level in Level::presets() {
            let schedule = ScheduleBuilder::build(&level, 250.0);
            let beats = schedule.beats();

            for pair in beats.windows(2) {
                let gap = pair[1].time_ms - pair[0].time_ms;
                assert!(gap > 0.0);
                let expected = if pair[1].segment == pair[0].segment {
                    level.beat_ms
                } else {
                    (level.rest_beats_per_segment + 1) as f64 * level.beat_ms
                };
                assert!(
                    (gap - expected).abs() < 1e-6,
                    "{}: gap {} expected {}",
                    level.name,
                    gap,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_pattern_marks_rest_slots() {
        let schedule = ScheduleBuilder::build(&level(100.0, 3, 2, 2), 0.0);
        use BeatKind::{Active as A, Rest as R};
        assert_eq!(schedule.pattern(), &[A, A, A, R, R, A, A, A, R, R]);
        assert_eq!(
            schedule.timestamps(),
            vec![0.0, 100.0, 200.0, 500.0, 600.0, 700.0]
        );
        assert_eq!(schedule.end_ms(), 1000.0);
    }

    #[test]
    fn test_zero_rest_level_is_contiguous() {
        let schedule = ScheduleBuilder::build(&level(100.0, 2, 0, 3), 50.0);
        assert_eq!(
            schedule.timestamps(),
            vec![50.0, 150.0, 250.0, 350.0, 450.0, 550.0]
        );
        assert!(schedule.pattern().iter().all(|kind| *kind == BeatKind::Active));
    }

    #[test]
    fn test_segment_metadata() {
        let schedule = ScheduleBuilder::build(&Level::quarter(), 0.0);
        let eighth_beat = schedule.beats()[7];
        assert_eq!(eighth_beat.segment, 1);
        assert_eq!(eighth_beat.beat_in_segment, 0);
        assert_eq!(eighth_beat.time_ms, beat_time_ms(0.0, Level::quarter().beat_ms, 8));
    }

    #[test]
    fn test_nearest_unconsumed_prefers_closest_then_earliest() {
        let mut schedule = ScheduleBuilder::build(&level(100.0, 4, 0, 1), 0.0);

        assert_eq!(schedule.nearest_unconsumed(130.0, 80.0), Some((1, 30.0)));
        // Equidistant between beats 1 and 2: earliest wins
        assert_eq!(schedule.nearest_unconsumed(150.0, 80.0).map(|m| m.0), Some(1));

        assert!(schedule.mark_consumed(1));
        assert!(!schedule.mark_consumed(1));
        assert_eq!(schedule.nearest_unconsumed(130.0, 80.0), Some((2, 70.0)));
        assert_eq!(schedule.nearest_unconsumed(130.0, 50.0), None);
        assert_eq!(schedule.consumed_count(), 1);
    }

    #[test]
    fn test_empty_schedule() {
        let schedule = BeatSchedule::empty();
        assert!(schedule.is_empty());
        assert_eq!(schedule.nearest_unconsumed(0.0, 1000.0), None);
    }
}
