//! Level definitions and presets
//!
//! A level describes the beat grid of a session: how long a beat lasts, how
//! many beats per segment are tapped and rested, how many segments make a set
//! and how long the countdown is. The built-in presets all run at 180 BPM and
//! differ only in subdivision.

use serde::{Deserialize, Serialize};

use crate::config::{TimingConfig, TolerancePolicy};
use crate::error::LevelError;

/// Tempo shared by the built-in presets
pub const PRESET_BPM: f64 = 180.0;

/// Converts BPM and a beat subdivision to a note length in milliseconds.
///
/// Formula: note_length_ms = 60000 / BPM / subdivision
///
/// # Examples
/// ```
/// use rhythm_trainer::level::note_length_ms;
/// assert!((note_length_ms(180.0, 1) - 333.333).abs() < 0.001);
/// assert!((note_length_ms(180.0, 4) - 83.333).abs() < 0.001);
/// ```
#[inline]
pub fn note_length_ms(bpm: f64, subdivision: u32) -> f64 {
    60_000.0 / bpm / subdivision.max(1) as f64
}

/// Immutable beat-grid configuration for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    pub description: String,
    pub beat_ms: f64,
    pub active_beats_per_segment: u32,
    pub rest_beats_per_segment: u32,
    pub segments_per_set: u32,
    pub countdown_beats: u32,
}

impl Level {
    /// Quarter notes: 7 taps + 1 rest, 4 segments, 4-beat countdown
    pub fn quarter() -> Self {
        Self {
            name: "quarter".to_string(),
            description: "4-beat count, then 2 bars x 4 sets of quarter notes".to_string(),
            beat_ms: note_length_ms(PRESET_BPM, 1),
            active_beats_per_segment: 7,
            rest_beats_per_segment: 1,
            segments_per_set: 4,
            countdown_beats: 4,
        }
    }

    /// Eighth notes: 13 taps + 3 rests, 4 segments, 8-beat countdown
    pub fn eighth() -> Self {
        Self {
            name: "eighth".to_string(),
            description: "8-beat count, then 2 bars x 4 sets of eighth notes".to_string(),
            beat_ms: note_length_ms(PRESET_BPM, 2),
            active_beats_per_segment: 13,
            rest_beats_per_segment: 3,
            segments_per_set: 4,
            countdown_beats: 8,
        }
    }

    /// Sixteenth notes: 25 taps + 7 rests, 4 segments, 16-beat countdown
    pub fn sixteenth() -> Self {
        Self {
            name: "sixteenth".to_string(),
            description: "16-beat count, then 2 bars x 4 sets of sixteenth notes".to_string(),
            beat_ms: note_length_ms(PRESET_BPM, 4),
            active_beats_per_segment: 25,
            rest_beats_per_segment: 7,
            segments_per_set: 4,
            countdown_beats: 16,
        }
    }

    pub fn presets() -> Vec<Level> {
        vec![Self::quarter(), Self::eighth(), Self::sixteenth()]
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Result<Level, LevelError> {
        Self::presets()
            .into_iter()
            .find(|level| level.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| LevelError::UnknownPreset {
                name: name.to_string(),
            })
    }

    /// Check the level invariants
    ///
    /// Counts are unsigned so only the beat duration and the presence of at
    /// least one tappable beat need checking.
    pub fn validate(&self) -> Result<(), LevelError> {
        if !self.beat_ms.is_finite() || self.beat_ms <= 0.0 {
            return Err(LevelError::InvalidBeatDuration {
                beat_ms: self.beat_ms,
            });
        }
        if self.active_beats_per_segment == 0 || self.segments_per_set == 0 {
            return Err(LevelError::NoActiveBeats);
        }
        Ok(())
    }

    pub fn beats_per_segment(&self) -> u32 {
        self.active_beats_per_segment + self.rest_beats_per_segment
    }

    pub fn total_active_beats(&self) -> usize {
        self.segments_per_set as usize * self.active_beats_per_segment as usize
    }

    pub fn total_beats(&self) -> usize {
        self.segments_per_set as usize * self.beats_per_segment() as usize
    }

    pub fn bpm(&self) -> f64 {
        60_000.0 / self.beat_ms
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::quarter()
    }
}

/// Judgement tolerances resolved for one level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    pub perfect_ms: f64,
    pub good_ms: f64,
}

impl Tolerances {
    /// Resolve tolerances for a level under the configured policy.
    ///
    /// The scaled policy widens tolerances by 10% per halving of the beat
    /// relative to `reference_beat_ms`, never narrowing them.
    pub fn for_level(level: &Level, timing: &TimingConfig) -> Self {
        let factor = match timing.tolerance_policy {
            TolerancePolicy::Fixed => 1.0,
            TolerancePolicy::ScaledByBeatDuration => {
                let halvings = (timing.reference_beat_ms / level.beat_ms).log2();
                (1.0 + 0.1 * halvings).max(1.0)
            }
        };

        Self {
            perfect_ms: timing.perfect_tolerance_ms * factor,
            good_ms: timing.good_tolerance_ms * factor,
        }
    }

    /// Width of the window searched for a matching beat
    pub fn search_window_ms(&self, level: &Level, timing: &TimingConfig) -> f64 {
        (level.beat_ms * timing.search_window_beat_fraction)
            .max(self.good_ms * timing.search_window_good_multiplier)
    }
}
