//! Configuration management for timing and session parameters
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling tolerance and calibration tuning without recompilation. Every
//! section has a `Default` holding the canonical constants, and a missing
//! or malformed file falls back to those defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// How judgement tolerances relate to the level's beat duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TolerancePolicy {
    /// Same absolute tolerances for every level
    Fixed,
    /// Tolerances widened for beats shorter than the reference beat
    ScaledByBeatDuration,
}

/// Tap judgement parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Maximum |deviation| for a perfect tap (ms)
    pub perfect_tolerance_ms: f64,
    /// Maximum |deviation| for a good tap (ms)
    pub good_tolerance_ms: f64,
    pub tolerance_policy: TolerancePolicy,
    /// Beat duration that receives no widening under the scaled policy (ms)
    pub reference_beat_ms: f64,
    /// Search window as a fraction of the beat duration
    pub search_window_beat_fraction: f64,
    /// Search window as a multiple of the good tolerance
    pub search_window_good_multiplier: f64,
    /// Taps closer than this to the previous tap are dropped (ms)
    pub debounce_ms: f64,
    /// Whether out-of-range taps count toward total taps
    pub count_out_of_range_taps: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            perfect_tolerance_ms: 25.0,
            good_tolerance_ms: 50.0,
            tolerance_policy: TolerancePolicy::Fixed,
            reference_beat_ms: 60_000.0 / 180.0,
            search_window_beat_fraction: 0.8,
            search_window_good_multiplier: 1.5,
            debounce_ms: 30.0,
            count_out_of_range_taps: false,
        }
    }
}

/// Latency calibration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Number of taps collected per calibration run
    pub tap_count: usize,
    /// Silent beats before the first audible calibration click
    pub preparation_beats: u32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            tap_count: 8,
            preparation_beats: 4,
        }
    }
}

/// Session lifecycle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Consecutive click failures tolerated before the session is ended
    pub max_audio_failures: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_audio_failures: 10,
        }
    }
}

/// How long each kind of feedback message stays visible (ms)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub judgement_ms: f64,
    pub rest_tap_ms: f64,
    pub out_of_range_ms: f64,
    pub calibration_prep_ms: f64,
    pub calibration_outcome_ms: f64,
    pub audio_error_ms: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            judgement_ms: 1500.0,
            rest_tap_ms: 1000.0,
            out_of_range_ms: 1000.0,
            calibration_prep_ms: 2000.0,
            calibration_outcome_ms: 3000.0,
            audio_error_ms: 3000.0,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file doesn't exist
    /// or the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the conventional assets location
    pub fn load() -> Self {
        Self::load_from_file("assets/rhythm_config.json")
    }
}
