//! Per-session state owned by the state machine

use crate::analysis::TapClassifier;
use crate::calibration::CalibrationPhase;
use crate::schedule::BeatSchedule;
use crate::scoring::ScoreAggregator;
use crate::session::SessionState;

/// Everything that belongs to the session currently being played or prepared.
///
/// Replaced wholesale when a new game starts; calibration and metronome
/// chains only touch the position fields.
#[derive(Default)]
pub struct SessionContext {
    pub(super) state: SessionState,
    pub(super) classifier: Option<TapClassifier>,
    pub(super) score: ScoreAggregator,
    pub(super) session_start_ms: Option<f64>,
    /// Zero-based segment of the last played tick
    pub(super) current_segment: u32,
    /// One-based position inside the active or rest block
    pub(super) current_beat: u32,
    pub(super) is_resting: bool,
    /// Beats remaining in the countdown or calibration window
    pub(super) countdown: u32,
    pub(super) calibration_phase: Option<CalibrationPhase>,
    pub(super) audio_failures: u32,
}

impl SessionContext {
    /// Fresh context for a game starting at `start_ms`
    pub(super) fn for_game(
        classifier: TapClassifier,
        count_out_of_range: bool,
        start_ms: f64,
    ) -> Self {
        Self {
            state: SessionState::Playing,
            classifier: Some(classifier),
            score: ScoreAggregator::new(count_out_of_range),
            session_start_ms: Some(start_ms),
            ..Self::default()
        }
    }

    pub(super) fn schedule(&self) -> Option<&BeatSchedule> {
        self.classifier.as_ref().map(|classifier| classifier.schedule())
    }

    /// Clear the position fields shown while a chain runs
    pub(super) fn clear_position(&mut self) {
        self.current_segment = 0;
        self.current_beat = 0;
        self.is_resting = false;
        self.countdown = 0;
        self.calibration_phase = None;
    }
}
