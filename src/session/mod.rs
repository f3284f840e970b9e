//! Session lifecycle: states, tick scheduling, feedback and the state machine
//!
//! ```text
//! Idle --start--> Countdown --2N ticks + 1 beat--> Playing --all segments--> Complete
//!   |                                                                         |
//!   +--toggle--> Metronome --toggle/stop--> Idle          Idle <--reset-- ----+
//!   +--calibrate--> Calibration --N taps or window closed--> Idle  (retry -> Countdown)
//! ```

mod context;
pub mod feedback;
pub mod machine;
pub mod scheduler;

pub use feedback::{Feedback, FeedbackKind};
pub use machine::SessionStateMachine;
pub use scheduler::{PendingTick, TickChain, TickScheduler};

use serde::{Deserialize, Serialize};

use crate::analysis::TapOutcome;
use crate::calibration::{CalibrationProgress, CalibrationResult};
use crate::scoring::ScoreBreakdown;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    /// Free-running metronome, no scoring
    Metronome,
    Countdown,
    Playing,
    Calibration,
    Complete,
}

impl SessionState {
    /// Whether a tick chain may be running in this state
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Complete)
    }
}

/// What happened to a tap handed to the machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapResponse {
    /// Game tap, with the classifier's verdict
    Classified(TapOutcome),
    /// Calibration tap collected; `result` is set on the final tap
    CalibrationTap {
        progress: CalibrationProgress,
        result: Option<CalibrationResult>,
    },
    /// Calibration tap during the silent preparation beats, ignored
    CalibrationPreparing,
}

/// Serializable view of everything the UI renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub level: String,
    pub current_segment: u32,
    pub current_beat: u32,
    pub is_resting: bool,
    pub countdown: u32,
    pub score: u32,
    pub total_taps: u32,
    pub accuracy: f64,
    pub breakdown: ScoreBreakdown,
    pub rest_taps: u32,
    pub out_of_range_taps: u32,
    pub feedback: Option<Feedback>,
    pub calibration_offset_ms: f64,
    pub calibration_result: Option<CalibrationResult>,
    pub calibration_progress: Option<CalibrationProgress>,
    pub session_start_ms: Option<f64>,
    pub next_tick_ms: Option<f64>,
}
