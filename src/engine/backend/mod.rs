//! Collaborator abstractions for the session core.
//!
//! The state machine never talks to audio, animation or time directly. It
//! goes through these traits so production builds can plug in a real audio
//! backend and `Instant`-based clock while tests use the deterministic stubs.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::AudioError;

/// Element of the UI that should pulse on a tick or tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseTarget {
    BeatIndicator,
    TapButton,
}

/// Plays metronome clicks.
///
/// `is_active_beat = false` asks for the muted rest tone. Implementations are
/// best-effort; an `Err` is counted by the session and never propagated.
pub trait AudioEmitter: Send {
    fn emit(&mut self, is_active_beat: bool, is_accented: bool) -> Result<(), AudioError>;
}

/// Fire-and-forget animation requests.
pub trait AnimationHost: Send {
    fn pulse(&mut self, target: PulseTarget);
}

/// Monotonic millisecond clock.
///
/// Must be cheap and non-blocking: it is read on every tap and tick.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> f64;
}

/// Default clock backed by `Instant::now`, zeroed at construction.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

mod desktop_stub;
pub use desktop_stub::{
    ClickEvent, ManualClock, NullAnimation, NullAudio, RecordingAnimation, RecordingAudio,
};
