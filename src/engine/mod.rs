//! Engine module housing the session driver.
//!
//! This module exposes trait-based collaborators (`backend`) and the
//! `TrainerHandle` orchestration layer (`core`) that runs the session state
//! machine on a real timer for CLI and UI entry points.

pub mod backend;
pub mod core;

pub use backend::{
    AnimationHost, AudioEmitter, Clock, ManualClock, NullAnimation, NullAudio, PulseTarget,
    RecordingAnimation, RecordingAudio, SystemClock,
};
pub use self::core::TrainerHandle;
