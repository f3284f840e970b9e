// Audio emitter error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants shared with the UI shell
///
/// Error code range: 3001-3002
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// The audio backend is not available (context closed, device lost)
    pub const BACKEND_UNAVAILABLE: i32 = 3001;

    /// Consecutive failures crossed the configured threshold
    pub const FAILURE_THRESHOLD: i32 = 3002;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioEmitter, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors reported by an [`AudioEmitter`](crate::engine::AudioEmitter)
///
/// These are counted by the session and never propagated out of a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Backend not available
    BackendUnavailable,

    /// Too many consecutive failures
    FailureThreshold { failures: u32 },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::BackendUnavailable => AudioErrorCodes::BACKEND_UNAVAILABLE,
            AudioError::FailureThreshold { .. } => AudioErrorCodes::FAILURE_THRESHOLD,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::BackendUnavailable => "Audio backend unavailable".to_string(),
            AudioError::FailureThreshold { failures } => {
                format!("Audio failed {} times in a row", failures)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}
