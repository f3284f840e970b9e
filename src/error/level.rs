// Level validation errors

use crate::error::ErrorCode;
use std::fmt;

/// Level error code constants shared with the UI shell
///
/// Error code range: 4001-4003
pub struct LevelErrorCodes {}

impl LevelErrorCodes {
    /// Beat duration is zero, negative or not finite
    pub const INVALID_BEAT_DURATION: i32 = 4001;

    /// Level has no active beats to tap
    pub const NO_ACTIVE_BEATS: i32 = 4002;

    /// Unknown preset name
    pub const UNKNOWN_PRESET: i32 = 4003;
}

/// Errors raised while validating or resolving a [`Level`](crate::level::Level)
#[derive(Debug, Clone, PartialEq)]
pub enum LevelError {
    InvalidBeatDuration { beat_ms: f64 },
    NoActiveBeats,
    UnknownPreset { name: String },
}

impl ErrorCode for LevelError {
    fn code(&self) -> i32 {
        match self {
            LevelError::InvalidBeatDuration { .. } => LevelErrorCodes::INVALID_BEAT_DURATION,
            LevelError::NoActiveBeats => LevelErrorCodes::NO_ACTIVE_BEATS,
            LevelError::UnknownPreset { .. } => LevelErrorCodes::UNKNOWN_PRESET,
        }
    }

    fn message(&self) -> String {
        match self {
            LevelError::InvalidBeatDuration { beat_ms } => {
                format!("Beat duration must be positive and finite (got {})", beat_ms)
            }
            LevelError::NoActiveBeats => {
                "Level must have at least one active beat in one segment".to_string()
            }
            LevelError::UnknownPreset { name } => format!("Unknown level preset: {}", name),
        }
    }
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LevelError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for LevelError {}
