// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants shared with the UI shell
///
/// Error code range: 2001-2004
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Fewer taps than required when the calibration window closed
    pub const INSUFFICIENT_TAPS: i32 = 2001;

    /// Tap recorded before the first audible calibration click
    pub const NOT_STARTED: i32 = 2002;

    /// Calibration already in progress
    pub const ALREADY_IN_PROGRESS: i32 = 2003;

    /// Calibration parameters are unusable (zero taps, bad beat duration)
    pub const INVALID_PARAMETERS: i32 = 2004;
}

/// Log a calibration error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Insufficient taps collected before the window closed
    InsufficientTaps { required: usize, collected: usize },

    /// No reference start recorded yet
    NotStarted,

    /// Calibration already in progress
    AlreadyInProgress,

    /// Calibration parameters are unusable
    InvalidParameters { reason: String },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientTaps { .. } => CalibrationErrorCodes::INSUFFICIENT_TAPS,
            CalibrationError::NotStarted => CalibrationErrorCodes::NOT_STARTED,
            CalibrationError::AlreadyInProgress => CalibrationErrorCodes::ALREADY_IN_PROGRESS,
            CalibrationError::InvalidParameters { .. } => {
                CalibrationErrorCodes::INVALID_PARAMETERS
            }
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientTaps {
                required,
                collected,
            } => {
                format!("Insufficient taps: need {}, got {}", required, collected)
            }
            CalibrationError::NotStarted => {
                "Calibration reference not started yet".to_string()
            }
            CalibrationError::AlreadyInProgress => "Calibration already in progress".to_string(),
            CalibrationError::InvalidParameters { reason } => {
                format!("Invalid calibration parameters: {}", reason)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
