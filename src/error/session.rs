// Session error types and constants

use crate::error::ErrorCode;
use crate::session::SessionState;
use log::error;
use std::fmt;

/// Session error code constants shared with the UI shell
///
/// Error code range: 1001-1005
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// A tick chain or session is already active
    pub const ALREADY_ACTIVE: i32 = 1001;

    /// Operation requires a different session state
    pub const INVALID_STATE: i32 = 1002;

    /// Tap arrived but no beat schedule has been built
    pub const NO_SCHEDULE: i32 = 1003;

    /// Session lock was poisoned
    pub const STATE_POISONED: i32 = 1004;

    /// Level or configuration rejected when building a session
    pub const INVALID_CONFIGURATION: i32 = 1005;
}

/// Log a session error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=SessionStateMachine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Session-related errors
///
/// Returned by command methods of the state machine. Tick handlers never
/// produce these; timer-driven paths swallow and log instead.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A chain is already running in the given state
    AlreadyActive { state: SessionState },

    /// The requested operation is not valid in the current state
    InvalidState {
        expected: &'static str,
        actual: SessionState,
    },

    /// No beat schedule exists for the current session
    NoSchedule,

    /// Session lock was poisoned
    StatePoisoned,

    /// Level or configuration values are unusable
    InvalidConfiguration { reason: String },
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::AlreadyActive { .. } => SessionErrorCodes::ALREADY_ACTIVE,
            SessionError::InvalidState { .. } => SessionErrorCodes::INVALID_STATE,
            SessionError::NoSchedule => SessionErrorCodes::NO_SCHEDULE,
            SessionError::StatePoisoned => SessionErrorCodes::STATE_POISONED,
            SessionError::InvalidConfiguration { .. } => SessionErrorCodes::INVALID_CONFIGURATION,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::AlreadyActive { state } => {
                format!("Session already active ({:?}). Call stop() first.", state)
            }
            SessionError::InvalidState { expected, actual } => {
                format!("Expected {} state, but session is {:?}", expected, actual)
            }
            SessionError::NoSchedule => "No beat schedule for this session".to_string(),
            SessionError::StatePoisoned => "Session state lock poisoned".to_string(),
            SessionError::InvalidConfiguration { reason } => {
                format!("Invalid session configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}
