//! Transient feedback messages
//!
//! Each message kind stays visible for its configured duration. A newer
//! message replaces the current one.

use serde::{Deserialize, Serialize};

use crate::config::FeedbackConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Judgement,
    RestTap,
    OutOfRange,
    CalibrationPrep,
    CalibrationOutcome,
    AudioError,
}

impl FeedbackKind {
    pub fn duration_ms(&self, config: &FeedbackConfig) -> f64 {
        match self {
            FeedbackKind::Judgement => config.judgement_ms,
            FeedbackKind::RestTap => config.rest_tap_ms,
            FeedbackKind::OutOfRange => config.out_of_range_ms,
            FeedbackKind::CalibrationPrep => config.calibration_prep_ms,
            FeedbackKind::CalibrationOutcome => config.calibration_outcome_ms,
            FeedbackKind::AudioError => config.audio_error_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub message: String,
    pub kind: FeedbackKind,
    pub expires_at_ms: f64,
}

/// Holds at most one live feedback message
#[derive(Debug, Clone, Default)]
pub struct FeedbackSlot {
    current: Option<Feedback>,
    config: FeedbackConfig,
}

impl FeedbackSlot {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            current: None,
            config,
        }
    }

    pub fn show(&mut self, kind: FeedbackKind, message: impl Into<String>, now_ms: f64) {
        self.current = Some(Feedback {
            message: message.into(),
            kind,
            expires_at_ms: now_ms + kind.duration_ms(&self.config),
        });
    }

    /// The message visible at `now_ms`, if any
    pub fn current(&self, now_ms: f64) -> Option<&Feedback> {
        self.current
            .as_ref()
            .filter(|feedback| now_ms < feedback.expires_at_ms)
    }

    /// Drop the message once its time is up
    pub fn expire(&mut self, now_ms: f64) {
        if self.current(now_ms).is_none() {
            self.current = None;
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// When the live message disappears
    pub fn expires_at_ms(&self) -> Option<f64> {
        self.current.as_ref().map(|feedback| feedback.expires_at_ms)
    }
}
