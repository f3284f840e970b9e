// Progress tracking for calibration workflow
//
// This module provides types and utilities for tracking progress through
// the calibration tap collection window.

/// Calibration phase - silent preparation before the audible clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPhase {
    /// Silent preparation beats (taps are ignored)
    Preparing,
    /// Audible clicks are playing and taps are collected
    Listening,
}

impl CalibrationPhase {
    /// Get human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            CalibrationPhase::Preparing => "GET READY",
            CalibrationPhase::Listening => "TAP ALONG",
        }
    }

    /// Whether taps are accepted in this phase
    pub fn accepts_taps(&self) -> bool {
        matches!(self, CalibrationPhase::Listening)
    }
}

/// Progress information for the running calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationProgress {
    /// Current phase of the calibration window
    pub phase: CalibrationPhase,
    /// Number of taps collected so far
    pub taps_collected: usize,
    /// Total taps needed for a result
    pub taps_needed: usize,
}

impl CalibrationProgress {
    /// Create a new progress instance
    ///
    /// # Arguments
    /// * `phase` - Current calibration phase
    /// * `taps_collected` - Number of taps collected so far
    /// * `taps_needed` - Total taps needed
    pub fn new(phase: CalibrationPhase, taps_collected: usize, taps_needed: usize) -> Self {
        Self {
            phase,
            taps_collected,
            taps_needed,
        }
    }

    /// Check if enough taps were collected
    pub fn is_complete(&self) -> bool {
        self.taps_needed > 0 && self.taps_collected >= self.taps_needed
    }

    /// Get progress percentage (0-100)
    pub fn percentage(&self) -> u8 {
        if self.taps_needed == 0 {
            return 0;
        }
        let ratio = (self.taps_collected as f32 / self.taps_needed as f32).min(1.0);
        (ratio * 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_phase_display_name() {
        assert_eq!(CalibrationPhase::Preparing.display_name(), "GET READY");
        assert_eq!(CalibrationPhase::Listening.display_name(), "TAP ALONG");
    }

    #[test]
    fn test_calibration_phase_accepts_taps() {
        assert!(!CalibrationPhase::Preparing.accepts_taps());
        assert!(CalibrationPhase::Listening.accepts_taps());
    }

    #[test]
    fn test_calibration_progress_is_complete() {
        let progress = CalibrationProgress::new(CalibrationPhase::Listening, 8, 8);
        assert!(progress.is_complete());

        let progress = CalibrationProgress::new(CalibrationPhase::Listening, 5, 8);
        assert!(!progress.is_complete());
    }

    #[test]
    fn test_calibration_progress_percentage() {
        let progress = CalibrationProgress::new(CalibrationPhase::Preparing, 0, 8);
        assert_eq!(progress.percentage(), 0);

        let progress = CalibrationProgress::new(CalibrationPhase::Listening, 4, 8);
        assert_eq!(progress.percentage(), 50);

        let progress = CalibrationProgress::new(CalibrationPhase::Listening, 8, 8);
        assert_eq!(progress.percentage(), 100);

        let progress = CalibrationProgress::new(CalibrationPhase::Listening, 6, 8);
        assert_eq!(progress.percentage(), 75);
    }

    #[test]
    fn test_calibration_progress_percentage_zero_needed() {
        let progress = CalibrationProgress::new(CalibrationPhase::Listening, 0, 0);
        assert_eq!(progress.percentage(), 0);
        assert!(!progress.is_complete());
    }
}
