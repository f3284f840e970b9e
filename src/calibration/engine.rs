// CalibrationEngine - tap offset collection and result computation
//
// The engine compares each tap with the click it answers: the i-th tap is
// expected at `reference_start + i * beat`. Once the configured number of
// taps is in, the mean offset and population standard deviation are
// computed, the mean becomes the active calibration offset and the sample
// buffer resets.

use crate::calibration::progress::{CalibrationPhase, CalibrationProgress};
use crate::error::CalibrationError;
use crate::schedule::beat_time_ms;

/// Outcome of one completed calibration run
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CalibrationResult {
    /// Mean of tap minus expected time
    pub average_offset_ms: f64,
    /// Population standard deviation of the offsets
    pub standard_deviation_ms: f64,
    pub tap_count: usize,
}

impl CalibrationResult {
    /// Compute a result from raw per-tap offsets
    ///
    /// # Returns
    /// * `Ok(CalibrationResult)` - Mean and population standard deviation
    /// * `Err(CalibrationError)` - No offsets supplied
    pub fn from_offsets(offsets: &[f64]) -> Result<Self, CalibrationError> {
        if offsets.is_empty() {
            return Err(CalibrationError::InsufficientTaps {
                required: 1,
                collected: 0,
            });
        }

        let count = offsets.len() as f64;
        let average = offsets.iter().sum::<f64>() / count;
        let variance = offsets
            .iter()
            .map(|offset| (offset - average).powi(2))
            .sum::<f64>()
            / count;

        Ok(Self {
            average_offset_ms: average,
            standard_deviation_ms: variance.sqrt(),
            tap_count: offsets.len(),
        })
    }
}

/// Collects calibration taps and holds the active offset
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    tap_count: usize,
    beat_ms: f64,
    reference_start_ms: Option<f64>,
    tap_times: Vec<f64>,
    result: Option<CalibrationResult>,
    offset_ms: f64,
}

impl CalibrationEngine {
    /// Create an engine expecting `tap_count` taps per run
    ///
    /// # Errors
    /// `InvalidParameters` when `tap_count` is zero
    pub fn new(tap_count: usize) -> Result<Self, CalibrationError> {
        if tap_count == 0 {
            return Err(CalibrationError::InvalidParameters {
                reason: "tap count must be at least 1".to_string(),
            });
        }

        Ok(Self {
            tap_count,
            beat_ms: 0.0,
            reference_start_ms: None,
            tap_times: Vec::with_capacity(tap_count),
            result: None,
            offset_ms: 0.0,
        })
    }

    /// Start collecting against clicks beginning at `reference_start_ms`
    ///
    /// A run still collecting must be closed or aborted first. The previous
    /// result and offset stay in effect until a new run completes.
    pub fn begin(&mut self, reference_start_ms: f64, beat_ms: f64) -> Result<(), CalibrationError> {
        if self.is_collecting() {
            return Err(CalibrationError::AlreadyInProgress);
        }
        if !beat_ms.is_finite() || beat_ms <= 0.0 {
            return Err(CalibrationError::InvalidParameters {
                reason: format!("beat duration must be positive, got {}", beat_ms),
            });
        }

        self.reference_start_ms = Some(reference_start_ms);
        self.beat_ms = beat_ms;
        self.tap_times.clear();

        log::info!(
            "[Calibration] Reference start {:.2}ms, beat {:.2}ms, expecting {} taps",
            reference_start_ms,
            beat_ms,
            self.tap_count
        );
        Ok(())
    }

    /// Record a tap.
    ///
    /// # Returns
    /// * `Ok(None)` - Tap stored, more taps needed
    /// * `Ok(Some(result))` - Final tap; the result is now the active calibration
    /// * `Err(NotStarted)` - No reference start set
    pub fn record_tap(&mut self, tap_ms: f64) -> Result<Option<CalibrationResult>, CalibrationError> {
        let Some(reference_start_ms) = self.reference_start_ms else {
            return Err(CalibrationError::NotStarted);
        };

        self.tap_times.push(tap_ms);
        log::debug!(
            "[Calibration] Tap {}/{} at +{:.2}ms",
            self.tap_times.len(),
            self.tap_count,
            tap_ms - reference_start_ms
        );

        if self.tap_times.len() < self.tap_count {
            return Ok(None);
        }

        let offsets: Vec<f64> = self
            .tap_times
            .iter()
            .enumerate()
            .map(|(index, tap)| tap - beat_time_ms(reference_start_ms, self.beat_ms, index as u64))
            .collect();
        let result = CalibrationResult::from_offsets(&offsets)?;

        self.result = Some(result);
        self.offset_ms = result.average_offset_ms;
        self.tap_times.clear();
        self.reference_start_ms = None;

        log::info!(
            "[Calibration] Complete: average offset {:.2}ms, std dev {:.2}ms",
            result.average_offset_ms,
            result.standard_deviation_ms
        );
        Ok(Some(result))
    }

    /// Close the collection window.
    ///
    /// Succeeds when no run is pending (already completed or never started).
    /// A pending run with too few taps is discarded and reported.
    pub fn close_window(&mut self) -> Result<(), CalibrationError> {
        if self.reference_start_ms.is_none() {
            return Ok(());
        }

        let collected = self.abort();
        Err(CalibrationError::InsufficientTaps {
            required: self.tap_count,
            collected,
        })
    }

    /// Drop the pending run. Returns the number of taps discarded.
    pub fn abort(&mut self) -> usize {
        let collected = self.tap_times.len();
        self.tap_times.clear();
        self.reference_start_ms = None;
        collected
    }

    pub fn is_collecting(&self) -> bool {
        self.reference_start_ms.is_some()
    }

    pub fn taps_collected(&self) -> usize {
        self.tap_times.len()
    }

    pub fn tap_count(&self) -> usize {
        self.tap_count
    }

    pub fn reference_start_ms(&self) -> Option<f64> {
        self.reference_start_ms
    }

    /// Active calibration offset (0 until the first successful run)
    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    /// Install an offset measured earlier (e.g. restored from storage)
    pub fn set_offset_ms(&mut self, offset_ms: f64) {
        self.offset_ms = offset_ms;
    }

    pub fn result(&self) -> Option<CalibrationResult> {
        self.result
    }

    pub fn progress(&self, phase: CalibrationPhase) -> CalibrationProgress {
        CalibrationProgress::new(phase, self.tap_times.len(), self.tap_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BEAT: f64 = 60_000.0 / 180.0;

    fn engine_at(start: f64) -> CalibrationEngine {
        let mut engine = CalibrationEngine::new(8).unwrap();
        engine.begin(start, BEAT).unwrap();
        engine
    }

    #[test]
    fn test_constant_late_offset() {
        let mut engine = engine_at(1000.0);

        for i in 0..7 {
            let tap = beat_time_ms(1000.0, BEAT, i) + 50.0;
            assert_eq!(engine.record_tap(tap).unwrap(), None);
        }
        let result = engine
            .record_tap(beat_time_ms(1000.0, BEAT, 7) + 50.0)
            .unwrap()
            .expect("eighth tap completes calibration");

        assert!((result.average_offset_ms - 50.0).abs() < 1e-9);
        assert!(result.standard_deviation_ms.abs() < 1e-6);
        assert_eq!(result.tap_count, 8);
        assert!((engine.offset_ms() - 50.0).abs() < 1e-9);
        assert_eq!(engine.result(), Some(result));
        assert_eq!(engine.taps_collected(), 0);
        assert!(!engine.is_collecting());
    }

    #[test]
    fn test_population_standard_deviation() {
        let result = CalibrationResult::from_offsets(&[10.0, 30.0, 10.0, 30.0]).unwrap();
        assert_eq!(result.average_offset_ms, 20.0);
        assert_eq!(result.standard_deviation_ms, 10.0);
        assert!(CalibrationResult::from_offsets(&[]).is_err());
    }

    #[test]
    fn test_tap_before_reference_rejected() {
        let mut engine = CalibrationEngine::new(8).unwrap();
        assert_eq!(engine.record_tap(100.0), Err(CalibrationError::NotStarted));
    }

    #[test]
    fn test_zero_tap_count_rejected() {
        assert!(matches!(
            CalibrationEngine::new(0),
            Err(CalibrationError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_invalid_beat_rejected() {
        let mut engine = CalibrationEngine::new(4).unwrap();
        assert!(engine.begin(0.0, 0.0).is_err());
        assert!(!engine.is_collecting());
    }

    #[test]
    fn test_close_window_reports_missing_taps() {
        let mut engine = engine_at(0.0);
        engine.record_tap(10.0).unwrap();
        engine.record_tap(BEAT + 10.0).unwrap();

        assert_eq!(
            engine.close_window(),
            Err(CalibrationError::InsufficientTaps {
                required: 8,
                collected: 2
            })
        );
        assert!(!engine.is_collecting());
        assert_eq!(engine.offset_ms(), 0.0);
        assert_eq!(engine.result(), None);

        // Nothing pending any more
        assert_eq!(engine.close_window(), Ok(()));
    }

    #[test]
    fn test_failed_run_keeps_previous_offset() {
        let mut engine = CalibrationEngine::new(2).unwrap();
        engine.begin(0.0, 100.0).unwrap();
        engine.record_tap(20.0).unwrap();
        engine.record_tap(120.0).unwrap();
        assert_eq!(engine.offset_ms(), 20.0);

        engine.begin(1000.0, 100.0).unwrap();
        engine.record_tap(1005.0).unwrap();
        assert!(engine.close_window().is_err());
        assert_eq!(engine.offset_ms(), 20.0);
    }

    #[test]
    fn test_begin_rejected_while_collecting() {
        let mut engine = engine_at(0.0);
        engine.record_tap(5.0).unwrap();

        assert_eq!(
            engine.begin(500.0, BEAT),
            Err(CalibrationError::AlreadyInProgress)
        );
        assert_eq!(engine.reference_start_ms(), Some(0.0));
        assert_eq!(engine.taps_collected(), 1);

        assert_eq!(engine.abort(), 1);
        engine.begin(500.0, BEAT).unwrap();
        assert_eq!(engine.taps_collected(), 0);
    }

    #[test]
    fn test_progress_tracks_collected_taps() {
        let mut engine = engine_at(0.0);
        engine.record_tap(0.0).unwrap();
        engine.record_tap(BEAT).unwrap();

        let progress = engine.progress(CalibrationPhase::Listening);
        assert_eq!(progress.taps_collected, 2);
        assert_eq!(progress.taps_needed, 8);
        assert_eq!(progress.percentage(), 25);
    }

    #[test]
    fn test_set_offset_restores_value() {
        let mut engine = CalibrationEngine::new(8).unwrap();
        engine.set_offset_ms(-12.5);
        assert_eq!(engine.offset_ms(), -12.5);
        assert_eq!(engine.result(), None);
    }
}
