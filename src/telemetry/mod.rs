//! Session telemetry collector and helpers.
//!
//! The collector multiplexes tap judgements, timing drift, state transitions
//! and errors into a bounded history plus async broadcast stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

use crate::analysis::TapResult;
use crate::calibration::CalibrationResult;
use crate::session::SessionState;

pub mod events;

pub use events::MetricEvent;

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            if self.history_capacity > 0 {
                history.push_back(event.clone());
            }
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Deviation tracker maintains a rolling window to compute avg/max |deviation|.
struct DeviationTracker {
    samples: VecDeque<f64>,
    max_samples: usize,
}

impl DeviationTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    fn observe(&mut self, value: f64) -> (f64, f64, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f64 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f64, |acc, next| acc.max(next));
        let avg = if count == 0 { 0.0 } else { sum / count as f64 };
        (avg, max, count)
    }
}

/// Top-level hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    deviation: Mutex<DeviationTracker>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, deviation_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            deviation: Mutex::new(DeviationTracker::new(deviation_window)),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    /// Publish a judgement; scored taps also update the rolling deviation.
    pub fn record_tap(&self, result: &TapResult) {
        self.collector.publish(MetricEvent::TapJudged {
            category: result.category,
            deviation_ms: result.deviation_ms,
            points: result.points(),
            is_rest_tap: result.is_rest_tap,
        });

        if result.is_rest_tap {
            return;
        }

        let (avg, max, count) = {
            let mut tracker = self.deviation.lock().unwrap_or_else(PoisonError::into_inner);
            tracker.observe(result.deviation_ms)
        };

        self.collector.publish(MetricEvent::Latency {
            avg_ms: avg,
            max_ms: max,
            sample_count: count,
        });
    }

    pub fn record_transition(&self, from: SessionState, to: SessionState) {
        self.collector.publish(MetricEvent::StateTransition {
            from,
            to,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_calibration(&self, result: &CalibrationResult) {
        self.collector.publish(MetricEvent::Calibration {
            average_offset_ms: result.average_offset_ms,
            standard_deviation_ms: result.standard_deviation_ms,
            tap_count: result.tap_count,
        });
    }

    pub fn record_error(&self, code: i32, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code,
            context: context.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TimingCategory;

    fn sample_result(category: TimingCategory, deviation_ms: f64) -> TapResult {
        TapResult {
            category,
            deviation_ms,
            tap_ms: 1000.0,
            target_ms: Some(1000.0 - deviation_ms),
            is_rest_tap: false,
            beat_index: Some(0),
        }
    }

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::Latency {
            avg_ms: 1.0,
            max_ms: 2.0,
            sample_count: 1,
        });
        collector.publish(MetricEvent::Latency {
            avg_ms: 3.0,
            max_ms: 4.0,
            sample_count: 2,
        });
        collector.publish(MetricEvent::Error {
            code: 3003,
            context: "test".to_string(),
        });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(
            matches!(snapshot.recent[0], MetricEvent::Latency { avg_ms, .. } if (avg_ms - 1.0).abs() < f64::EPSILON)
        );
        assert!(matches!(snapshot.recent[2], MetricEvent::Error { code: 3003, .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for i in 0..3 {
            collector.publish(MetricEvent::Latency {
                avg_ms: i as f64,
                max_ms: i as f64,
                sample_count: i,
            });
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.total_events, 3);
        assert!(
            matches!(snapshot.recent[0], MetricEvent::Latency { sample_count: 1, .. })
        );
    }

    #[test]
    fn hub_emits_judgement_and_rolling_deviation() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_tap(&sample_result(TimingCategory::Perfect, -12.0));
        hub.record_tap(&sample_result(TimingCategory::Good, 30.0));

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.total_events, 4);
        let latest = snapshot
            .recent
            .iter()
            .rev()
            .find(|event| matches!(event, MetricEvent::Latency { .. }))
            .unwrap();
        assert_eq!(
            latest,
            &MetricEvent::Latency {
                avg_ms: 21.0,
                max_ms: 30.0,
                sample_count: 2
            }
        );
    }

    #[test]
    fn rest_taps_skip_deviation_tracking() {
        let hub = TelemetryHub::new(8, 8, 4);
        hub.record_tap(&TapResult::rest_tap(10.0));

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.recent.len(), 1);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::TapJudged {
                is_rest_tap: true,
                ..
            }
        ));
    }

    #[test]
    fn subscribers_receive_transitions() {
        let hub = TelemetryHub::new(8, 8, 4);
        let mut rx = hub.collector().subscribe();
        hub.record_transition(SessionState::Idle, SessionState::Countdown);

        match rx.try_recv().unwrap() {
            MetricEvent::StateTransition { from, to, .. } => {
                assert_eq!(from, SessionState::Idle);
                assert_eq!(to, SessionState::Countdown);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
