//! Core telemetry event types describing session data exposed to the CLI
//! and to UI subscribers.

use serde::{Deserialize, Serialize};

use crate::analysis::TimingCategory;
use crate::session::SessionState;

/// Rich metric events covering tap judgements, timing drift and lifecycle details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Rolling |deviation| over recent scored taps
    Latency {
        avg_ms: f64,
        max_ms: f64,
        sample_count: usize,
    },
    TapJudged {
        category: TimingCategory,
        deviation_ms: f64,
        points: u32,
        is_rest_tap: bool,
    },
    StateTransition {
        from: SessionState,
        to: SessionState,
        timestamp_ms: u64,
    },
    Calibration {
        average_offset_ms: f64,
        standard_deviation_ms: f64,
        tap_count: usize,
    },
    Error {
        code: i32,
        context: String,
    },
}
