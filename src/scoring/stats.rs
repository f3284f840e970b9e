//! Post-session timing analysis
//!
//! Summarises a result log into averages, a per-segment breakdown and short
//! practice hints.

use serde::{Deserialize, Serialize};

use crate::analysis::{TapResult, TimingCategory};
use crate::level::Level;

/// Share of early (or late) taps above which a tendency is reported
const TENDENCY_RATIO: f64 = 0.3;
/// Largest |deviation| tolerated before the timing is called inconsistent
const INCONSISTENT_DEVIATION_MS: f64 = 100.0;
/// Share of hits above which accuracy is called excellent
const EXCELLENT_RATIO: f64 = 0.8;

/// Practice hints derived from a result log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingAdvice {
    TendsEarly,
    TendsLate,
    Inconsistent,
    TapsDuringRest,
    Excellent,
}

impl TimingAdvice {
    pub fn message(&self) -> &'static str {
        match self {
            TimingAdvice::TendsEarly => "You tend to rush. Wait a little longer before tapping.",
            TimingAdvice::TendsLate => "You tend to drag. Try tapping slightly earlier.",
            TimingAdvice::Inconsistent => "Timing varies a lot. Focus on a steady pulse.",
            TimingAdvice::TapsDuringRest => "You tapped during rests. Keep still on rest beats.",
            TimingAdvice::Excellent => "Excellent accuracy! You are right on the beat.",
        }
    }
}

/// Breakdown for one segment of the set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub segment: u32,
    pub taps: u32,
    pub expected_taps: u32,
    pub perfect: u32,
    pub good: u32,
    /// Early or late taps
    pub miss: u32,
    /// (perfect x 100 + good x 50) / (taps x 100) x 100
    pub accuracy: f64,
}

/// Summary of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub total_beats: usize,
    pub active_beats: usize,
    pub rest_beats: usize,
    pub active_taps: usize,
    pub rest_taps: usize,
    /// Mean signed deviation of active taps
    pub average_deviation_ms: f64,
    pub max_abs_deviation_ms: f64,
    pub segments: Vec<SegmentStats>,
    pub advice: Vec<TimingAdvice>,
}

impl TimingStats {
    /// Analyse `results` for a session played at `level`.
    ///
    /// Active taps are grouped into segments through their matched beat index.
    pub fn from_results(results: &[TapResult], level: &Level) -> Self {
        let active: Vec<&TapResult> = results.iter().filter(|r| !r.is_rest_tap).collect();
        let rest_taps = results.len() - active.len();

        let (average_deviation_ms, max_abs_deviation_ms) = if active.is_empty() {
            (0.0, 0.0)
        } else {
            let sum: f64 = active.iter().map(|r| r.deviation_ms).sum();
            let max = active
                .iter()
                .map(|r| r.deviation_ms.abs())
                .fold(0.0_f64, f64::max);
            (sum / active.len() as f64, max)
        };

        let segments = Self::segment_breakdown(&active, level);
        let advice = Self::advise(&active, rest_taps, max_abs_deviation_ms);

        Self {
            total_beats: level.total_beats(),
            active_beats: level.total_active_beats(),
            rest_beats: level.segments_per_set as usize * level.rest_beats_per_segment as usize,
            active_taps: active.len(),
            rest_taps,
            average_deviation_ms,
            max_abs_deviation_ms,
            segments,
            advice,
        }
    }

    fn segment_breakdown(active: &[&TapResult], level: &Level) -> Vec<SegmentStats> {
        let per_segment = level.active_beats_per_segment.max(1) as usize;
        let mut segments: Vec<SegmentStats> = (0..level.segments_per_set)
            .map(|segment| SegmentStats {
                segment,
                taps: 0,
                expected_taps: level.active_beats_per_segment,
                perfect: 0,
                good: 0,
                miss: 0,
                accuracy: 0.0,
            })
            .collect();

        for result in active {
            let Some(beat_index) = result.beat_index else {
                continue;
            };
            let Some(stats) = segments.get_mut(beat_index / per_segment) else {
                continue;
            };
            stats.taps += 1;
            match result.category {
                TimingCategory::Perfect => stats.perfect += 1,
                TimingCategory::Good => stats.good += 1,
                _ => stats.miss += 1,
            }
        }

        for stats in &mut segments {
            if stats.taps > 0 {
                let points = (stats.perfect * 100 + stats.good * 50) as f64;
                stats.accuracy = points / (stats.taps as f64 * 100.0) * 100.0;
            }
        }

        segments
    }

    fn advise(active: &[&TapResult], rest_taps: usize, max_abs_deviation_ms: f64) -> Vec<TimingAdvice> {
        let mut advice = Vec::new();
        let count = |category: TimingCategory| active.iter().filter(|r| r.category == category).count();
        let threshold = active.len() as f64;

        if count(TimingCategory::Early) as f64 > threshold * TENDENCY_RATIO {
            advice.push(TimingAdvice::TendsEarly);
        }
        if count(TimingCategory::Late) as f64 > threshold * TENDENCY_RATIO {
            advice.push(TimingAdvice::TendsLate);
        }
        if max_abs_deviation_ms > INCONSISTENT_DEVIATION_MS {
            advice.push(TimingAdvice::Inconsistent);
        }
        if rest_taps > 0 {
            advice.push(TimingAdvice::TapsDuringRest);
        }
        let hits = active.iter().filter(|r| r.category.is_hit()).count();
        if !active.is_empty() && hits as f64 > threshold * EXCELLENT_RATIO {
            advice.push(TimingAdvice::Excellent);
        }

        advice
    }
}
