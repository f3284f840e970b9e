// Rhythm Trainer Core - tap-timing game engine
// Beat scheduling, tap judgement, latency calibration and scoring

// Module declarations
pub mod analysis;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod level;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{TapClassifier, TapOutcome, TapResult, TimingCategory};
pub use calibration::{CalibrationEngine, CalibrationResult};
pub use config::AppConfig;
pub use engine::TrainerHandle;
pub use level::Level;
pub use schedule::BeatSchedule;
pub use scoring::{ScoreAggregator, TimingStats};
pub use session::{SessionSnapshot, SessionState, SessionStateMachine, TapResponse};

/// Install the fmt subscriber for `tracing` and bridge `log` records into it.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
