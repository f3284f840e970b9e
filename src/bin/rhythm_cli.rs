use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhythm_trainer::calibration::CalibrationResult;
use rhythm_trainer::engine::{NullAnimation, NullAudio};
use rhythm_trainer::schedule::{beat_time_ms, ScheduleBuilder};
use rhythm_trainer::scoring::TimingStats;
use rhythm_trainer::session::{SessionSnapshot, SessionState, SessionStateMachine};
use rhythm_trainer::telemetry::{self, TelemetrySnapshot};
use rhythm_trainer::{AppConfig, Level};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "rhythm_cli",
    about = "Headless harness for the rhythm trainer session engine"
)]
struct Cli {
    /// JSON configuration file (defaults to built-in constants)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the built-in level presets
    Levels,
    /// Print the expected tap times of a level as JSON
    Schedule {
        #[arg(long, default_value = "quarter")]
        level: String,
        #[arg(long, default_value_t = 0.0)]
        start_ms: f64,
    },
    /// Run calibration plus a full game against a simulated player
    Simulate {
        #[arg(long, default_value = "quarter")]
        level: String,
        /// Maximum random deviation applied to each tap (ms)
        #[arg(long, default_value_t = 10.0)]
        jitter_ms: f64,
        /// Constant latency added to every tap (ms)
        #[arg(long, default_value_t = 0.0)]
        offset_ms: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Skip calibration and judge raw tap times
        #[arg(long)]
        skip_calibration: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    rhythm_trainer::init_logging();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Levels => run_levels(),
        Commands::Schedule { level, start_ms } => run_schedule(&level, start_ms),
        Commands::Simulate {
            level,
            jitter_ms,
            offset_ms,
            seed,
            skip_calibration,
            output,
        } => {
            let player = SimulatedPlayer::new(jitter_ms, offset_ms, seed)?;
            run_simulate(config, &level, player, skip_calibration, output)
        }
    }
}

fn run_levels() -> Result<ExitCode> {
    for level in Level::presets() {
        println!(
            "{:<10} {:>7.2} ms  {:>3.0} BPM  {}",
            level.name,
            level.beat_ms,
            level.bpm(),
            level.description
        );
    }
    Ok(ExitCode::from(0))
}

fn run_schedule(name: &str, start_ms: f64) -> Result<ExitCode> {
    let level = Level::preset(name).with_context(|| format!("loading level {}", name))?;
    let schedule = ScheduleBuilder::build(&level, start_ms);

    let payload = SchedulePayload {
        level: &level,
        active_beats: schedule.len(),
        end_ms: schedule.end_ms(),
        timestamps: schedule.timestamps(),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::from(0))
}

/// Player tapping on the beat with a constant latency plus uniform jitter
struct SimulatedPlayer {
    rng: StdRng,
    jitter_ms: f64,
    offset_ms: f64,
}

impl SimulatedPlayer {
    fn new(jitter_ms: f64, offset_ms: f64, seed: u64) -> Result<Self> {
        if !jitter_ms.is_finite() || jitter_ms < 0.0 {
            bail!("jitter must be a non-negative number, got {}", jitter_ms);
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            jitter_ms,
            offset_ms,
        })
    }

    fn tap_time(&mut self, target_ms: f64) -> f64 {
        let jitter = if self.jitter_ms > 0.0 {
            self.rng.gen_range(-self.jitter_ms..=self.jitter_ms)
        } else {
            0.0
        };
        target_ms + self.offset_ms + jitter
    }
}

fn run_simulate(
    config: AppConfig,
    name: &str,
    mut player: SimulatedPlayer,
    skip_calibration: bool,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let level = Level::preset(name).with_context(|| format!("loading level {}", name))?;
    let mut machine = SessionStateMachine::new(
        config,
        level,
        Box::new(NullAudio),
        Box::new(NullAnimation),
    )
    .context("creating session")?;

    let mut now = 0.0;
    if !skip_calibration {
        now = simulate_calibration(&mut machine, &mut player, now)?;
    }
    let calibration = machine.calibration_result();

    now = simulate_game(&mut machine, &mut player, now)?;

    let report = SimulationReport {
        level: name,
        calibration,
        calibration_offset_ms: machine.calibration_offset_ms(),
        session: machine.snapshot(now),
        stats: machine.timing_stats(),
        telemetry: telemetry::hub().snapshot(),
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(ExitCode::from(0))
}

/// Tap along with the calibration clicks. Returns the time calibration ended.
fn simulate_calibration(
    machine: &mut SessionStateMachine,
    player: &mut SimulatedPlayer,
    start_ms: f64,
) -> Result<f64> {
    machine
        .start_calibration(start_ms)
        .context("starting calibration")?;

    let beat_ms = machine.level().beat_ms;
    let prep = machine.config().calibration.preparation_beats as u64;
    let taps = machine.config().calibration.tap_count as u64;
    let reference = beat_time_ms(start_ms, beat_ms, prep);

    // Taps before the first audible click count as preparation taps, so the
    // player never answers before it
    let mut tap_times: Vec<f64> = (0..taps)
        .map(|i| {
            player
                .tap_time(beat_time_ms(reference, beat_ms, i))
                .max(reference)
        })
        .collect();
    tap_times.sort_by(f64::total_cmp);

    let mut now = start_ms;
    for tap_ms in tap_times {
        now = tap_ms.max(now);
        machine
            .handle_tap(now)
            .context("registering calibration tap")?;
    }

    now = run_until(machine, now, |state| state != SessionState::Calibration);
    if machine.calibration_result().is_none() {
        bail!("calibration did not complete");
    }
    Ok(now)
}

/// Play a full game, tapping every active beat. Returns the completion time.
fn simulate_game(
    machine: &mut SessionStateMachine,
    player: &mut SimulatedPlayer,
    start_ms: f64,
) -> Result<f64> {
    machine.start_countdown(start_ms).context("starting game")?;
    let beats = machine.level().countdown_beats as u64 * 2;
    let game_start = beat_time_ms(start_ms, machine.level().beat_ms, beats);
    machine.advance(game_start);

    let targets = machine
        .schedule()
        .map(|schedule| schedule.timestamps())
        .context("game did not start")?;

    let mut tap_times: Vec<f64> = targets.iter().map(|&t| player.tap_time(t)).collect();
    tap_times.sort_by(f64::total_cmp);

    let mut now = game_start;
    for tap_ms in tap_times {
        now = tap_ms.max(now);
        // Taps rejected outside play are part of the simulation outcome
        if let Err(err) = machine.handle_tap(now) {
            log::warn!("[Simulate] Tap at {:.1}ms rejected: {}", now, err);
        }
    }

    Ok(run_until(machine, now, |state| state == SessionState::Complete))
}

/// Advance the machine along its own wake times until `done` holds
fn run_until(
    machine: &mut SessionStateMachine,
    mut now: f64,
    done: impl Fn(SessionState) -> bool,
) -> f64 {
    while !done(machine.state()) {
        let Some(next) = machine.next_wake_ms() else {
            break;
        };
        now = next.max(now);
        machine.advance(now);
    }
    now
}

#[derive(Serialize)]
struct SchedulePayload<'a> {
    level: &'a Level,
    active_beats: usize,
    end_ms: f64,
    timestamps: Vec<f64>,
}

#[derive(Serialize)]
struct SimulationReport<'a> {
    level: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration: Option<CalibrationResult>,
    calibration_offset_ms: f64,
    session: SessionSnapshot,
    stats: TimingStats,
    telemetry: TelemetrySnapshot,
}
