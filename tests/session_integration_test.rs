// Integration tests for the session engine
//
// These drive the public API with a virtual clock: schedule construction,
// calibration, a full game and the properties that tie them together.

use rhythm_trainer::analysis::{TapOutcome, TapResult, TimingCategory};
use rhythm_trainer::config::AppConfig;
use rhythm_trainer::engine::{NullAnimation, NullAudio, RecordingAnimation, RecordingAudio};
use rhythm_trainer::level::Level;
use rhythm_trainer::schedule::{beat_time_ms, ScheduleBuilder};
use rhythm_trainer::session::{SessionState, SessionStateMachine, TapResponse};

fn machine(level: Level) -> SessionStateMachine {
    SessionStateMachine::new(
        AppConfig::default(),
        level,
        Box::new(NullAudio),
        Box::new(NullAnimation),
    )
    .unwrap()
}

fn play_until_start(machine: &mut SessionStateMachine, origin: f64) -> f64 {
    machine.start_countdown(origin).unwrap();
    let level = machine.level().clone();
    let start = beat_time_ms(origin, level.beat_ms, level.countdown_beats as u64 * 2);
    machine.advance(start);
    assert_eq!(machine.state(), SessionState::Playing);
    start
}

fn recorded(response: TapResponse) -> TapResult {
    match response {
        TapResponse::Classified(TapOutcome::Recorded(result)) => result,
        other => panic!("Expected recorded tap, got {:?}", other),
    }
}

/// Advance along the machine's own wake times until the game completes
fn finish(machine: &mut SessionStateMachine, mut now: f64) {
    while machine.state() != SessionState::Complete {
        let next = machine.next_wake_ms().expect("pending wake while playing");
        now = next.max(now);
        machine.advance(now);
    }
}

#[test]
fn test_schedule_shape_for_every_preset() {
    for level in Level::presets() {
        let schedule = ScheduleBuilder::build(&level, 500.0);
        let times = schedule.timestamps();
        assert_eq!(times.len(), level.total_active_beats(), "{}", level.name);

        let active = level.active_beats_per_segment as usize;
        for (i, pair) in times.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            let expected = if (i + 1) % active == 0 {
                (level.rest_beats_per_segment + 1) as f64 * level.beat_ms
            } else {
                level.beat_ms
            };
            assert!(gap > 0.0);
            assert!(
                (gap - expected).abs() < 1e-6,
                "{} gap {} expected {}",
                level.name,
                gap,
                expected
            );
        }
    }
}

#[test]
fn test_perfect_run_scores_every_active_beat() {
    let mut machine = machine(Level::quarter());
    play_until_start(&mut machine, 0.0);

    let targets = machine.schedule().unwrap().timestamps();
    for &t in &targets {
        let result = recorded(machine.handle_tap(t).unwrap());
        assert_eq!(result.category, TimingCategory::Perfect);
        assert_eq!(result.deviation_ms, 0.0);
    }
    finish(&mut machine, *targets.last().unwrap());

    let score = machine.score();
    assert_eq!(score.score(), 2800);
    assert_eq!(score.total_taps(), 28);
    assert_eq!(score.breakdown().perfect, 28);
    assert_eq!(score.rest_taps(), 0);
    assert!((score.accuracy() - 100.0).abs() < 1e-9);
}

#[test]
fn test_late_beyond_good_tolerance_is_never_good() {
    let mut machine = machine(Level::quarter());
    let start = play_until_start(&mut machine, 0.0);

    let result = recorded(machine.handle_tap(start + 51.0).unwrap());
    assert_eq!(result.category, TimingCategory::Late);
    assert!((result.deviation_ms - 51.0).abs() < 1e-9);
}

#[test]
fn test_each_beat_matches_at_most_one_tap() {
    let mut machine = machine(Level::quarter());
    let start = play_until_start(&mut machine, 0.0);
    let beat = machine.level().beat_ms;

    let first = recorded(machine.handle_tap(start).unwrap());
    let second = recorded(machine.handle_tap(start + 100.0).unwrap());

    assert_eq!(first.beat_index, Some(0));
    assert_eq!(second.beat_index, Some(1));
    assert_eq!(second.category, TimingCategory::Early);
    assert!((second.deviation_ms - (100.0 - beat)).abs() < 1e-9);

    // Beats 0 and 1 are taken and beat 2 is outside the search window
    let third = machine.handle_tap(start + beat + 5.0).unwrap();
    assert!(matches!(
        third,
        TapResponse::Classified(TapOutcome::OutOfRange { .. })
    ));
    assert_eq!(machine.results().len(), 2);
}

#[test]
fn test_debounce_keeps_single_result() {
    let mut machine = machine(Level::quarter());
    let start = play_until_start(&mut machine, 0.0);

    recorded(machine.handle_tap(start).unwrap());
    let response = machine.handle_tap(start + 20.0).unwrap();
    assert!(matches!(
        response,
        TapResponse::Classified(TapOutcome::Debounced)
    ));
    assert_eq!(machine.results().len(), 1);
}

#[test]
fn test_calibration_offset_shifts_later_judgements() {
    let audio = RecordingAudio::new();
    let animation = RecordingAnimation::new();
    let mut machine = SessionStateMachine::new(
        AppConfig::default(),
        Level::quarter(),
        Box::new(audio.clone()),
        Box::new(animation.clone()),
    )
    .unwrap();
    let beat = machine.level().beat_ms;

    machine.start_calibration(0.0).unwrap();
    let reference = beat_time_ms(0.0, beat, 4);
    for i in 0..8 {
        machine
            .handle_tap(beat_time_ms(reference, beat, i) + 50.0)
            .unwrap();
    }

    let result = machine.calibration_result().expect("calibration result");
    assert!((result.average_offset_ms - 50.0).abs() < 1e-6);
    assert!(result.standard_deviation_ms.abs() < 1e-6);
    assert_eq!(result.tap_count, 8);
    assert_eq!(machine.state(), SessionState::Idle);
    assert!(!audio.clicks().is_empty());

    let start = play_until_start(&mut machine, 10_000.0);
    let tap = recorded(machine.handle_tap(start + 50.0).unwrap());
    assert_eq!(tap.category, TimingCategory::Perfect);
    assert!(tap.deviation_ms.abs() < 1e-6);
}

#[test]
fn test_retry_after_completion_starts_fresh() {
    let level = Level {
        name: "short".to_string(),
        description: "two beats, one rest".to_string(),
        beat_ms: 100.0,
        active_beats_per_segment: 2,
        rest_beats_per_segment: 1,
        segments_per_set: 1,
        countdown_beats: 2,
    };
    let mut machine = machine(level);

    let start = play_until_start(&mut machine, 0.0);
    recorded(machine.handle_tap(start).unwrap());
    finish(&mut machine, start);
    assert_eq!(machine.score().total_taps(), 1);

    let end = machine.schedule().unwrap().end_ms();
    let restart = play_until_start(&mut machine, end + 1000.0);
    assert_eq!(machine.score().total_taps(), 0);
    assert_eq!(machine.session_start_ms(), Some(restart));
}

#[test]
fn test_snapshot_serializes_for_ui() {
    let mut machine = machine(Level::eighth());
    let start = play_until_start(&mut machine, 0.0);
    recorded(machine.handle_tap(start + 10.0).unwrap());

    let snapshot = machine.snapshot(start + 10.0);
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"state\":\"playing\""));

    let parsed: rhythm_trainer::SessionSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.state, SessionState::Playing);
    assert_eq!(parsed.total_taps, 1);
    assert_eq!(parsed.level, "eighth");
}
