use super::*;
use std::time::Instant;

use futures::StreamExt;

use crate::analysis::TimingCategory;
use crate::engine::backend::ManualClock;
use crate::schedule::beat_time_ms;
use crate::session::SessionState;

fn manual_handle(level: Level) -> (TrainerHandle, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0.0));
    let handle = TrainerHandle::new(
        AppConfig::default(),
        level,
        Box::new(NullAudio),
        Box::new(NullAnimation),
        clock.clone(),
    )
    .unwrap();
    (handle, clock)
}

/// Tiny level that finishes in a few tens of milliseconds
fn fast_level() -> Level {
    Level {
        name: "fast".to_string(),
        description: "driver test level".to_string(),
        beat_ms: 5.0,
        active_beats_per_segment: 2,
        rest_beats_per_segment: 0,
        segments_per_set: 1,
        countdown_beats: 1,
    }
}

fn game_start(level: &Level, origin: f64) -> f64 {
    beat_time_ms(origin, level.beat_ms, level.countdown_beats as u64 * 2)
}

#[test]
fn test_start_session_enters_countdown() {
    let (handle, _clock) = manual_handle(Level::quarter());
    handle.start_session().unwrap();

    let snapshot = handle.snapshot().unwrap();
    assert_eq!(snapshot.state, SessionState::Countdown);
    assert_eq!(snapshot.countdown, 8);

    assert!(matches!(handle.tap(), Err(SessionError::NoSchedule)));
    handle.shutdown();
}

#[test]
fn test_second_start_is_rejected() {
    let (handle, _clock) = manual_handle(Level::quarter());
    handle.start_session().unwrap();

    assert!(matches!(
        handle.start_calibration(),
        Err(SessionError::AlreadyActive { .. })
    ));
    handle.shutdown();
}

#[test]
fn test_recorded_taps_are_broadcast() {
    let level = Level::quarter();
    let (handle, clock) = manual_handle(level.clone());
    let mut taps = handle.tap_receiver();

    handle.start_session().unwrap();
    let start = game_start(&level, 0.0);
    clock.set_ms(start);

    let response = handle.tap().unwrap();
    assert!(matches!(
        response,
        TapResponse::Classified(TapOutcome::Recorded(_))
    ));

    let result = taps.try_recv().unwrap();
    assert_eq!(result.category, TimingCategory::Perfect);
    assert_eq!(result.beat_index, Some(0));
    assert_eq!(handle.results().unwrap().len(), 1);
    handle.shutdown();
}

#[test]
fn test_commands_publish_snapshots() {
    let (handle, _clock) = manual_handle(Level::quarter());
    let mut snapshots = handle.snapshot_receiver();

    assert!(handle.toggle_metronome().unwrap());
    let mut saw_metronome = false;
    while let Ok(snapshot) = snapshots.try_recv() {
        saw_metronome |= snapshot.state == SessionState::Metronome;
    }
    assert!(saw_metronome);

    assert!(!handle.toggle_metronome().unwrap());
    assert_eq!(handle.snapshot().unwrap().state, SessionState::Idle);
    handle.shutdown();
}

#[test]
fn test_set_level_only_when_idle() {
    let (handle, _clock) = manual_handle(Level::quarter());
    handle.set_level(Level::eighth()).unwrap();
    assert_eq!(handle.snapshot().unwrap().level, "eighth");

    handle.start_session().unwrap();
    assert!(matches!(
        handle.set_level(Level::sixteenth()),
        Err(SessionError::InvalidState { .. })
    ));

    handle.stop().unwrap();
    handle.set_level(Level::sixteenth()).unwrap();
    handle.shutdown();
}

#[test]
fn test_calibration_offset_override() {
    let (handle, _clock) = manual_handle(Level::quarter());
    handle.set_calibration_offset_ms(42.0).unwrap();
    assert_eq!(handle.snapshot().unwrap().calibration_offset_ms, 42.0);

    handle.reset().unwrap();
    assert_eq!(handle.snapshot().unwrap().state, SessionState::Idle);
    handle.shutdown();
}

#[test]
fn test_driver_runs_game_to_completion() {
    let handle = TrainerHandle::new(
        AppConfig::default(),
        fast_level(),
        Box::new(NullAudio),
        Box::new(NullAnimation),
        Arc::new(SystemClock::new()),
    )
    .unwrap();

    handle.start_session().unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut state = handle.snapshot().unwrap().state;
    while state != SessionState::Complete && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
        state = handle.snapshot().unwrap().state;
    }
    assert_eq!(state, SessionState::Complete);

    let stats = handle.timing_stats().unwrap();
    assert_eq!(stats.total_beats, 2);
    assert_eq!(stats.active_taps, 0);
    handle.shutdown();
}

#[tokio::test]
async fn test_snapshot_stream_yields_state_changes() {
    let (handle, _clock) = manual_handle(Level::quarter());
    let mut stream = handle.snapshot_stream();

    handle.start_calibration().unwrap();

    // The driver may publish an idle snapshot before the command lands
    let seen = tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(snapshot) = stream.next().await {
            if snapshot.state == SessionState::Calibration {
                return Some(snapshot);
            }
        }
        None
    })
    .await
    .expect("snapshot within timeout")
    .expect("stream open");
    assert!(seen.calibration_progress.is_some());
    handle.shutdown();
}

#[test]
fn test_shutdown_is_idempotent() {
    let (handle, _clock) = manual_handle(Level::quarter());
    handle.start_session().unwrap();
    handle.shutdown();
    handle.shutdown();

    // Commands still act on the machine after the driver is gone
    handle.stop().unwrap();
    assert_eq!(handle.snapshot().unwrap().state, SessionState::Idle);
}

#[test]
fn test_start_after_shutdown_respawns_driver() {
    let handle = TrainerHandle::new(
        AppConfig::default(),
        fast_level(),
        Box::new(NullAudio),
        Box::new(NullAnimation),
        Arc::new(SystemClock::new()),
    )
    .unwrap();

    handle.start_session().unwrap();
    handle.shutdown();
    handle.stop().unwrap();

    handle.start_session().unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut state = handle.snapshot().unwrap().state;
    while state != SessionState::Complete && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
        state = handle.snapshot().unwrap().state;
    }
    assert_eq!(state, SessionState::Complete);
    handle.shutdown();
}
