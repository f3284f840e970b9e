//! TrainerHandle: thread-safe session driver.
//!
//! Wraps the [`SessionStateMachine`] in `Arc<Mutex<_>>` and runs a dedicated
//! driver thread that sleeps until the machine's next wake time, advances it
//! and publishes snapshots. Commands and taps take the lock, act with the
//! current clock reading and nudge the driver so it re-plans its sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{broadcast, Notify};

use crate::analysis::{TapOutcome, TapResult};
use crate::config::AppConfig;
use crate::engine::backend::{
    AnimationHost, AudioEmitter, Clock, NullAnimation, NullAudio, SystemClock,
};
use crate::error::{log_session_error, SessionError};
use crate::level::Level;
use crate::scoring::TimingStats;
use crate::session::{SessionSnapshot, SessionStateMachine, TapResponse};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// TrainerHandle orchestrates the session machine, its timer and shared channels.
pub struct TrainerHandle {
    machine: Arc<Mutex<SessionStateMachine>>,
    clock: Arc<dyn Clock>,
    wake: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
    driver_started: AtomicBool,
    driver: Mutex<Option<JoinHandle<()>>>,
    pub(crate) snapshot_tx: broadcast::Sender<SessionSnapshot>,
    pub(crate) tap_tx: broadcast::Sender<TapResult>,
}

impl TrainerHandle {
    pub fn new(
        config: AppConfig,
        level: Level,
        audio: Box<dyn AudioEmitter>,
        animation: Box<dyn AnimationHost>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let machine = SessionStateMachine::new(config, level, audio, animation)?;
        let (snapshot_tx, _) = broadcast::channel(128);
        let (tap_tx, _) = broadcast::channel(128);

        Ok(Self {
            machine: Arc::new(Mutex::new(machine)),
            clock,
            wake: Arc::new(Notify::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            driver_started: AtomicBool::new(false),
            driver: Mutex::new(None),
            snapshot_tx,
            tap_tx,
        })
    }

    /// Handle with file configuration, silent collaborators and the system clock
    pub fn headless(level: Level) -> Result<Self, SessionError> {
        Self::new(
            AppConfig::load(),
            level,
            Box::new(NullAudio),
            Box::new(NullAnimation),
            Arc::new(SystemClock::new()),
        )
    }

    fn ensure_driver(&self) {
        if self
            .driver_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.shutdown.store(false, Ordering::SeqCst);

        let shared = Arc::clone(&self.machine);
        let clock = Arc::clone(&self.clock);
        let wake = Arc::clone(&self.wake);
        let shutdown = Arc::clone(&self.shutdown);
        let snapshot_tx = self.snapshot_tx.clone();

        // Dedicated thread with its own Tokio runtime so callers need no runtime
        let spawned = std::thread::Builder::new()
            .name("rhythm-driver".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(err) => {
                        log::error!("[TrainerHandle] Failed to create driver runtime: {}", err);
                        return;
                    }
                };
                rt.block_on(drive(shared, clock, wake, shutdown, snapshot_tx));
            });

        match spawned {
            Ok(handle) => {
                if let Ok(mut driver) = self.driver.lock() {
                    *driver = Some(handle);
                }
                log::info!("[TrainerHandle] Driver thread started");
            }
            Err(err) => {
                log::error!("[TrainerHandle] Failed to spawn driver thread: {}", err);
                self.driver_started.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Run `op` against the machine at the current clock reading, then
    /// publish a snapshot and wake the driver.
    fn with_machine<T>(
        &self,
        op: impl FnOnce(&mut SessionStateMachine, f64) -> T,
    ) -> Result<T, SessionError> {
        let mut machine = self.machine.lock().map_err(|_| {
            let err = SessionError::StatePoisoned;
            log_session_error(&err, "TrainerHandle");
            err
        })?;

        let now = self.clock.now_ms();
        let value = op(&mut machine, now);
        let _ = self.snapshot_tx.send(machine.snapshot(now));
        drop(machine);

        self.wake.notify_one();
        Ok(value)
    }

    // ========================================================================
    // SESSION COMMANDS
    // ========================================================================

    /// Start (or retry) a game: countdown, then play.
    pub fn start_session(&self) -> Result<(), SessionError> {
        self.ensure_driver();
        self.with_machine(|machine, now| machine.start_countdown(now))?
    }

    pub fn toggle_metronome(&self) -> Result<bool, SessionError> {
        self.ensure_driver();
        self.with_machine(|machine, now| machine.toggle_metronome(now))?
    }

    pub fn start_calibration(&self) -> Result<(), SessionError> {
        self.ensure_driver();
        self.with_machine(|machine, now| machine.start_calibration(now))?
    }

    pub fn stop(&self) -> Result<(), SessionError> {
        self.with_machine(|machine, _| machine.stop())
    }

    pub fn reset(&self) -> Result<(), SessionError> {
        self.with_machine(|machine, _| machine.reset())
    }

    pub fn set_level(&self, level: Level) -> Result<(), SessionError> {
        self.with_machine(|machine, _| machine.set_level(level))?
    }

    pub fn set_calibration_offset_ms(&self, offset_ms: f64) -> Result<(), SessionError> {
        self.with_machine(|machine, _| machine.set_calibration_offset_ms(offset_ms))
    }

    /// Register a tap at the current clock reading.
    ///
    /// Recorded results are also published to tap subscribers.
    pub fn tap(&self) -> Result<TapResponse, SessionError> {
        let response = self.with_machine(|machine, now| machine.handle_tap(now))??;

        if let TapResponse::Classified(TapOutcome::Recorded(result)) = response {
            let _ = self.tap_tx.send(result);
        }
        Ok(response)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let machine = self.machine.lock().map_err(|_| SessionError::StatePoisoned)?;
        Ok(machine.snapshot(self.clock.now_ms()))
    }

    pub fn results(&self) -> Result<Vec<TapResult>, SessionError> {
        let machine = self.machine.lock().map_err(|_| SessionError::StatePoisoned)?;
        Ok(machine.results().to_vec())
    }

    pub fn timing_stats(&self) -> Result<TimingStats, SessionError> {
        let machine = self.machine.lock().map_err(|_| SessionError::StatePoisoned)?;
        Ok(machine.timing_stats())
    }

    /// Stop the driver thread. Safe to call more than once; the next start
    /// command spawns a fresh driver.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();

        let handle = self.driver.lock().ok().and_then(|mut driver| driver.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::warn!("[TrainerHandle] Driver thread panicked");
            } else {
                log::info!("[TrainerHandle] Driver thread stopped");
            }
        }
        self.driver_started.store(false, Ordering::SeqCst);
    }
}

impl Drop for TrainerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Driver loop: advance, publish, sleep until the next wake or a nudge.
async fn drive(
    shared: Arc<Mutex<SessionStateMachine>>,
    clock: Arc<dyn Clock>,
    wake: Arc<Notify>,
    shutdown: Arc<AtomicBool>,
    snapshot_tx: broadcast::Sender<SessionSnapshot>,
) {
    let mut last_published: Option<SessionSnapshot> = None;

    while !shutdown.load(Ordering::SeqCst) {
        let wake_at = {
            let Ok(mut machine) = shared.lock() else {
                log_session_error(&SessionError::StatePoisoned, "driver");
                break;
            };

            let now = clock.now_ms();
            machine.advance(now);

            let snapshot = machine.snapshot(now);
            if last_published.as_ref() != Some(&snapshot) {
                let _ = snapshot_tx.send(snapshot.clone());
                last_published = Some(snapshot);
            }
            machine.next_wake_ms()
        };

        match wake_at {
            Some(due_ms) => {
                let delay_ms = (due_ms - clock.now_ms()).max(0.0);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs_f64(delay_ms / 1000.0)) => {}
                    _ = wake.notified() => {}
                }
            }
            None => wake.notified().await,
        }
    }
}

#[cfg(test)]
mod tests;
