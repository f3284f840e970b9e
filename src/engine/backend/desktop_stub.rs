use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::AudioError;

use super::{AnimationHost, AudioEmitter, Clock, PulseTarget};

/// Audio emitter that plays nothing. Used by the CLI and headless runs.
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioEmitter for NullAudio {
    fn emit(&mut self, _is_active_beat: bool, _is_accented: bool) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Animation host that ignores every pulse.
#[derive(Debug, Default)]
pub struct NullAnimation;

impl AnimationHost for NullAnimation {
    fn pulse(&mut self, _target: PulseTarget) {}
}

/// One recorded `emit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickEvent {
    pub is_active_beat: bool,
    pub is_accented: bool,
}

/// Recording emitter for deterministic tests.
///
/// Clones share the same log, so a test can keep one handle while the state
/// machine owns another. `fail_next` makes the following N calls return an
/// error without being recorded.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    clicks: Arc<Mutex<Vec<ClickEvent>>>,
    failures_pending: Arc<AtomicU32>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    pub fn clicks(&self) -> Vec<ClickEvent> {
        self.clicks
            .lock()
            .map(|clicks| clicks.clone())
            .unwrap_or_default()
    }
}

impl AudioEmitter for RecordingAudio {
    fn emit(&mut self, is_active_beat: bool, is_accented: bool) -> Result<(), AudioError> {
        let pending = self.failures_pending.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures_pending.store(pending - 1, Ordering::SeqCst);
            return Err(AudioError::BackendUnavailable);
        }

        if let Ok(mut clicks) = self.clicks.lock() {
            clicks.push(ClickEvent {
                is_active_beat,
                is_accented,
            });
        }
        Ok(())
    }
}

/// Recording animation host for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnimation {
    pulses: Arc<Mutex<Vec<PulseTarget>>>,
}

impl RecordingAnimation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self) -> Vec<PulseTarget> {
        self.pulses
            .lock()
            .map(|pulses| pulses.clone())
            .unwrap_or_default()
    }
}

impl AnimationHost for RecordingAnimation {
    fn pulse(&mut self, target: PulseTarget) {
        if let Ok(mut pulses) = self.pulses.lock() {
            pulses.push(target);
        }
    }
}

/// Virtual clock advanced by hand.
///
/// Stores the f64 millisecond value as raw bits in an atomic so clones can be
/// shared across the state machine, the driver and the test body.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now_bits: Arc::new(AtomicU64::new(start_ms.to_bits())),
        }
    }

    pub fn set_ms(&self, now_ms: f64) {
        self.now_bits.store(now_ms.to_bits(), Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: f64) {
        let next = self.now_ms() + delta_ms;
        self.set_ms(next);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.now_bits.load(Ordering::SeqCst))
    }
}
