//! Tick scheduler - one-shot wake records chained beat by beat
//!
//! Only one tick is ever pending. Firing a tick removes it; the handler
//! re-arms the chain for the next beat. Tick `n` of a chain is due at
//! `origin + n * beat`, so the chain never accumulates drift no matter how
//! late the driver wakes.

use serde::{Deserialize, Serialize};

use crate::schedule::beat_time_ms;

/// Which handler a tick belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickChain {
    Metronome,
    Countdown,
    Playing,
    Calibration,
}

/// A scheduled wake-up
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingTick {
    pub due_ms: f64,
    pub chain: TickChain,
    /// Position within the chain, 0 for the tick at the origin
    pub index: u64,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct TickScheduler {
    origin_ms: f64,
    beat_ms: f64,
    pending: Option<PendingTick>,
    generation: u64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a new chain whose first tick is due at `origin_ms`.
    ///
    /// Fails with the running chain if a tick is still pending.
    pub fn start(&mut self, chain: TickChain, origin_ms: f64, beat_ms: f64) -> Result<(), TickChain> {
        if let Some(pending) = self.pending {
            return Err(pending.chain);
        }

        self.generation += 1;
        self.origin_ms = origin_ms;
        self.beat_ms = beat_ms;
        self.pending = Some(PendingTick {
            due_ms: origin_ms,
            chain,
            index: 0,
            generation: self.generation,
        });
        Ok(())
    }

    /// Remove and return the pending tick if it is due at `now_ms`
    pub fn take_due(&mut self, now_ms: f64) -> Option<PendingTick> {
        match self.pending {
            Some(tick) if tick.due_ms <= now_ms => self.pending.take(),
            _ => None,
        }
    }

    /// Re-arm the chain of `fired` for its next beat.
    ///
    /// Ignored when the chain was cancelled or replaced while the tick was
    /// being handled.
    pub fn schedule_after(&mut self, fired: &PendingTick) -> bool {
        if fired.generation != self.generation || self.pending.is_some() {
            return false;
        }

        let index = fired.index + 1;
        self.pending = Some(PendingTick {
            due_ms: beat_time_ms(self.origin_ms, self.beat_ms, index),
            chain: fired.chain,
            index,
            generation: fired.generation,
        });
        true
    }

    /// Drop the pending tick. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        self.pending.take().is_some()
    }

    pub fn pending(&self) -> Option<PendingTick> {
        self.pending
    }

    pub fn next_due_ms(&self) -> Option<f64> {
        self.pending.map(|tick| tick.due_ms)
    }

    /// Bumped whenever a chain starts or is cancelled
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
