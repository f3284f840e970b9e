//! SessionStateMachine - tick-driven session lifecycle
//!
//! The machine owns every piece of per-session state and advances it from
//! two inputs only: elapsed clock time (`advance`) and taps (`handle_tap`).
//! Command methods return typed errors; tick handlers never fail and report
//! trouble through feedback, logs and telemetry instead.

use crate::analysis::{TapClassifier, TapOutcome, TapResult, TimingCategory};
use crate::calibration::{
    CalibrationEngine, CalibrationPhase, CalibrationProgress, CalibrationResult,
};
use crate::config::AppConfig;
use crate::engine::backend::{AnimationHost, AudioEmitter, PulseTarget};
use crate::error::{
    log_audio_error, log_calibration_error, log_session_error, AudioError, CalibrationError,
    ErrorCode, SessionError,
};
use crate::level::Level;
use crate::schedule::{BeatSchedule, ScheduleBuilder};
use crate::scoring::{ScoreAggregator, TimingStats};
use crate::session::context::SessionContext;
use crate::session::feedback::{Feedback, FeedbackKind, FeedbackSlot};
use crate::session::scheduler::{PendingTick, TickChain, TickScheduler};
use crate::session::{SessionSnapshot, SessionState, TapResponse};
use crate::telemetry;

pub struct SessionStateMachine {
    config: AppConfig,
    level: Level,
    audio: Box<dyn AudioEmitter>,
    animation: Box<dyn AnimationHost>,
    scheduler: TickScheduler,
    calibration: CalibrationEngine,
    feedback: FeedbackSlot,
    context: SessionContext,
}

impl SessionStateMachine {
    /// Build an idle machine for `level`.
    ///
    /// # Errors
    /// `InvalidConfiguration` if the level or the calibration settings are unusable
    pub fn new(
        config: AppConfig,
        level: Level,
        audio: Box<dyn AudioEmitter>,
        animation: Box<dyn AnimationHost>,
    ) -> Result<Self, SessionError> {
        level
            .validate()
            .map_err(|err| SessionError::InvalidConfiguration {
                reason: err.message(),
            })?;
        let calibration = CalibrationEngine::new(config.calibration.tap_count).map_err(|err| {
            SessionError::InvalidConfiguration {
                reason: err.message(),
            }
        })?;

        log::info!(
            "[Session] Created for level '{}' ({:.2}ms beat)",
            level.name,
            level.beat_ms
        );

        Ok(Self {
            feedback: FeedbackSlot::new(config.feedback.clone()),
            config,
            level,
            audio,
            animation,
            scheduler: TickScheduler::new(),
            calibration,
            context: SessionContext::default(),
        })
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Start the countdown leading into a game. Also used to retry from `Complete`.
    pub fn start_countdown(&mut self, now_ms: f64) -> Result<(), SessionError> {
        self.ensure_startable("start_countdown")?;
        self.start_chain(TickChain::Countdown, now_ms, "start_countdown")?;

        self.transition(SessionState::Countdown);
        self.context.classifier = None;
        self.context.clear_position();
        self.context.countdown = self.level.countdown_beats * 2;
        self.context.audio_failures = 0;

        log::info!(
            "[Session] Countdown started: {} silent + {} audible beats",
            self.level.countdown_beats,
            self.level.countdown_beats
        );
        self.advance(now_ms);
        Ok(())
    }

    /// Toggle the free-running metronome. Returns whether it is now running.
    pub fn toggle_metronome(&mut self, now_ms: f64) -> Result<bool, SessionError> {
        if self.context.state == SessionState::Metronome {
            self.stop();
            return Ok(false);
        }

        self.ensure_startable("toggle_metronome")?;
        self.start_chain(TickChain::Metronome, now_ms, "toggle_metronome")?;

        self.transition(SessionState::Metronome);
        self.context.clear_position();
        self.context.audio_failures = 0;

        self.advance(now_ms);
        Ok(true)
    }

    /// Start a calibration run: preparation beats, then audible clicks
    pub fn start_calibration(&mut self, now_ms: f64) -> Result<(), SessionError> {
        self.ensure_startable("start_calibration")?;
        self.start_chain(TickChain::Calibration, now_ms, "start_calibration")?;

        self.calibration.abort();
        self.transition(SessionState::Calibration);
        self.context.clear_position();
        self.context.calibration_phase = Some(CalibrationPhase::Preparing);
        self.context.countdown = self.calibration_window_beats();
        self.context.audio_failures = 0;

        log::info!(
            "[Session] Calibration started: {} preparation beats, {} taps",
            self.config.calibration.preparation_beats,
            self.calibration.tap_count()
        );
        self.advance(now_ms);
        Ok(())
    }

    /// Cancel any running chain and return to `Idle`. Results are kept.
    pub fn stop(&mut self) {
        let cancelled = self.scheduler.cancel();
        let discarded = self.calibration.abort();
        if discarded > 0 {
            log::debug!("[Session] Discarded {} calibration taps", discarded);
        }

        if self.context.state != SessionState::Idle {
            log::info!(
                "[Session] Stopped from {:?} (pending tick cancelled: {})",
                self.context.state,
                cancelled
            );
        }
        self.transition(SessionState::Idle);
        self.context.clear_position();
    }

    /// Stop and discard the session's schedule, results and feedback
    pub fn reset(&mut self) {
        self.stop();
        self.context = SessionContext::default();
        self.feedback.clear();
    }

    /// Switch level. Only allowed while nothing is running.
    pub fn set_level(&mut self, level: Level) -> Result<(), SessionError> {
        if !matches!(
            self.context.state,
            SessionState::Idle | SessionState::Complete
        ) {
            let err = SessionError::InvalidState {
                expected: "idle or complete",
                actual: self.context.state,
            };
            log_session_error(&err, "set_level");
            return Err(err);
        }
        level
            .validate()
            .map_err(|err| SessionError::InvalidConfiguration {
                reason: err.message(),
            })?;

        log::info!("[Session] Level set to '{}'", level.name);
        self.level = level;
        Ok(())
    }

    /// Handle a tap at `now_ms`.
    ///
    /// Due ticks are fired first so the tap sees the current resting flag
    /// and calibration phase.
    pub fn handle_tap(&mut self, now_ms: f64) -> Result<TapResponse, SessionError> {
        self.advance(now_ms);

        match self.context.state {
            SessionState::Playing => self.handle_game_tap(now_ms),
            SessionState::Calibration => Ok(self.handle_calibration_tap(now_ms)),
            _ => Err(SessionError::NoSchedule),
        }
    }

    /// Fire every tick due at `now_ms`, in order, and expire stale feedback
    pub fn advance(&mut self, now_ms: f64) {
        while let Some(tick) = self.scheduler.take_due(now_ms) {
            match tick.chain {
                TickChain::Metronome => self.on_metronome_tick(&tick),
                TickChain::Countdown => self.on_countdown_tick(&tick),
                TickChain::Playing => self.on_playing_tick(&tick),
                TickChain::Calibration => self.on_calibration_tick(&tick),
            }
        }
        self.feedback.expire(now_ms);
    }

    /// Next time `advance` has something to do
    pub fn next_wake_ms(&self) -> Option<f64> {
        match (self.scheduler.next_due_ms(), self.feedback.expires_at_ms()) {
            (Some(tick), Some(feedback)) => Some(tick.min(feedback)),
            (tick, feedback) => tick.or(feedback),
        }
    }

    // ------------------------------------------------------------------
    // Tick handlers
    // ------------------------------------------------------------------

    fn on_metronome_tick(&mut self, tick: &PendingTick) {
        self.context.current_beat = (tick.index % 4) as u32 + 1;
        if !self.emit_click(true, true, tick.due_ms) {
            return;
        }
        self.animation.pulse(PulseTarget::BeatIndicator);
        self.scheduler.schedule_after(tick);
    }

    fn on_countdown_tick(&mut self, tick: &PendingTick) {
        let beats = self.level.countdown_beats as u64;
        let index = tick.index;

        if index < beats {
            self.context.countdown = (2 * beats - index) as u32;
        } else if index < 2 * beats {
            let audible = index - beats;
            self.context.countdown = (beats - audible) as u32;
            if !self.emit_click(true, audible == 0, tick.due_ms) {
                return;
            }
            self.animation.pulse(PulseTarget::TapButton);
        } else {
            self.begin_game(tick.due_ms);
            return;
        }

        self.scheduler.schedule_after(tick);
    }

    fn begin_game(&mut self, start_ms: f64) {
        let schedule = ScheduleBuilder::build(&self.level, start_ms);
        let classifier = TapClassifier::for_level(&self.level, schedule, &self.config.timing);

        log::info!(
            "[Session] Playing from {:.2}ms: {} active beats, tolerances {:?}, window {:.2}ms",
            start_ms,
            classifier.schedule().len(),
            classifier.tolerances(),
            classifier.search_window_ms()
        );

        self.context = SessionContext::for_game(
            classifier,
            self.config.timing.count_out_of_range_taps,
            start_ms,
        );
        self.feedback.clear();
        telemetry::hub().record_transition(SessionState::Countdown, SessionState::Playing);

        if let Err(chain) = self
            .scheduler
            .start(TickChain::Playing, start_ms, self.level.beat_ms)
        {
            log::error!("[Session] Cannot start playing chain, {:?} still pending", chain);
        }
    }

    fn on_playing_tick(&mut self, tick: &PendingTick) {
        let slot = tick.index as usize;
        if slot >= self.level.total_beats() {
            self.complete();
            return;
        }

        let per_segment = self.level.beats_per_segment();
        let active = self.level.active_beats_per_segment;
        let position = slot as u32 % per_segment;

        self.context.current_segment = slot as u32 / per_segment;
        let clicked = if position < active {
            self.context.is_resting = false;
            self.context.current_beat = position + 1;
            self.emit_click(true, position == 0, tick.due_ms)
        } else {
            self.context.is_resting = true;
            self.context.current_beat = position - active + 1;
            self.emit_click(false, false, tick.due_ms)
        };
        if !clicked {
            return;
        }

        self.animation.pulse(PulseTarget::BeatIndicator);
        self.scheduler.schedule_after(tick);
    }

    fn complete(&mut self) {
        self.transition(SessionState::Complete);
        self.context.is_resting = false;
        self.context.countdown = 0;

        let score = &self.context.score;
        log::info!(
            "[Session] Complete: score {} over {} taps ({:.1}%), {} rest taps, {} out of range",
            score.score(),
            score.total_taps(),
            score.accuracy(),
            score.rest_taps(),
            score.out_of_range()
        );
    }

    fn on_calibration_tick(&mut self, tick: &PendingTick) {
        let preparation = self.config.calibration.preparation_beats as u64;
        let taps = self.calibration.tap_count() as u64;
        let index = tick.index;

        if index < preparation {
            self.context.countdown = (preparation + taps - index) as u32;
            self.animation.pulse(PulseTarget::BeatIndicator);
        } else if index < preparation + taps {
            let click = index - preparation;
            if click == 0 {
                if let Err(err) = self.calibration.begin(tick.due_ms, self.level.beat_ms) {
                    self.fail_calibration(&err, tick.due_ms);
                    return;
                }
                self.context.calibration_phase = Some(CalibrationPhase::Listening);
            }
            self.context.countdown = (taps - click) as u32;
            if !self.emit_click(true, click == 0, tick.due_ms) {
                return;
            }
            self.animation.pulse(PulseTarget::BeatIndicator);
        } else {
            self.close_calibration_window(tick.due_ms);
            return;
        }

        self.scheduler.schedule_after(tick);
    }

    fn close_calibration_window(&mut self, now_ms: f64) {
        if let Err(err) = self.calibration.close_window() {
            self.fail_calibration(&err, now_ms);
            return;
        }
        self.transition(SessionState::Idle);
        self.context.clear_position();
    }

    fn fail_calibration(&mut self, err: &CalibrationError, now_ms: f64) {
        log_calibration_error(err, "calibration_window");
        telemetry::hub().record_error(err.code(), "calibration_window");

        let message = match err {
            CalibrationError::InsufficientTaps {
                required,
                collected,
            } => format!("Calibration failed: {}/{} taps", collected, required),
            other => format!("Calibration failed: {}", other.message()),
        };
        self.feedback
            .show(FeedbackKind::CalibrationOutcome, message, now_ms);

        self.scheduler.cancel();
        self.calibration.abort();
        self.transition(SessionState::Idle);
        self.context.clear_position();
    }

    // ------------------------------------------------------------------
    // Taps
    // ------------------------------------------------------------------

    fn handle_game_tap(&mut self, now_ms: f64) -> Result<TapResponse, SessionError> {
        let resting = self.context.is_resting;
        let offset = self.calibration.offset_ms();
        let classifier = self
            .context
            .classifier
            .as_mut()
            .ok_or(SessionError::NoSchedule)?;

        let outcome = classifier.classify(now_ms, resting, offset);
        match outcome {
            TapOutcome::Recorded(result) => {
                self.context.score.apply(result);
                self.animation.pulse(PulseTarget::TapButton);
                telemetry::hub().record_tap(&result);
                self.show_judgement(&result, now_ms);
            }
            TapOutcome::OutOfRange { .. } => {
                self.context.score.record_out_of_range();
                self.feedback
                    .show(FeedbackKind::OutOfRange, "Out of range", now_ms);
                log::debug!("[Session] Tap at {:.2}ms matched no beat", now_ms);
            }
            TapOutcome::Debounced | TapOutcome::NoSchedule => {}
        }

        Ok(TapResponse::Classified(outcome))
    }

    fn show_judgement(&mut self, result: &TapResult, now_ms: f64) {
        if result.is_rest_tap {
            self.feedback
                .show(FeedbackKind::RestTap, "Rest! Don't tap", now_ms);
            return;
        }

        let message = match result.category {
            TimingCategory::Perfect | TimingCategory::Good => {
                format!("{}!", result.category.display_name())
            }
            _ => format!(
                "{} ({:+.0}ms)",
                result.category.display_name(),
                result.deviation_ms
            ),
        };
        self.feedback.show(FeedbackKind::Judgement, message, now_ms);
    }

    fn handle_calibration_tap(&mut self, now_ms: f64) -> TapResponse {
        if !self.calibration.is_collecting() {
            self.feedback.show(
                FeedbackKind::CalibrationPrep,
                "Get ready. Tap once the clicks start",
                now_ms,
            );
            return TapResponse::CalibrationPreparing;
        }

        match self.calibration.record_tap(now_ms) {
            Ok(None) => TapResponse::CalibrationTap {
                progress: self.calibration.progress(CalibrationPhase::Listening),
                result: None,
            },
            Ok(Some(result)) => {
                self.scheduler.cancel();
                self.transition(SessionState::Idle);
                self.context.clear_position();
                telemetry::hub().record_calibration(&result);
                self.feedback.show(
                    FeedbackKind::CalibrationOutcome,
                    format!("Calibration complete: {:.0}ms", result.average_offset_ms),
                    now_ms,
                );
                TapResponse::CalibrationTap {
                    progress: CalibrationProgress::new(
                        CalibrationPhase::Listening,
                        result.tap_count,
                        result.tap_count,
                    ),
                    result: Some(result),
                }
            }
            Err(err) => {
                log::warn!("[Session] Calibration tap rejected: {}", err.message());
                TapResponse::CalibrationPreparing
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn ensure_startable(&self, context: &str) -> Result<(), SessionError> {
        match self.context.state {
            SessionState::Idle | SessionState::Complete => Ok(()),
            state => {
                let err = SessionError::AlreadyActive { state };
                log_session_error(&err, context);
                Err(err)
            }
        }
    }

    fn start_chain(
        &mut self,
        chain: TickChain,
        now_ms: f64,
        context: &str,
    ) -> Result<(), SessionError> {
        self.scheduler
            .start(chain, now_ms, self.level.beat_ms)
            .map_err(|pending| {
                let err = SessionError::AlreadyActive {
                    state: self.context.state,
                };
                log::warn!("[Session] {:?} chain still pending", pending);
                log_session_error(&err, context);
                err
            })
    }

    fn transition(&mut self, next: SessionState) {
        let previous = self.context.state;
        if previous == next {
            return;
        }
        log::debug!("[Session] {:?} -> {:?}", previous, next);
        self.context.state = next;
        telemetry::hub().record_transition(previous, next);
    }

    /// Ask the audio collaborator for a click. Returns false when the failure
    /// threshold ended the chain.
    fn emit_click(&mut self, is_active_beat: bool, is_accented: bool, now_ms: f64) -> bool {
        match self.audio.emit(is_active_beat, is_accented) {
            Ok(()) => {
                self.context.audio_failures = 0;
                true
            }
            Err(err) => {
                self.context.audio_failures += 1;
                log::warn!(
                    "[Session] Click failed ({} consecutive): {}",
                    self.context.audio_failures,
                    err.message()
                );
                if self.context.audio_failures > self.config.session.max_audio_failures {
                    self.abort_on_audio_failure(now_ms);
                    return false;
                }
                true
            }
        }
    }

    fn abort_on_audio_failure(&mut self, now_ms: f64) {
        let err = AudioError::FailureThreshold {
            failures: self.context.audio_failures,
        };
        log_audio_error(&err, "emit_click");
        telemetry::hub().record_error(err.code(), "emit_click");

        self.scheduler.cancel();
        self.calibration.abort();
        let next = match self.context.state {
            SessionState::Countdown | SessionState::Playing => SessionState::Complete,
            _ => SessionState::Idle,
        };
        self.transition(next);
        self.context.clear_position();
        self.feedback.show(
            FeedbackKind::AudioError,
            "Audio error occurred. Please try again.",
            now_ms,
        );
    }

    fn calibration_window_beats(&self) -> u32 {
        self.config.calibration.preparation_beats + self.calibration.tap_count() as u32
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.context.state
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Active-beat schedule of the current or last game
    pub fn schedule(&self) -> Option<&BeatSchedule> {
        self.context.schedule()
    }

    pub fn results(&self) -> &[TapResult] {
        self.context.score.results()
    }

    pub fn score(&self) -> &ScoreAggregator {
        &self.context.score
    }

    pub fn session_start_ms(&self) -> Option<f64> {
        self.context.session_start_ms
    }

    pub fn current_segment(&self) -> u32 {
        self.context.current_segment
    }

    pub fn current_beat(&self) -> u32 {
        self.context.current_beat
    }

    pub fn is_resting(&self) -> bool {
        self.context.is_resting
    }

    pub fn countdown(&self) -> u32 {
        self.context.countdown
    }

    pub fn calibration_result(&self) -> Option<CalibrationResult> {
        self.calibration.result()
    }

    pub fn calibration_offset_ms(&self) -> f64 {
        self.calibration.offset_ms()
    }

    /// Install an offset measured in an earlier run
    pub fn set_calibration_offset_ms(&mut self, offset_ms: f64) {
        self.calibration.set_offset_ms(offset_ms);
    }

    pub fn calibration_progress(&self) -> Option<CalibrationProgress> {
        self.context
            .calibration_phase
            .map(|phase| self.calibration.progress(phase))
    }

    pub fn feedback(&self, now_ms: f64) -> Option<&Feedback> {
        self.feedback.current(now_ms)
    }

    /// Post-session analysis of the result log
    pub fn timing_stats(&self) -> TimingStats {
        TimingStats::from_results(self.results(), &self.level)
    }

    pub fn snapshot(&self, now_ms: f64) -> SessionSnapshot {
        let score = &self.context.score;
        SessionSnapshot {
            state: self.context.state,
            level: self.level.name.clone(),
            current_segment: self.context.current_segment,
            current_beat: self.context.current_beat,
            is_resting: self.context.is_resting,
            countdown: self.context.countdown,
            score: score.score(),
            total_taps: score.total_taps(),
            accuracy: score.accuracy(),
            breakdown: score.breakdown(),
            rest_taps: score.rest_taps(),
            out_of_range_taps: score.out_of_range(),
            feedback: self.feedback.current(now_ms).cloned(),
            calibration_offset_ms: self.calibration.offset_ms(),
            calibration_result: self.calibration.result(),
            calibration_progress: self.calibration_progress(),
            session_start_ms: self.context.session_start_ms,
            next_tick_ms: self.scheduler.next_due_ms(),
        }
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
