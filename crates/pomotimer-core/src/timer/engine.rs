//! Timer engine implementation.
//!
//! The timer engine is a tick-driven state machine. It does not use
//! internal threads - something outside calls `tick()` once per second
//! while the engine's [`TickSource`] is armed (see [`super::driver`]).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Paused -> Running
//!           |
//!           +-> (countdown hits 0) -> next session -> Running
//! ```
//!
//! Sessions cycle Work -> ShortBreak -> Work -> ... and every
//! `sessions_until_long_break`-th Work is followed by a LongBreak instead.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(SettingsStore::open(Box::new(MemoryKv::new())));
//! engine.on_session_complete(|finished| println!("{finished} done"));
//! engine.start();
//! // Once per second:
//! engine.tick();
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::session::Session;
use super::tick::TickSource;
use crate::storage::{Settings, SettingsStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

/// Read-only copy of the engine's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub running: bool,
    pub paused: bool,
    pub session: Session,
    pub remaining_seconds: u64,
    pub formatted_time: String,
    pub sessions_completed: u64,
}

#[derive(Default)]
struct Callbacks {
    tick: Option<Box<dyn FnMut(&str, f64)>>,
    session_complete: Option<Box<dyn FnMut(Session)>>,
    session_change: Option<Box<dyn FnMut(Session)>>,
    reset: Option<Box<dyn FnMut(&str)>>,
}

/// Core timer engine.
///
/// Owns its settings store; durations are read from it whenever a session
/// starts over, so edits only affect sessions that have not begun yet.
pub struct TimerEngine {
    settings: SettingsStore,
    session: Session,
    remaining_secs: u64,
    running: bool,
    paused: bool,
    sessions_completed: u64,
    ticks: TickSource,
    callbacks: Callbacks,
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("session", &self.session)
            .field("remaining_secs", &self.remaining_secs)
            .field("running", &self.running)
            .field("paused", &self.paused)
            .field("sessions_completed", &self.sessions_completed)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    /// Create an idle engine at the start of a Work session.
    pub fn new(settings: SettingsStore) -> Self {
        let remaining_secs = minutes_to_secs(settings.settings().work_minutes);
        Self {
            settings,
            session: Session::Work,
            remaining_secs,
            running: false,
            paused: false,
            sessions_completed: 0,
            ticks: TickSource::default(),
            callbacks: Callbacks::default(),
        }
    }

    // ── Callbacks ────────────────────────────────────────────────────

    /// Called after every applied tick with `MM:SS` and 0..=100 progress.
    pub fn on_tick(&mut self, f: impl FnMut(&str, f64) + 'static) {
        self.callbacks.tick = Some(Box::new(f));
    }

    /// Called with the session that just ran out.
    pub fn on_session_complete(&mut self, f: impl FnMut(Session) + 'static) {
        self.callbacks.session_complete = Some(Box::new(f));
    }

    /// Called with the session that is now current.
    pub fn on_session_change(&mut self, f: impl FnMut(Session) + 'static) {
        self.callbacks.session_change = Some(Box::new(f));
    }

    /// Called on `reset()` with the refreshed `MM:SS`.
    pub fn on_reset(&mut self, f: impl FnMut(&str) + 'static) {
        self.callbacks.reset = Some(Box::new(f));
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        if self.running {
            TimerState::Running
        } else if self.paused {
            TimerState::Paused
        } else {
            TimerState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_secs
    }

    pub fn sessions_completed(&self) -> u64 {
        self.sessions_completed
    }

    pub fn tick_source(&self) -> TickSource {
        self.ticks
    }

    pub fn settings(&self) -> &Settings {
        self.settings.settings()
    }

    /// Direct access to the store. Edits made here are persisted but do not
    /// refresh an idle countdown; prefer the engine's own setters for that.
    pub fn settings_mut(&mut self) -> &mut SettingsStore {
        &mut self.settings
    }

    /// Full length of `session` in seconds under the current settings.
    pub fn total_duration(&self, session: Session) -> u64 {
        let s = self.settings.settings();
        minutes_to_secs(match session {
            Session::Work => s.work_minutes,
            Session::ShortBreak => s.short_break_minutes,
            Session::LongBreak => s.long_break_minutes,
        })
    }

    /// 0.0 .. 100.0 progress within the current session.
    pub fn progress_pct(&self) -> f64 {
        let total = self.total_duration(self.session);
        if total == 0 {
            return 100.0;
        }
        100.0 * (1.0 - self.remaining_secs as f64 / total as f64)
    }

    /// Remaining time as `MM:SS`. Minutes do not roll over into hours.
    pub fn formatted_time(&self) -> String {
        format_mm_ss(self.remaining_secs)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            state: self.state(),
            running: self.running,
            paused: self.paused,
            session: self.session,
            remaining_seconds: self.remaining_secs,
            formatted_time: self.formatted_time(),
            sessions_completed: self.sessions_completed,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.paused = false;
        self.ticks.arm();
        debug!(session = %self.session, remaining = self.remaining_secs, "timer started");
    }

    pub fn pause(&mut self) {
        if !self.running || self.paused {
            return;
        }
        self.paused = true;
        self.running = false;
        self.ticks.cancel();
        debug!(remaining = self.remaining_secs, "timer paused");
    }

    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.start();
    }

    /// Back to an idle Work session. `sessions_completed` is kept.
    pub fn reset(&mut self) {
        self.ticks.cancel();
        self.running = false;
        self.paused = false;
        self.session = Session::Work;
        self.remaining_secs = self.total_duration(Session::Work);
        debug!("timer reset");

        let time = self.formatted_time();
        if let Some(cb) = self.callbacks.reset.as_mut() {
            cb(&time);
        }
        if let Some(cb) = self.callbacks.session_change.as_mut() {
            cb(Session::Work);
        }
    }

    /// Finish the current session on the next tick, through the same
    /// transition as a natural expiry.
    pub fn skip_to_next_session(&mut self) {
        self.remaining_secs = 1;
    }

    /// Apply one tick. Ignored unless the tick source is armed.
    pub fn tick(&mut self) {
        if !self.ticks.is_armed() {
            return;
        }
        self.apply_tick();
    }

    /// Apply one tick scheduled under `generation`.
    ///
    /// Returns false, without touching state, if that generation has since
    /// been cancelled or superseded.
    pub fn tick_scheduled(&mut self, generation: u64) -> bool {
        if !self.ticks.accepts(generation) {
            return false;
        }
        self.apply_tick();
        true
    }

    // ── Settings edits ───────────────────────────────────────────────

    pub fn set_work_minutes(&mut self, minutes: u32) {
        self.settings.set_work_minutes(minutes);
        self.refresh_if_idle(Session::Work);
    }

    pub fn set_short_break_minutes(&mut self, minutes: u32) {
        self.settings.set_short_break_minutes(minutes);
        self.refresh_if_idle(Session::ShortBreak);
    }

    pub fn set_long_break_minutes(&mut self, minutes: u32) {
        self.settings.set_long_break_minutes(minutes);
        self.refresh_if_idle(Session::LongBreak);
    }

    pub fn set_sessions_until_long_break(&mut self, sessions: u32) {
        self.settings.set_sessions_until_long_break(sessions);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply_tick(&mut self) {
        self.remaining_secs = self.remaining_secs.saturating_sub(1);

        let time = self.formatted_time();
        let progress = self.progress_pct();
        if let Some(cb) = self.callbacks.tick.as_mut() {
            cb(&time, progress);
        }

        if self.remaining_secs == 0 {
            self.complete_session();
        }
    }

    fn complete_session(&mut self) {
        self.ticks.cancel();
        self.running = false;

        let finished = self.session;
        if let Some(cb) = self.callbacks.session_complete.as_mut() {
            cb(finished);
        }

        let next = self.next_session(finished);
        debug!(%finished, %next, completed = self.sessions_completed, "session complete");
        self.session = next;
        self.remaining_secs = self.total_duration(next);

        if let Some(cb) = self.callbacks.session_change.as_mut() {
            cb(next);
        }

        self.start();
    }

    /// Counts the finished Work session as a side effect.
    fn next_session(&mut self, finished: Session) -> Session {
        match finished {
            Session::Work => {
                self.sessions_completed += 1;
                let every = u64::from(self.settings.settings().sessions_until_long_break);
                // A threshold of 0 never yields a long break.
                if self.sessions_completed.checked_rem(every) == Some(0) {
                    Session::LongBreak
                } else {
                    Session::ShortBreak
                }
            }
            Session::ShortBreak | Session::LongBreak => Session::Work,
        }
    }

    fn refresh_if_idle(&mut self, edited: Session) {
        if !self.running && self.session == edited {
            self.remaining_secs = self.total_duration(edited);
        }
    }
}

fn minutes_to_secs(minutes: u32) -> u64 {
    u64::from(minutes) * 60
}

fn format_mm_ss(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
