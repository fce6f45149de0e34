//! Drives a [`TimerEngine`] in real time on a single-threaded tokio runtime.
//!
//! The loop owns the engine and multiplexes two inputs: control commands
//! from an mpsc channel, and a 1-second interval that exists only while the
//! engine's tick source is armed. The interval is rebuilt from scratch on
//! every arm and dropped on every cancel, before the loop waits again, so a
//! tick queued under a cancelled arm is never delivered.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use super::engine::TimerEngine;
use super::tick::TickSource;

/// Control input for [`run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    /// Pause if running, resume if paused, start if idle.
    Toggle,
    Reset,
    Skip,
    SetWorkMinutes(u32),
    SetShortBreakMinutes(u32),
    SetLongBreakMinutes(u32),
    SetSessionsUntilLongBreak(u32),
    Shutdown,
}

/// Apply a command to the engine. `Shutdown` is a no-op here.
pub fn apply(engine: &mut TimerEngine, command: Command) {
    match command {
        Command::Start => engine.start(),
        Command::Pause => engine.pause(),
        Command::Resume => engine.resume(),
        Command::Toggle => {
            if engine.is_running() {
                engine.pause();
            } else if engine.is_paused() {
                engine.resume();
            } else {
                engine.start();
            }
        }
        Command::Reset => engine.reset(),
        Command::Skip => engine.skip_to_next_session(),
        Command::SetWorkMinutes(m) => engine.set_work_minutes(m),
        Command::SetShortBreakMinutes(m) => engine.set_short_break_minutes(m),
        Command::SetLongBreakMinutes(m) => engine.set_long_break_minutes(m),
        Command::SetSessionsUntilLongBreak(n) => engine.set_sessions_until_long_break(n),
        Command::Shutdown => {}
    }
}

/// Run until `Shutdown` arrives or every sender is dropped, then hand the
/// engine back.
pub async fn run(mut engine: TimerEngine, mut commands: UnboundedReceiver<Command>) -> TimerEngine {
    let mut schedule: Option<(u64, Interval)> = None;

    loop {
        sync_schedule(engine.tick_source(), &mut schedule);

        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => {
                    debug!(?command, "timer command");
                    apply(&mut engine, command);
                }
            },
            generation = next_tick(&mut schedule) => {
                engine.tick_scheduled(generation);
            }
        }
    }

    engine.pause();
    engine
}

fn sync_schedule(source: TickSource, schedule: &mut Option<(u64, Interval)>) {
    if let Some((generation, _)) = schedule {
        if source.accepts(*generation) {
            return;
        }
    }
    *schedule = source.is_armed().then(|| {
        let mut interval = interval_at(Instant::now() + TickSource::PERIOD, TickSource::PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        (source.generation(), interval)
    });
}

async fn next_tick(schedule: &mut Option<(u64, Interval)>) -> u64 {
    match schedule {
        Some((generation, interval)) => {
            interval.tick().await;
            *generation
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryKv, SettingsStore};
    use crate::timer::{Session, TimerState};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::sleep;

    fn one_minute_engine() -> TimerEngine {
        let mut store = SettingsStore::open(Box::new(MemoryKv::new()));
        store.set_work_minutes(1);
        store.set_short_break_minutes(1);
        store.set_long_break_minutes(2);
        TimerEngine::new(store)
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_once_per_second() {
        let (tx, rx) = unbounded_channel();
        let script = async move {
            tx.send(Command::Start).unwrap();
            sleep(Duration::from_millis(3_500)).await;
            tx.send(Command::Shutdown).unwrap();
        };
        let (engine, ()) = tokio::join!(run(one_minute_engine(), rx), script);
        assert_eq!(engine.remaining_seconds(), 57);
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_while_paused() {
        let (tx, rx) = unbounded_channel();
        let script = async move {
            tx.send(Command::Start).unwrap();
            sleep(Duration::from_millis(2_500)).await;
            tx.send(Command::Pause).unwrap();
            sleep(Duration::from_secs(30)).await;
            tx.send(Command::Shutdown).unwrap();
        };
        let (engine, ()) = tokio::join!(run(one_minute_engine(), rx), script);
        assert_eq!(engine.remaining_seconds(), 58);
        assert_eq!(engine.state(), TimerState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_restarts_the_second_boundary() {
        let (tx, rx) = unbounded_channel();
        let script = async move {
            tx.send(Command::Start).unwrap();
            sleep(Duration::from_millis(500)).await;
            tx.send(Command::Pause).unwrap();
            sleep(Duration::from_millis(400)).await;
            tx.send(Command::Resume).unwrap();
            // The original arm would have ticked at 1.0s; the new one ticks at 1.9s.
            sleep(Duration::from_millis(600)).await;
            tx.send(Command::Shutdown).unwrap();
        };
        let (engine, ()) = tokio::join!(run(one_minute_engine(), rx), script);
        assert_eq!(engine.remaining_seconds(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stops_ticking() {
        let (tx, rx) = unbounded_channel();
        let script = async move {
            tx.send(Command::Start).unwrap();
            sleep(Duration::from_millis(5_500)).await;
            tx.send(Command::Reset).unwrap();
            sleep(Duration::from_secs(10)).await;
            tx.send(Command::Shutdown).unwrap();
        };
        let (engine, ()) = tokio::join!(run(one_minute_engine(), rx), script);
        assert_eq!(engine.remaining_seconds(), 60);
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_advances_into_break() {
        let mut engine = one_minute_engine();
        let completed = Rc::new(RefCell::new(Vec::new()));
        {
            let completed = completed.clone();
            engine.on_session_complete(move |s| completed.borrow_mut().push(s));
        }

        let (tx, rx) = unbounded_channel();
        let script = async move {
            tx.send(Command::Start).unwrap();
            sleep(Duration::from_millis(62_500)).await;
            tx.send(Command::Shutdown).unwrap();
        };
        let (engine, ()) = tokio::join!(run(engine, rx), script);

        assert_eq!(*completed.borrow(), vec![Session::Work]);
        assert_eq!(engine.session(), Session::ShortBreak);
        // Completed at 60s, break re-armed with ticks at 61s and 62s.
        assert_eq!(engine.remaining_seconds(), 58);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_completes_on_next_tick() {
        let (tx, rx) = unbounded_channel();
        let script = async move {
            tx.send(Command::Toggle).unwrap();
            sleep(Duration::from_millis(10_500)).await;
            tx.send(Command::Skip).unwrap();
            sleep(Duration::from_secs(1)).await;
            tx.send(Command::Shutdown).unwrap();
        };
        let (engine, ()) = tokio::join!(run(one_minute_engine(), rx), script);
        assert_eq!(engine.session(), Session::ShortBreak);
        assert_eq!(engine.sessions_completed(), 1);
        assert_eq!(engine.remaining_seconds(), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_ends_the_loop() {
        let (tx, rx) = unbounded_channel();
        tx.send(Command::SetWorkMinutes(3)).unwrap();
        drop(tx);
        let engine = run(one_minute_engine(), rx).await;
        assert_eq!(engine.remaining_seconds(), 180);
        assert_eq!(engine.settings().work_minutes, 3);
    }

    #[test]
    fn toggle_cycles_start_pause_resume() {
        let mut engine = one_minute_engine();
        apply(&mut engine, Command::Toggle);
        assert_eq!(engine.state(), TimerState::Running);
        apply(&mut engine, Command::Toggle);
        assert_eq!(engine.state(), TimerState::Paused);
        apply(&mut engine, Command::Toggle);
        assert_eq!(engine.state(), TimerState::Running);
    }
}
