use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use clap::Args;
use pomotimer_core::error::Result;
use pomotimer_core::timer::driver;
use pomotimer_core::{open_settings, Command, Session, Settings, TimerEngine};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{debug, warn};

const BAR_WIDTH: usize = 20;
const CRITICAL_SECS: u64 = 10;

const HELP: &str = "\
keys: s start/pause/resume  p pause  r reset  n next session  q quit
      w|b|l <min> work/short/long length  e <n> work sessions per long break";

const QUOTES: [&str; 6] = [
    "Focus on being productive instead of busy.",
    "Small steps every day add up.",
    "Rest is part of the work.",
    "One thing at a time.",
    "Done is better than perfect.",
    "Start where you are.",
];

#[derive(Args)]
pub struct RunArgs {
    /// Start counting immediately instead of waiting for `s`
    #[arg(long)]
    pub start: bool,
}

/// Terminal rendering state shared by the engine callbacks.
struct Screen {
    session: Session,
    finished: Option<Session>,
    sound: bool,
    quotes: bool,
    quotes_shown: usize,
}

impl Screen {
    fn new(session: Session, settings: &Settings) -> Self {
        Self {
            session,
            finished: None,
            sound: settings.sound_enabled,
            quotes: settings.quote_enabled,
            quotes_shown: 0,
        }
    }

    fn tick(&mut self, time: &str, progress: f64) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{}", status_line(self.session, time, progress));
        let _ = out.flush();
    }

    fn complete(&mut self, finished: Session) {
        self.finished = Some(finished);
    }

    fn change(&mut self, next: Session) {
        self.session = next;
        let Some(finished) = self.finished.take() else {
            return;
        };

        println!();
        println!("{}", completion_message(finished, next));
        if self.sound {
            print!("\x07");
        }
        if self.quotes {
            println!("  \"{}\"", QUOTES[self.quotes_shown % QUOTES.len()]);
            self.quotes_shown += 1;
        }
    }

    fn reset(&mut self, time: &str) {
        println!();
        println!("{}", status_line(Session::Work, time, 0.0));
    }
}

pub fn run(args: RunArgs) -> Result<()> {
    let mut engine = TimerEngine::new(open_settings()?);
    let screen = Rc::new(RefCell::new(Screen::new(engine.session(), engine.settings())));
    {
        let s = screen.clone();
        engine.on_tick(move |time, progress| s.borrow_mut().tick(time, progress));
        let s = screen.clone();
        engine.on_session_complete(move |finished| s.borrow_mut().complete(finished));
        let s = screen.clone();
        engine.on_session_change(move |next| s.borrow_mut().change(next));
        let s = screen.clone();
        engine.on_reset(move |time| s.borrow_mut().reset(time));
    }

    println!("{HELP}");
    println!(
        "{}",
        status_line(engine.session(), &engine.formatted_time(), engine.progress_pct())
    );
    if args.start {
        engine.start();
    }

    let (tx, rx) = unbounded_channel();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let engine = runtime.block_on(async {
        let (engine, ()) = tokio::join!(driver::run(engine, rx), read_commands(tx));
        engine
    });
    runtime.shutdown_background();

    let snap = engine.snapshot();
    println!();
    println!(
        "stopped at {} ({}), {} work sessions completed",
        snap.formatted_time, snap.session, snap.sessions_completed
    );
    Ok(())
}

/// Forward stdin lines as commands until `q` or end of input.
async fn read_commands(tx: UnboundedSender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read input");
                break;
            }
        };
        match parse_input(&line) {
            Ok(Some(command)) => {
                debug!(?command, "input");
                if tx.send(command).is_err() || command == Command::Shutdown {
                    return;
                }
            }
            Ok(None) => {}
            Err(message) => eprintln!("{message}\n{HELP}"),
        }
    }
    let _ = tx.send(Command::Shutdown);
}

fn parse_input(line: &str) -> std::result::Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(key) = parts.next() else {
        return Ok(None);
    };
    let mut amount = || -> std::result::Result<u32, String> {
        let raw = parts.next().ok_or_else(|| format!("'{key}' needs a number"))?;
        raw.parse()
            .map_err(|_| format!("cannot parse '{raw}' as a whole number"))
    };

    let command = match key {
        "s" => Command::Toggle,
        "p" => Command::Pause,
        "r" => Command::Reset,
        "n" => Command::Skip,
        "q" => Command::Shutdown,
        "w" => Command::SetWorkMinutes(amount()?),
        "b" => Command::SetShortBreakMinutes(amount()?),
        "l" => Command::SetLongBreakMinutes(amount()?),
        "e" => Command::SetSessionsUntilLongBreak(amount()?),
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(command))
}

fn status_line(session: Session, time: &str, progress: f64) -> String {
    let pct = progress.clamp(0.0, 100.0);
    let filled = ((pct / 100.0) * BAR_WIDTH as f64).round() as usize;
    let marker = if is_critical(time) { " !" } else { "" };
    format!(
        "{:<13} {}{}  [{}{}] {:>3.0}%",
        session.label(),
        time,
        marker,
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        pct
    )
}

fn completion_message(finished: Session, next: Session) -> String {
    let name = finished.as_str();
    let mut chars = name.chars();
    let title = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("{title} session completed! Starting {next} session.")
}

/// True in the last ten seconds of a session.
fn is_critical(time: &str) -> bool {
    let Some((min, sec)) = time.split_once(':') else {
        return false;
    };
    match (min.parse::<u64>(), sec.parse::<u64>()) {
        (Ok(min), Ok(sec)) => min * 60 + sec <= CRITICAL_SECS,
        _ => false,
    }
}
