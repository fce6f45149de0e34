//! # Pomotimer Core Library
//!
//! This library provides the core logic for the Pomotimer Pomodoro timer:
//! the session state machine and the settings it is sized by. Rendering and
//! input capture live in front-ends such as `pomotimer-cli`.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A tick-driven state machine cycling Work, Short Break
//!   and Long Break sessions, with auto-advance between them
//! - **Driver**: A tokio loop that feeds the engine real one-second ticks
//!   and control commands
//! - **Storage**: A key-value backed settings blob that always loads,
//!   falling back to defaults on missing or corrupt data
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`SettingsStore`]: Persisted durations and preferences
//! - [`KvStore`]: Trait for the persistence backend

pub mod error;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, StoreError};
pub use storage::{open_settings, KvStore, MemoryKv, Settings, SettingsStore, SqliteKv};
pub use timer::{Command, Session, TickSource, TimerEngine, TimerSnapshot, TimerState};
