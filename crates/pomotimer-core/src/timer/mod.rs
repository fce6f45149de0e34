pub mod driver;
mod engine;
mod session;
mod tick;

pub use driver::Command;
pub use engine::{TimerEngine, TimerSnapshot, TimerState};
pub use session::Session;
pub use tick::TickSource;
