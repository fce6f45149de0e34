use std::time::Duration;

/// The engine's handle on its periodic tick.
///
/// Holds no timer itself. Whoever schedules real ticks watches
/// [`generation`](Self::generation) and [`is_armed`](Self::is_armed) and
/// rebuilds its schedule when either changes. Every arm bumps the
/// generation, so a tick scheduled under an older arm is recognisably stale.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSource {
    generation: u64,
    armed: bool,
}

impl TickSource {
    pub const PERIOD: Duration = Duration::from_secs(1);

    pub(crate) fn arm(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.armed = true;
    }

    pub(crate) fn cancel(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if a tick scheduled under `generation` may still fire.
    pub fn accepts(&self, generation: u64) -> bool {
        self.armed && self.generation == generation
    }
}
