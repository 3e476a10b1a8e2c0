//! System time source
//!
//! The filesystem only needs a monotonically advancing "current time" to
//! stamp inodes. The timer interrupt handler owns the real clock and
//! advances it through `TickClock::tick`.

use core::sync::atomic::{AtomicU64, Ordering};

/// Source of `CURRENT_TIME`
pub trait Clock: Send + Sync {
    /// Current time in seconds
    fn now(&self) -> u64;
}

/// Clock driven by timer ticks
#[derive(Debug, Default)]
pub struct TickClock {
    seconds: AtomicU64,
}

impl TickClock {
    pub const fn new(start: u64) -> Self {
        Self {
            seconds: AtomicU64::new(start),
        }
    }

    /// Advance the clock by one second
    pub fn tick(&self) {
        self.seconds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set(&self, seconds: u64) {
        self.seconds.store(seconds, Ordering::Relaxed);
    }
}

impl Clock for TickClock {
    fn now(&self) -> u64 {
        self.seconds.load(Ordering::Relaxed)
    }
}
