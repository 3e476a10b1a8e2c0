//! Wait channels
//!
//! A `WaitChannel` is the anchor a sleeping task waits on. Every wakeup is a
//! broadcast: all sleepers observe the ticket change, re-check their
//! condition, and the ones that lose the race go back to sleep. There is no
//! FIFO ordering between waiters.

use core::sync::atomic::{AtomicU64, Ordering};

/// Broadcast wakeup anchor
#[derive(Debug, Default)]
pub struct WaitChannel {
    ticket: AtomicU64,
}

impl WaitChannel {
    pub const fn new() -> Self {
        Self {
            ticket: AtomicU64::new(0),
        }
    }

    /// Snapshot of the channel, taken while the awaited condition is false
    pub fn ticket(&self) -> u64 {
        self.ticket.load(Ordering::Acquire)
    }

    /// Has the channel been signalled since `ticket` was taken?
    pub fn fired_since(&self, ticket: u64) -> bool {
        self.ticket() != ticket
    }

    /// Wake every task sleeping on this channel
    pub fn wake_all(&self) {
        self.ticket.fetch_add(1, Ordering::AcqRel);
    }
}

/// Scheduler hook used to block the calling task
///
/// The kernel scheduler implements this to deschedule the current task. The
/// default `sleep` polls the channel and calls `relax` between polls.
pub trait Sleeper: Send + Sync {
    /// Give the CPU away for a moment
    fn relax(&self);

    /// Block until `chan` fires past `ticket`
    fn sleep(&self, chan: &WaitChannel, ticket: u64) {
        while !chan.fired_since(ticket) {
            self.relax();
        }
    }

    /// Called after `chan` was signalled
    fn wakeup(&self, _chan: &WaitChannel) {}
}

/// Busy-waiting sleeper for early boot and single-CPU configurations
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinSleeper;

impl Sleeper for SpinSleeper {
    fn relax(&self) {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_ticket_changes_on_wake() {
        let chan = WaitChannel::new();
        let ticket = chan.ticket();
        assert!(!chan.fired_since(ticket));

        chan.wake_all();
        assert!(chan.fired_since(ticket));

        // A fresh snapshot is quiet again
        assert!(!chan.fired_since(chan.ticket()));
    }

    #[test]
    fn test_sleep_returns_after_wake() {
        let chan = WaitChannel::new();
        let woke = AtomicBool::new(false);
        let ticket = chan.ticket();

        std::thread::scope(|s| {
            s.spawn(|| {
                SpinSleeper.sleep(&chan, ticket);
                woke.store(true, core::sync::atomic::Ordering::SeqCst);
            });
            chan.wake_all();
        });

        assert!(woke.load(core::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_wake_before_sleep_is_not_lost() {
        let chan = WaitChannel::new();
        let ticket = chan.ticket();
        chan.wake_all();
        // Must return immediately
        SpinSleeper.sleep(&chan, ticket);
    }
}
