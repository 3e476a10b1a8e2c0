//! Synchronization primitives for the filesystem core
//!
//! Structural tables (inode cache bookkeeping, mount table, filesystem
//! registry, device switch) are guarded by `spin::Mutex`. Inode contents are
//! guarded by a per-inode sleep lock built from a LOCKED flag and a
//! [`WaitChannel`].
//!
//! # Lock Ordering
//!
//! 1. **Inode sleep locks** - held across disk I/O and path walks
//! 2. **Mount table** - short critical sections, never across I/O
//! 3. **Filesystem registry / device switch** - clone the handle, then drop
//! 4. **Inode cache table** - innermost, never held while sleeping
//!
//! A task never sleeps while holding a spin lock. Waiters snapshot the
//! channel ticket under the inode cache table lock, drop it, and then sleep.

pub mod wait;

pub use wait::{Sleeper, SpinSleeper, WaitChannel};
