//! Virtual File System (VFS) Layer
//!
//! The in-core side of the filesystem: the inode cache, the mount table,
//! the path resolver and the filesystem-type registry. Concrete filesystem
//! types plug in through [`FsType`]; block I/O reaches devices through the
//! [`DeviceSwitch`].
//!
//! Everything hangs off one [`Vfs`] value. The kernel keeps a single global
//! instance behind [`init`] / [`vfs`]; tests build their own.

pub mod dentry;
pub mod error;
pub mod icache;
pub mod inode;
pub mod lifecycle;
pub mod mount;
pub mod path;
pub mod pipe;
pub mod registry;
pub mod superblock;

use alloc::sync::Arc;
use spin::{Mutex, Once};

use crate::clock::{Clock, TickClock};
use crate::config::FsConfig;
use crate::drivers::DeviceSwitch;
use crate::sync::{Sleeper, SpinSleeper};

// Re-export commonly used items
pub use dentry::{DirEntry, DIRENT_SIZE};
pub use error::{FsError, FsResult};
pub use icache::{InodeCache, SlotId};
pub use inode::{FileMode, InodeData, InodeFlags, InodeId, InodeNum, InodeRef, LockedInode};
pub use inode::{MAY_EXEC, MAY_READ, MAY_WRITE};
pub use mount::{MountRecord, MountTable};
pub use path::{break_path, permission, Process};
pub use pipe::{PagePool, PipeBuffer};
pub use registry::FsRegistry;
pub use superblock::{FsType, FsTypeId, SuperBlock};

/// The filesystem core
pub struct Vfs {
    config: FsConfig,
    pub(crate) cache: InodeCache,
    pub(crate) mounts: Mutex<MountTable>,
    pub(crate) registry: FsRegistry,
    devices: Arc<DeviceSwitch>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pages: PagePool,
}

impl Vfs {
    /// Build an empty core sized by `config`
    ///
    /// Nothing is registered or mounted yet.
    pub fn new(
        config: FsConfig,
        devices: Arc<DeviceSwitch>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            cache: InodeCache::new(config.inode_slots, config.hash_buckets, sleeper),
            mounts: Mutex::new(MountTable::new(config.mount_slots)),
            registry: FsRegistry::new(config.fs_types),
            pages: PagePool::new(config.pipe_pages),
            config,
            devices,
            clock,
        }
    }

    /// Core with a tick clock starting at zero and spinning waits
    pub fn with_config(config: FsConfig, devices: Arc<DeviceSwitch>) -> Self {
        Self::new(config, devices, Arc::new(TickClock::new(0)), Arc::new(SpinSleeper))
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn cache(&self) -> &InodeCache {
        &self.cache
    }

    pub fn registry(&self) -> &FsRegistry {
        &self.registry
    }

    pub fn devices(&self) -> &Arc<DeviceSwitch> {
        &self.devices
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn pages(&self) -> &PagePool {
        &self.pages
    }
}

/// Global VFS instance
static VFS: Once<Vfs> = Once::new();

/// Install the global VFS
///
/// Later calls keep the first instance.
pub fn init(vfs: Vfs) -> &'static Vfs {
    VFS.call_once(|| vfs)
}

/// Get the global VFS
///
/// # Panics
/// Panics if [`init`] has not run.
pub fn vfs() -> &'static Vfs {
    match VFS.get() {
        Some(vfs) => vfs,
        None => kpanic!("VFS", "filesystem used before initialization"),
    }
}

/// Get the global VFS if it has been installed
pub fn try_vfs() -> Option<&'static Vfs> {
    VFS.get()
}
