//! Configuration constants for the MelloOS filesystem core

use crate::drivers::{DevId, RAMDISK_MAJOR};

/// Number of in-core inode slots
pub const NR_INODES: usize = 64;

/// Number of hash buckets in the inode cache
pub const HASHTAB_SIZE: usize = 227;

/// Number of mount table slots (slot 0 is the root filesystem)
pub const NR_MOUNTING_POINT: usize = 8;

/// Number of filesystem-type registry slots
pub const NR_FILE_SYSTEM: usize = 4;

/// Maximum length of a path component
pub const NAME_MAX: usize = 14;

/// Name prefix of semaphore files
pub const SEM_PREFIX: &str = "sem.";

/// Size of a memory page (pipe buffers are one page)
pub const PAGE_SIZE: usize = 4096;

/// Filesystem block size
pub const BLOCK_SIZE: usize = 1024;

/// Number of block pointers kept in an in-core inode
pub const NR_ZONES: usize = 12;

/// Number of character device majors
pub const NR_CHRDEV: usize = 3;

/// Number of block device majors
pub const NR_BLKDEV: usize = 2;

/// Pages available for pipe buffers
pub const NR_PIPE_PAGES: usize = 16;

/// Device holding the root filesystem
pub const ROOT_DEV: DevId = DevId::new(RAMDISK_MAJOR, 0);

/// Inode number of a filesystem's root directory
pub const INODE_ROOT: u32 = 1;

/// Inode number meaning "no inode"
pub const INODE_NULL: u32 = 0;

/// Sizes of the fixed kernel tables
///
/// Everything is allocated once in `Vfs::new` and never grows afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConfig {
    /// In-core inode slots
    pub inode_slots: usize,
    /// Inode cache hash buckets
    pub hash_buckets: usize,
    /// Mount table slots
    pub mount_slots: usize,
    /// Filesystem-type registry slots
    pub fs_types: usize,
    /// Pages that may back pipes
    pub pipe_pages: usize,
}

impl FsConfig {
    pub const fn new() -> Self {
        Self {
            inode_slots: NR_INODES,
            hash_buckets: HASHTAB_SIZE,
            mount_slots: NR_MOUNTING_POINT,
            fs_types: NR_FILE_SYSTEM,
            pipe_pages: NR_PIPE_PAGES,
        }
    }

    pub const fn with_inode_slots(mut self, slots: usize) -> Self {
        self.inode_slots = slots;
        self
    }

    pub const fn with_hash_buckets(mut self, buckets: usize) -> Self {
        self.hash_buckets = buckets;
        self
    }

    pub const fn with_mount_slots(mut self, slots: usize) -> Self {
        self.mount_slots = slots;
        self
    }

    pub const fn with_fs_types(mut self, types: usize) -> Self {
        self.fs_types = types;
        self
    }

    pub const fn with_pipe_pages(mut self, pages: usize) -> Self {
        self.pipe_pages = pages;
        self
    }
}

impl Default for FsConfig {
    fn default() -> Self {
        Self::new()
    }
}
