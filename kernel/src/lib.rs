//! MelloOS filesystem core
//!
//! The in-core half of the filesystem: a fixed inode cache with per-inode
//! sleep locks, the mount table that stitches several filesystem instances
//! into one namespace, the filesystem-type registry and the path resolver
//! that walks across mount boundaries. The device switch and the `mfs`
//! on-disk format sit underneath it.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod klog;

pub mod clock;
pub mod config;
pub mod drivers;
pub mod fs;
pub mod sync;

pub use fs::vfs::{
    FsError, FsResult, InodeData, InodeFlags, InodeId, InodeRef, LockedInode, Process, Vfs,
};
