//! Filesystem Support
//!
//! This module contains the Virtual File System (VFS) layer, the MelloFS
//! filesystem type and the filesystem syscalls.

pub mod mfs;
pub mod syscalls;
pub mod vfs;

use alloc::sync::Arc;

use crate::drivers::DevId;
use self::mfs::Mfs;
use self::vfs::{FileMode, FsError, FsResult, FsTypeId, Process, Vfs};

/// Registry id of MelloFS
pub const MFS_TYPE: FsTypeId = 0;

/// Install `vfs` as the global instance and bring up its root filesystem
pub fn init(vfs: Vfs, root_dev: DevId) -> FsResult<&'static Vfs> {
    let vfs = vfs::init(vfs);
    boot(vfs, root_dev)?;
    Ok(vfs)
}

/// Register the built-in filesystem types and mount the root filesystem
pub fn boot(vfs: &Vfs, root_dev: DevId) -> FsResult<()> {
    log_info!("VFS", "Initializing Virtual File System...");

    let mfs = Arc::new(Mfs::new(vfs.devices().clone()));
    vfs.registry().register(MFS_TYPE, mfs)?;

    vfs.mount_root(root_dev, MFS_TYPE)?;
    log_info!("VFS", "Root filesystem mounted from {}", root_dev);

    create_initial_directories(vfs)?;
    log_info!("VFS", "Virtual File System initialization complete");
    Ok(())
}

/// Create the standard top-level directories if they are missing
fn create_initial_directories(vfs: &Vfs) -> FsResult<()> {
    let proc = Process::new(vfs, 0, 0)?;

    for (path, perm) in [("/dev", 0o755), ("/mnt", 0o755), ("/tmp", 0o1777)] {
        match vfs.create(&proc, path, FileMode::new(FileMode::S_IFDIR | perm)) {
            Ok(_) => log_info!("VFS", "Created {} directory", path),
            Err(FsError::AlreadyExists) => {}
            Err(e) => log_warn!("VFS", "Could not create {}: {}", path, e),
        }
    }
    Ok(())
}
