//! Filesystem System Calls
//!
//! Integer-status wrappers over the VFS for the syscall dispatcher. Failures
//! leave the negative errno in the calling process's `errno`. Mount and
//! unmount report `0` or `1`; every other call reports `0` or the negative
//! errno.

use super::vfs::{FileMode, FsResult, FsTypeId, Process};
use crate::drivers::DevId;

fn status(proc: &mut Process<'_>, result: FsResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            proc.errno = e.errno();
            e.errno()
        }
    }
}

fn flag(proc: &mut Process<'_>, result: FsResult<()>) -> i32 {
    match status(proc, result) {
        0 => 0,
        _ => 1,
    }
}

/// mount(device, dir)
pub fn sys_mount(proc: &mut Process<'_>, dev_path: &str, mnt_path: &str) -> i32 {
    let result = proc.vfs().mount(proc, dev_path, mnt_path);
    flag(proc, result)
}

/// unmount(dir)
pub fn sys_unmount(proc: &mut Process<'_>, mnt_path: &str) -> i32 {
    let result = proc.vfs().unmount(proc, mnt_path);
    flag(proc, result)
}

/// mkfs(image, ninodes, nblocks, uid, gid)
pub fn sys_mkfs(
    proc: &mut Process<'_>,
    fs_id: FsTypeId,
    image: &mut [u8],
    ninodes: u32,
    nblocks: u32,
    uid: u16,
    gid: u16,
) -> i32 {
    let result = proc.vfs().mkfs(fs_id, image, ninodes, nblocks, uid, gid);
    status(proc, result)
}

/// mkdir(path, mode)
pub fn sys_mkdir(proc: &mut Process<'_>, path: &str, perm: u16) -> i32 {
    let mode = FileMode::new(FileMode::S_IFDIR | (perm & 0o7777));
    let result = proc.vfs().create(proc, path, mode).map(drop);
    status(proc, result)
}

/// mknod(path, mode, dev)
pub fn sys_mknod(proc: &mut Process<'_>, path: &str, mode: u16, dev: DevId) -> i32 {
    let result = proc.vfs().mknod(proc, path, FileMode::new(mode), dev).map(drop);
    status(proc, result)
}

/// rename(old path, new name)
pub fn sys_rename(proc: &mut Process<'_>, old_path: &str, new_name: &str) -> i32 {
    let result = proc.vfs().inode_rename(proc, old_path, new_name);
    status(proc, result)
}

/// chdir(path)
pub fn sys_chdir(proc: &mut Process<'_>, path: &str) -> i32 {
    let result = proc.chdir(path);
    status(proc, result)
}

/// chroot(path)
pub fn sys_chroot(proc: &mut Process<'_>, path: &str) -> i32 {
    let result = proc.chroot(path);
    status(proc, result)
}

/// sync()
pub fn sys_sync(proc: &mut Process<'_>) -> i32 {
    proc.vfs().inode_sync();
    0
}
