//! Mounting, unmounting and crossing mount boundaries

mod common;

use common::{boot, boot_with, dir_mode, file_mode, Fixture};
use mellos_vfs::config::{FsConfig, INODE_ROOT, ROOT_DEV};
use mellos_vfs::drivers::{DevId, ATA_MAJOR, RAMDISK_MAJOR};
use mellos_vfs::fs::vfs::{InodeFlags, InodeId};
use mellos_vfs::FsError;

/// Boot, attach a formatted disk as /dev/d1 and return its device number
fn with_disk() -> (Fixture, DevId) {
    let fx = boot();
    let dev = fx.add_disk(32, 64);
    fx.mknod_blk("/dev/d1", dev);
    (fx, dev)
}

#[test]
fn test_mount_enters_device_root() {
    let (fx, dev) = with_disk();
    let proc = fx.root_proc();
    let mnt = fx.vfs.inode_nameb(&proc, "/mnt").unwrap().id();

    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();

    let record = fx.vfs.mount_record(1).unwrap();
    assert_eq!(record.dev, dev);
    assert_eq!(record.mount_id(), Some(mnt));
    assert_eq!(record.root_id(), InodeId::new(dev, INODE_ROOT));
    assert!(fx.vfs.is_mounted(dev));

    assert_eq!(fx.vfs.inode_name(&proc, "/mnt").unwrap().id(), InodeId::new(dev, INODE_ROOT));
    assert_eq!(fx.vfs.inode_name(&proc, "/mnt/.").unwrap().id(), InodeId::new(dev, INODE_ROOT));
    // Without crossing, the final component stays on the mount point
    assert_eq!(fx.vfs.inode_nameb(&proc, "/mnt").unwrap().id(), mnt);
}

#[test]
fn test_mount_point_tagged_on_load() {
    let (fx, _) = with_disk();
    let proc = fx.root_proc();
    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();

    // Nothing holds /mnt, so this is a fresh load
    let mnt = fx.vfs.inode_nameb(&proc, "/mnt").unwrap();
    assert!(mnt.flags().contains(InodeFlags::MOUNT | InodeFlags::VALID));
    drop(mnt);

    let tmp = fx.vfs.inode_nameb(&proc, "/tmp").unwrap();
    assert!(!tmp.flags().contains(InodeFlags::MOUNT));
}

#[test]
fn test_dotdot_leaves_mount() {
    let (fx, dev) = with_disk();
    let proc = fx.root_proc();
    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();
    fx.vfs.create(&proc, "/mnt/sub", dir_mode(0o755)).unwrap();

    let root = fx.vfs.inode_name(&proc, "/").unwrap().id();
    let mnt_root = InodeId::new(dev, INODE_ROOT);

    assert_eq!(fx.vfs.inode_name(&proc, "/mnt/..").unwrap().id(), root);
    assert_ne!(fx.vfs.inode_name(&proc, "/mnt/..").unwrap().id(), mnt_root);
    assert_eq!(fx.vfs.inode_name(&proc, "/mnt/sub/..").unwrap().id(), mnt_root);
    assert_eq!(fx.vfs.inode_name(&proc, "/mnt/sub/../..").unwrap().id(), root);
    assert!(fx.vfs.inode_name(&proc, "/mnt/../tmp").unwrap().is_directory());

    let mut proc = proc;
    proc.chdir("/mnt/sub").unwrap();
    assert_eq!(fx.vfs.inode_name(&proc, "../..").unwrap().id(), root);
}

#[test]
fn test_cross_up_returns_mount_point() {
    let (fx, dev) = with_disk();
    let proc = fx.root_proc();
    let mnt = fx.vfs.inode_nameb(&proc, "/mnt").unwrap().id();
    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();

    let mounted_root = fx.vfs.inode_get(dev, INODE_ROOT).unwrap();
    let up = fx.vfs.cross_up(mounted_root).unwrap();
    assert_eq!(up.id(), mnt);

    // Crossing back down lands on the mounted root again
    let down = fx.vfs.cross_down(up).unwrap();
    assert_eq!(down.id(), InodeId::new(dev, INODE_ROOT));
    drop(down);

    // The global root crosses nowhere
    let root = fx.vfs.inode_get(ROOT_DEV, INODE_ROOT).unwrap();
    assert_eq!(fx.vfs.cross_up(root).unwrap().id(), InodeId::new(ROOT_DEV, INODE_ROOT));
}

#[test]
fn test_files_live_on_mounted_device() {
    let (fx, dev) = with_disk();
    let proc = fx.root_proc();
    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();

    let ip = fx.vfs.create(&proc, "/mnt/hello", file_mode(0o644)).unwrap();
    assert_eq!(ip.dev, dev);
    drop(ip);

    fx.vfs.unmount(&proc, "/mnt").unwrap();
    assert_eq!(fx.vfs.inode_name(&proc, "/mnt/hello").err(), Some(FsError::NotFound));

    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();
    assert_eq!(fx.vfs.inode_name(&proc, "/mnt/hello").unwrap().dev, dev);
}

#[test]
fn test_unmount_restores_state() {
    let (fx, dev) = with_disk();
    let proc = fx.root_proc();
    let free = fx.vfs.cache().free_count();

    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();
    fx.vfs.create(&proc, "/mnt/x", dir_mode(0o755)).unwrap();
    fx.vfs.unmount(&proc, "/mnt").unwrap();

    assert!(fx.vfs.mount_record(1).is_none());
    assert!(!fx.vfs.is_mounted(dev));
    assert_eq!(fx.vfs.superblock(dev).err(), Some(FsError::NoDevice));
    assert_eq!(fx.vfs.cache().free_count(), free);
    assert!(!fx.vfs.cache().in_use_on(dev));

    let mnt = fx.vfs.inode_name(&proc, "/mnt").unwrap();
    assert_eq!(mnt.dev, ROOT_DEV);
    assert!(!mnt.flags().contains(InodeFlags::MOUNT));
}

#[test]
fn test_unmount_busy_while_referenced() {
    let (fx, _) = with_disk();
    let mut proc = fx.root_proc();
    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();

    let held = fx.vfs.inode_name(&proc, "/mnt").unwrap().unlock();
    assert_eq!(fx.vfs.unmount(&proc, "/mnt"), Err(FsError::Busy));
    drop(held);

    proc.chdir("/mnt").unwrap();
    assert_eq!(fx.vfs.unmount(&proc, "/mnt"), Err(FsError::Busy));
    proc.chdir("/").unwrap();

    assert_eq!(fx.vfs.unmount(&proc, "/mnt"), Ok(()));
}

#[test]
fn test_unmount_requires_mount_point() {
    let (fx, _) = with_disk();
    let proc = fx.root_proc();
    fx.vfs.create(&proc, "/tmp/f", file_mode(0o644)).unwrap();

    assert_eq!(fx.vfs.unmount(&proc, "/tmp"), Err(FsError::InvalidArgument));
    assert_eq!(fx.vfs.unmount(&proc, "/tmp/f"), Err(FsError::NotDirectory));
    assert_eq!(fx.vfs.unmount(&proc, "/none"), Err(FsError::NotFound));
}

#[test]
fn test_mount_argument_errors() {
    let (fx, _) = with_disk();
    let proc = fx.root_proc();
    fx.vfs.create(&proc, "/tmp/f", file_mode(0o644)).unwrap();

    assert_eq!(fx.vfs.mount(&proc, "/tmp", "/mnt"), Err(FsError::NoDevice));
    assert_eq!(fx.vfs.mount(&proc, "/dev/d1", "/tmp/f"), Err(FsError::NotDirectory));
    assert_eq!(fx.vfs.mount(&proc, "/dev/none", "/mnt"), Err(FsError::NotFound));
    assert_eq!(fx.vfs.mount_record(1).map(|r| r.dev), None);
}

#[test]
fn test_mount_busy_cases() {
    let (fx, dev) = with_disk();
    let other = fx.add_disk(32, 64);
    fx.mknod_blk("/dev/d2", other);
    let proc = fx.root_proc();

    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();
    assert_eq!(fx.vfs.mount(&proc, "/dev/d2", "/mnt"), Err(FsError::Busy));
    assert_eq!(fx.vfs.mount(&proc, "/dev/d1", "/tmp"), Err(FsError::Busy));

    // The first mount is left intact
    assert_eq!(fx.vfs.mount_record(1).map(|r| r.dev), Some(dev));
    assert!(!fx.vfs.is_mounted(other));
    assert_eq!(fx.vfs.mount(&proc, "/dev/d2", "/tmp"), Ok(()));
}

#[test]
fn test_mount_unrecognized_device() {
    let fx = boot();
    let blank = fx.add_blank_disk(64);
    fx.mknod_blk("/dev/blank", blank);
    fx.mknod_blk("/dev/ghost", DevId::new(RAMDISK_MAJOR, 9));
    fx.mknod_blk("/dev/hd0", DevId::new(ATA_MAJOR, 0));
    let proc = fx.root_proc();

    for node in ["/dev/blank", "/dev/ghost", "/dev/hd0"] {
        assert_eq!(fx.vfs.mount(&proc, node, "/mnt"), Err(FsError::NotSupported));
    }
    assert!(fx.vfs.mount_record(1).is_none());
}

#[test]
fn test_mount_table_full() {
    let fx = boot_with(FsConfig::new().with_mount_slots(2));
    let first = fx.add_disk(32, 64);
    let second = fx.add_disk(32, 64);
    fx.mknod_blk("/dev/d1", first);
    fx.mknod_blk("/dev/d2", second);
    let proc = fx.root_proc();

    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();
    assert_eq!(fx.vfs.mount(&proc, "/dev/d2", "/tmp"), Err(FsError::NoSpace));
    assert!(!fx.vfs.is_mounted(second));

    fx.vfs.unmount(&proc, "/mnt").unwrap();
    assert_eq!(fx.vfs.mount(&proc, "/dev/d2", "/tmp"), Ok(()));
}

#[test]
fn test_nested_mounts() {
    let (fx, first) = with_disk();
    let second = fx.add_disk(32, 64);
    fx.mknod_blk("/dev/d2", second);
    let proc = fx.root_proc();

    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();
    fx.vfs.create(&proc, "/mnt/inner", dir_mode(0o755)).unwrap();
    fx.vfs.mount(&proc, "/dev/d2", "/mnt/inner").unwrap();

    let inner = fx.vfs.inode_name(&proc, "/mnt/inner").unwrap().id();
    assert_eq!(inner, InodeId::new(second, INODE_ROOT));
    assert_eq!(fx.vfs.inode_name(&proc, "/mnt/inner/..").unwrap().id(), InodeId::new(first, INODE_ROOT));
    assert_eq!(
        fx.vfs.inode_name(&proc, "/mnt/inner/../..").unwrap().id(),
        InodeId::new(ROOT_DEV, INODE_ROOT)
    );

    // Detach bottom-up
    assert_eq!(fx.vfs.unmount(&proc, "/mnt/inner"), Ok(()));
    assert_eq!(fx.vfs.unmount(&proc, "/mnt"), Ok(()));
}

#[test]
fn test_unmount_outer_busy_while_nested() {
    let (fx, first) = with_disk();
    let second = fx.add_disk(32, 64);
    fx.mknod_blk("/dev/d2", second);
    let proc = fx.root_proc();

    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();
    fx.vfs.create(&proc, "/mnt/inner", dir_mode(0o755)).unwrap();
    fx.vfs.mount(&proc, "/dev/d2", "/mnt/inner").unwrap();

    let mut user = fx.root_proc();
    user.chdir("/mnt/inner").unwrap();

    assert_eq!(fx.vfs.unmount(&proc, "/mnt"), Err(FsError::Busy));
    assert!(fx.vfs.is_mounted(first));

    // ".." from the inner root still lands on the outer device
    let up = fx.vfs.inode_name(&user, "..").unwrap().id();
    assert_eq!(up, InodeId::new(first, INODE_ROOT));

    user.chdir("/").unwrap();
    assert_eq!(fx.vfs.unmount(&proc, "/mnt/inner"), Ok(()));
    assert_eq!(fx.vfs.unmount(&proc, "/mnt"), Ok(()));
}

#[test]
fn test_mount_on_filesystem_root_is_busy() {
    let (fx, _) = with_disk();
    let second = fx.add_disk(32, 64);
    fx.mknod_blk("/dev/d2", second);
    let proc = fx.root_proc();

    assert_eq!(fx.vfs.mount(&proc, "/dev/d1", "/"), Err(FsError::Busy));
    assert!(fx.vfs.mount_record(1).is_none());

    fx.vfs.mount(&proc, "/dev/d1", "/mnt").unwrap();
    assert_eq!(fx.vfs.mount(&proc, "/dev/d2", "/mnt/."), Err(FsError::Busy));
    assert!(!fx.vfs.is_mounted(second));
    assert!(fx.vfs.mount_record(2).is_none());
}
