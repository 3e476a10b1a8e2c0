//! Mount Table
//!
//! Fixed array of mount records. Slot 0 is the root filesystem; every other
//! occupied slot stitches a mounted device's root directory onto a directory
//! of an already mounted device. The record is enough to cross the boundary
//! in both directions:
//!
//! - down: `(dev_r, mount_num)` is replaced by `(dev, root_num)`
//! - up: `(dev, root_num)` is replaced by `(dev_r, mount_num)`

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::inode::{InodeFlags, InodeId, InodeNum, LockedInode};
use super::path::Process;
use super::superblock::{FsType, FsTypeId, SuperBlock};
use super::{FsError, FsResult, Vfs};
use crate::drivers::DevId;

/// One mounted filesystem
#[derive(Debug, Clone)]
pub struct MountRecord {
    /// Device holding the mounted filesystem
    pub dev: DevId,
    pub fs: FsTypeId,
    /// Device the mount-point directory lives on
    pub dev_r: DevId,
    /// Root inode of the mounted filesystem
    pub root_num: InodeNum,
    /// Mount-point directory; `None` for the root filesystem
    pub mount_num: Option<InodeNum>,
    pub sb: SuperBlock,
}

impl MountRecord {
    /// Identity of the mounted root
    pub fn root_id(&self) -> InodeId {
        InodeId::new(self.dev, self.root_num)
    }

    /// Identity of the directory this is mounted on
    pub fn mount_id(&self) -> Option<InodeId> {
        self.mount_num.map(|num| InodeId::new(self.dev_r, num))
    }
}

/// Global mount table
pub struct MountTable {
    slots: Vec<Option<MountRecord>>,
}

impl MountTable {
    pub fn new(slots: usize) -> Self {
        let mut table = Vec::with_capacity(slots);
        table.resize_with(slots, || None);
        Self { slots: table }
    }

    pub fn get(&self, slot: usize) -> Option<&MountRecord> {
        self.slots.get(slot).and_then(|r| r.as_ref())
    }

    /// First free slot after the root slot
    pub fn find_free(&self) -> Option<usize> {
        (1..self.slots.len()).find(|&i| self.slots[i].is_none())
    }

    /// Record mounted on directory `id`, if any
    pub fn is_mount_point(&self, id: InodeId) -> Option<(usize, &MountRecord)> {
        self.occupied().find(|(_, r)| r.mount_id() == Some(id))
    }

    /// Record whose mounted root is `id`
    ///
    /// The root filesystem in slot 0 is never crossed upward and is skipped.
    pub fn is_fs_root(&self, id: InodeId) -> Option<(usize, &MountRecord)> {
        self.occupied().filter(|&(i, _)| i != 0).find(|(_, r)| r.root_id() == id)
    }

    /// Is `id` the root directory of any mounted filesystem?
    pub fn is_any_root(&self, id: InodeId) -> bool {
        self.occupied().any(|(_, r)| r.root_id() == id)
    }

    /// Is another filesystem mounted on a directory of `dev`?
    pub fn has_mounts_on(&self, dev: DevId) -> bool {
        self.occupied().any(|(_, r)| r.mount_num.is_some() && r.dev_r == dev)
    }

    /// Filesystem type serving `dev`
    pub fn fs_for_device(&self, dev: DevId) -> Option<FsTypeId> {
        self.occupied().find(|(_, r)| r.dev == dev).map(|(_, r)| r.fs)
    }

    /// Superblock of the filesystem on `dev`
    pub fn superblock(&self, dev: DevId) -> Option<&SuperBlock> {
        self.occupied().find(|(_, r)| r.dev == dev).map(|(_, r)| &r.sb)
    }

    pub fn is_mounted(&self, dev: DevId) -> bool {
        self.fs_for_device(dev).is_some()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.occupied().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn occupied(&self) -> impl Iterator<Item = (usize, &MountRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (i, r)))
    }

    fn set(&mut self, slot: usize, record: MountRecord) {
        self.slots[slot] = Some(record);
    }

    fn clear(&mut self, slot: usize) -> Option<MountRecord> {
        self.slots[slot].take()
    }
}

impl Vfs {
    /// Filesystem type that owns `dev`
    ///
    /// # Panics
    /// Panics if nothing is mounted from `dev`, or if the mounted type id is
    /// not registered. Either means the cache holds an inode it cannot write.
    pub(crate) fn fs_for(&self, dev: DevId) -> Arc<dyn FsType> {
        let id = self.mounts.lock().fs_for_device(dev);
        let Some(id) = id else {
            kpanic!("VFS", "no filesystem mounted from device {}", dev);
        };
        match self.registry.get(id) {
            Some(fs) => fs,
            None => kpanic!("VFS", "filesystem type {} of device {} is not registered", id, dev),
        }
    }

    /// Superblock of the filesystem mounted from `dev`
    pub fn superblock(&self, dev: DevId) -> FsResult<SuperBlock> {
        self.mounts.lock().superblock(dev).cloned().ok_or(FsError::NoDevice)
    }

    /// Mount record in `slot`
    pub fn mount_record(&self, slot: usize) -> Option<MountRecord> {
        self.mounts.lock().get(slot).cloned()
    }

    /// Is anything mounted from `dev`?
    pub fn is_mounted(&self, dev: DevId) -> bool {
        self.mounts.lock().is_mounted(dev)
    }

    /// Install the root filesystem in mount slot 0
    pub fn mount_root(&self, dev: DevId, fs_id: FsTypeId) -> FsResult<()> {
        let fs = self.registry.get(fs_id).ok_or(FsError::InvalidArgument)?;

        if self.mounts.lock().get(0).is_some() {
            return Err(FsError::Busy);
        }

        let mut sb = fs.probe(dev)?;
        sb.fs_type = fs_id;

        let mut mounts = self.mounts.lock();
        if mounts.get(0).is_some() {
            return Err(FsError::Busy);
        }
        mounts.set(
            0,
            MountRecord {
                dev,
                fs: fs_id,
                dev_r: dev,
                root_num: sb.root,
                mount_num: None,
                sb,
            },
        );

        log_info!("MOUNT", "root filesystem '{}' on device {}", fs.name(), dev);
        Ok(())
    }

    /// Replace a mount-point directory by the root of what is mounted on it
    ///
    /// Anything else is handed back unchanged. The crossed inode's reference
    /// is released.
    pub fn cross_down<'v>(&'v self, ip: LockedInode<'v>) -> FsResult<LockedInode<'v>> {
        let target = self
            .mounts
            .lock()
            .is_mount_point(ip.id())
            .map(|(_, r)| r.root_id());

        match target {
            Some(root) => {
                drop(ip);
                self.inode_get(root.dev, root.num)
            }
            None => Ok(ip),
        }
    }

    /// Replace a mounted root by the directory it is mounted on
    ///
    /// Anything else is handed back unchanged. The crossed inode's reference
    /// is released.
    pub fn cross_up<'v>(&'v self, ip: LockedInode<'v>) -> FsResult<LockedInode<'v>> {
        let target = self
            .mounts
            .lock()
            .is_fs_root(ip.id())
            .and_then(|(_, r)| r.mount_id());

        match target {
            Some(dir) => {
                drop(ip);
                self.inode_get(dir.dev, dir.num)
            }
            None => Ok(ip),
        }
    }

    /// Mount the filesystem on device node `dev_path` at directory `mnt_path`
    pub fn mount(&self, proc: &Process<'_>, dev_path: &str, mnt_path: &str) -> FsResult<()> {
        let dev = {
            let ip = self.inode_nameb(proc, dev_path)?;
            if !ip.mode.is_device() {
                log_warn!("MOUNT", "{} is not a device", dev_path);
                return Err(FsError::NoDevice);
            }
            ip.rdev()
        };

        // Held locked until the mount is committed
        let mnt = self.inode_nameb(proc, mnt_path)?;
        if !mnt.is_directory() {
            log_warn!("MOUNT", "{} is not a directory", mnt_path);
            return Err(FsError::NotDirectory);
        }
        let mnt_id = mnt.id();

        {
            let mounts = self.mounts.lock();
            if mounts.is_mount_point(mnt_id).is_some() {
                log_warn!("MOUNT", "{} is already a mount point", mnt_path);
                return Err(FsError::Busy);
            }
            if mounts.is_any_root(mnt_id) {
                log_warn!("MOUNT", "{} is the root of a mounted filesystem", mnt_path);
                return Err(FsError::Busy);
            }
            if mounts.is_mounted(dev) {
                log_warn!("MOUNT", "device {} is already mounted", dev);
                return Err(FsError::Busy);
            }
        }

        let sb = self.registry.probe(dev).map_err(|e| {
            log_warn!("MOUNT", "no filesystem recognizes device {}", dev);
            e
        })?;
        let record = MountRecord {
            dev,
            fs: sb.fs_type,
            dev_r: mnt_id.dev,
            root_num: sb.root,
            mount_num: Some(mnt_id.num),
            sb,
        };

        let fs_id = record.fs;
        let claimed = {
            let mut mounts = self.mounts.lock();
            let taken = mounts.is_mount_point(mnt_id).is_some()
                || mounts.is_any_root(mnt_id)
                || mounts.is_mounted(dev);
            if taken {
                Err(FsError::Busy)
            } else if let Some(slot) = mounts.find_free() {
                mounts.set(slot, record);
                Ok(slot)
            } else {
                log_warn!("MOUNT", "mount table full");
                Err(FsError::NoSpace)
            }
        };
        let slot = match claimed {
            Ok(slot) => slot,
            Err(e) => {
                // A racing mount of the same device keeps its state
                if !self.is_mounted(dev) {
                    if let Some(fs) = self.registry.get(fs_id) {
                        fs.release(dev);
                    }
                }
                return Err(e);
            }
        };

        // The mounted root must load before the mount becomes visible
        let root = self.mounts.lock().get(slot).map(|r| r.root_id());
        let loaded = match root {
            Some(root) => self.inode_get(root.dev, root.num).map(drop),
            None => Err(FsError::InvalidArgument),
        };
        if let Err(e) = loaded {
            log_warn!("MOUNT", "root of device {} failed to load: {}", dev, e);
            if let Some(record) = self.mounts.lock().clear(slot) {
                self.release_fs_state(&record);
            }
            return Err(e);
        }

        mnt.set_flags(InodeFlags::MOUNT);
        log_info!("MOUNT", "device {} mounted on {} (slot {})", dev, mnt_path, slot);
        Ok(())
    }

    /// Detach whatever is mounted on directory `mnt_path`
    pub fn unmount(&self, proc: &Process<'_>, mnt_path: &str) -> FsResult<()> {
        let mnt = self.inode_nameb(proc, mnt_path)?;
        if !mnt.is_directory() {
            return Err(FsError::NotDirectory);
        }

        let record = {
            let mut mounts = self.mounts.lock();
            let Some((slot, dev)) = mounts.is_mount_point(mnt.id()).map(|(i, r)| (i, r.dev)) else {
                log_warn!("MOUNT", "{} is not a mount point", mnt_path);
                return Err(FsError::InvalidArgument);
            };
            if mounts.has_mounts_on(dev) {
                log_warn!("MOUNT", "device {} has filesystems mounted on it", dev);
                return Err(FsError::Busy);
            }
            if self.cache.in_use_on(dev) {
                log_warn!("MOUNT", "device {} is busy", dev);
                return Err(FsError::Busy);
            }
            mounts.clear(slot)
        };

        mnt.clear_flags(InodeFlags::MOUNT);
        if let Some(record) = record {
            self.release_fs_state(&record);
            log_info!("MOUNT", "device {} unmounted from {}", record.dev, mnt_path);
        }
        Ok(())
    }

    fn release_fs_state(&self, record: &MountRecord) {
        if let Some(fs) = self.registry.get(record.fs) {
            fs.release(record.dev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(dev: u8, dev_r: u8, mount_num: Option<InodeNum>) -> MountRecord {
        let dev = DevId::new(0, dev);
        MountRecord {
            dev,
            fs: 0,
            dev_r: DevId::new(0, dev_r),
            root_num: 1,
            mount_num,
            sb: SuperBlock {
                dev,
                fs_type: 0,
                ninodes: 16,
                nblocks: 64,
                block_size: 1024,
                root: 1,
            },
        }
    }

    #[test]
    fn test_find_free_skips_root_slot() {
        let mut table = MountTable::new(3);
        assert_eq!(table.find_free(), Some(1));
        table.set(1, record(1, 0, Some(4)));
        assert_eq!(table.find_free(), Some(2));
        table.set(2, record(2, 0, Some(5)));
        assert_eq!(table.find_free(), None);
    }

    #[test]
    fn test_crossing_queries() {
        let mut table = MountTable::new(4);
        table.set(0, record(0, 0, None));
        table.set(1, record(1, 0, Some(4)));

        let mnt = InodeId::new(DevId::new(0, 0), 4);
        let root = InodeId::new(DevId::new(0, 1), 1);
        assert_eq!(table.is_mount_point(mnt).map(|(i, _)| i), Some(1));
        assert_eq!(table.is_fs_root(root).map(|(i, _)| i), Some(1));

        // The global root is never a crossing
        assert!(table.is_fs_root(InodeId::new(DevId::new(0, 0), 1)).is_none());
        assert!(table.is_mount_point(InodeId::new(DevId::new(0, 1), 4)).is_none());
    }

    #[test]
    fn test_root_and_nesting_queries() {
        let mut table = MountTable::new(4);
        table.set(0, record(0, 0, None));
        table.set(1, record(1, 0, Some(4)));
        table.set(2, record(2, 1, Some(6)));

        assert!(table.is_any_root(InodeId::new(DevId::new(0, 0), 1)));
        assert!(table.is_any_root(InodeId::new(DevId::new(0, 2), 1)));
        assert!(!table.is_any_root(InodeId::new(DevId::new(0, 1), 6)));

        // The root record names itself as dev_r and does not count
        assert!(table.has_mounts_on(DevId::new(0, 0)));
        assert!(table.has_mounts_on(DevId::new(0, 1)));
        assert!(!table.has_mounts_on(DevId::new(0, 2)));
        table.clear(2);
        assert!(!table.has_mounts_on(DevId::new(0, 1)));
    }

    #[test]
    fn test_mount_point_matches_device_too() {
        let mut table = MountTable::new(4);
        table.set(1, record(1, 0, Some(4)));
        // Same number on another device is not the mount point
        assert!(table.is_mount_point(InodeId::new(DevId::new(0, 2), 4)).is_none());
    }

    #[test]
    fn test_fs_for_device() {
        let mut table = MountTable::new(2);
        assert!(table.fs_for_device(DevId::new(0, 0)).is_none());
        table.set(0, record(0, 0, None));
        assert_eq!(table.fs_for_device(DevId::new(0, 0)), Some(0));
        assert!(table.is_mounted(DevId::new(0, 0)));
        assert_eq!(table.clear(0).map(|r| r.dev), Some(DevId::new(0, 0)));
        assert!(table.is_empty());
    }
}
