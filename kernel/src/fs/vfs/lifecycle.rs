//! Inode Lifecycle
//!
//! Getting, allocating, releasing and flushing in-core inodes, plus the
//! operations built directly on them: pipes, truncation, rename, node
//! creation and semaphore files.

use alloc::format;

use super::icache::{Lookup, SlotId};
use super::inode::{
    FileMode, InodeData, InodeFlags, InodeId, InodeNum, InodeRef, LockedInode, MAY_EXEC, MAY_READ,
    MAY_WRITE,
};
use super::path::{permission, Process};
use super::pipe::PipeBuffer;
use super::superblock::{FsTypeId, SuperBlock};
use super::{FsError, FsResult, Vfs};
use crate::config::{INODE_NULL, NAME_MAX, PAGE_SIZE, SEM_PREFIX};
use crate::drivers::DevId;

impl Vfs {
    /// Root directory of the root filesystem, unlocked
    pub fn root_inode(&self) -> FsResult<InodeRef<'_>> {
        let root = self.mounts.lock().get(0).map(|r| r.root_id());
        let root = root.ok_or(FsError::NoDevice)?;
        Ok(self.inode_get(root.dev, root.num)?.unlock())
    }

    /// Get inode `num` of `dev`, locked, loading it on a cache miss
    ///
    /// # Panics
    /// Panics on a miss for a device nothing is mounted from.
    pub fn inode_get(&self, dev: DevId, num: InodeNum) -> FsResult<LockedInode<'_>> {
        let id = InodeId::new(dev, num);

        let slot = match self.cache.lookup_or_reserve(id) {
            Lookup::Hit(slot) => return Ok(LockedInode::from_slot(self, slot)),
            Lookup::Exhausted => return Err(FsError::CacheExhausted),
            Lookup::Reserved(slot) => slot,
        };

        let fs = self.fs_for(dev);
        // SAFETY: the reserved slot is locked by us.
        let data = unsafe { self.cache.data(slot) };
        if let Err(e) = fs.read_inode(dev, num, data) {
            log_debug!("ICACHE", "failed to read inode {}: {}", id, e);
            self.cache.discard(slot);
            return Err(e);
        }
        data.dev = dev;
        data.num = num;

        let mut flags = InodeFlags::VALID;
        if self.mounts.lock().is_mount_point(id).is_some() {
            flags |= InodeFlags::MOUNT;
        }
        self.cache.set_flags(slot, flags);

        Ok(LockedInode::from_slot(self, slot))
    }

    /// Allocate a fresh inode on the filesystem described by `sb`
    pub fn inode_alloc(&self, sb: &SuperBlock) -> FsResult<LockedInode<'_>> {
        let fs = self.fs_for(sb.dev);
        let slot = self.cache.acquire_free_slot().ok_or(FsError::CacheExhausted)?;

        // SAFETY: freshly acquired slots are locked by us.
        let data = unsafe { self.cache.data(slot) };
        *data = InodeData::empty(sb.dev, INODE_NULL);
        if let Err(e) = fs.alloc_inode(sb, data) {
            self.cache.discard(slot);
            return Err(e);
        }
        data.dev = sb.dev;
        data.time = self.clock.now();

        self.cache.insert(slot, data.id());
        self.cache.set_flags(slot, InodeFlags::VALID | InodeFlags::DIRTY);
        Ok(LockedInode::from_slot(self, slot))
    }

    /// Release a locked inode
    pub fn inode_put(&self, ip: LockedInode<'_>) {
        drop(ip);
    }

    /// Drop one reference of a slot the caller holds locked
    ///
    /// The last reference tears the inode down: a pipe gives its page back;
    /// an unlinked file is freed and truncated; the payload is written back;
    /// then the slot returns to the free list. The slot is always unlocked
    /// on return.
    pub(crate) fn release(&self, slot: SlotId) {
        if !self.cache.drop_ref(slot) {
            self.cache.unlock(slot);
            return;
        }

        let flags = self.cache.flags(slot);
        // SAFETY: the slot is still locked by the caller.
        let data = unsafe { self.cache.data(slot) };

        if flags.contains(InodeFlags::PIPE) {
            if let Some(pipe) = data.pipe.take() {
                self.pages.release(pipe.into_page());
            }
        } else if flags.contains(InodeFlags::VALID) {
            let fs = self.fs_for(data.dev);
            if data.nlinks == 0 {
                fs.free_inode(data);
                fs.truncate_inode(data);
            }
            fs.write_inode(data);
        }

        self.cache.recycle(slot);
    }

    /// Create an anonymous pipe
    ///
    /// Returns the read and write ends. Both refer to one in-core inode with
    /// no device identity and a reference count of two.
    pub fn inode_pipe(&self) -> FsResult<(InodeRef<'_>, InodeRef<'_>)> {
        let page = self.pages.acquire().ok_or(FsError::OutOfMemory)?;
        let Some(slot) = self.cache.acquire_free_slot() else {
            self.pages.release(page);
            return Err(FsError::CacheExhausted);
        };

        // SAFETY: freshly acquired slots are locked by us.
        let data = unsafe { self.cache.data(slot) };
        *data = InodeData {
            dev: DevId::NULL,
            num: INODE_NULL,
            mode: FileMode::new(FileMode::S_IFIFO | FileMode::S_IRUSR | FileMode::S_IWUSR),
            size: PAGE_SIZE as u32,
            time: self.clock.now(),
            pipe: Some(PipeBuffer::new(page)),
            ..InodeData::default()
        };

        self.cache.set_count(slot, 2);
        self.cache.set_flags(slot, InodeFlags::VALID | InodeFlags::PIPE);
        self.cache.unlock(slot);

        Ok((InodeRef::from_slot(self, slot), InodeRef::from_slot(self, slot)))
    }

    /// Write every cached, valid, non-pipe inode back to its device
    pub fn inode_sync(&self) {
        for slot in 0..self.cache.capacity() {
            if !self.cache.pin_valid(slot) {
                continue;
            }
            self.cache.lock(slot);
            let ip = LockedInode::from_slot(self, slot);
            if ip.flags().contains(InodeFlags::VALID) {
                self.fs_for(ip.dev).write_inode(&ip);
                ip.clear_flags(InodeFlags::DIRTY);
            }
        }
    }

    /// Drop every data block of `ip`
    pub fn inode_truncate(&self, ip: &mut LockedInode<'_>) {
        let fs = self.fs_for(ip.dev);
        fs.truncate_inode(ip);
        self.inode_touch(ip);
    }

    /// Stamp the modification time and mark `ip` dirty
    pub fn inode_touch(&self, ip: &mut LockedInode<'_>) {
        ip.time = self.clock.now();
        ip.mark_dirty();
    }

    /// Rename the entry `old_path` to `new_name` within its directory
    pub fn inode_rename(&self, proc: &Process<'_>, old_path: &str, new_name: &str) -> FsResult<()> {
        if new_name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }

        let (mut dir, old_name) = self.inode_dname(proc, old_path)?;
        if matches!(old_name, "/" | "." | "..") || matches!(new_name, "." | "..") {
            return Err(FsError::InvalidArgument);
        }
        if !permission(dir.mode, dir.uid, dir.gid, proc, MAY_WRITE | MAY_EXEC) {
            return Err(FsError::PermissionDenied);
        }
        if self.dir_search(&dir, new_name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        if !self.dir_rename(&mut dir, old_name, new_name)? {
            return Err(FsError::NotFound);
        }
        self.inode_touch(&mut dir);
        Ok(())
    }

    /// Create a file or directory at `path`
    ///
    /// Directories come with "." and ".." entries and add a link to their
    /// parent. The new inode is returned locked.
    pub fn create<'v>(&'v self, proc: &Process<'v>, path: &str, mode: FileMode) -> FsResult<LockedInode<'v>> {
        let (mut dir, name) = self.inode_dname(proc, path)?;
        self.create_in(proc, &mut dir, name, mode)
    }

    /// Create the semaphore file `sem.<name>` for the last component of `path`
    ///
    /// The caller needs read and write permission on the parent directory.
    /// Only the permission bits of `perm` are kept.
    pub fn inode_semaphore<'v>(&'v self, proc: &Process<'v>, path: &str, perm: u16) -> FsResult<LockedInode<'v>> {
        let (mut dir, name) = self.inode_dname(proc, path)?;
        if !permission(dir.mode, dir.uid, dir.gid, proc, MAY_READ | MAY_WRITE) {
            return Err(FsError::PermissionDenied);
        }
        if matches!(name, "/" | "." | "..") {
            return Err(FsError::InvalidArgument);
        }

        let sem_name = format!("{}{}", SEM_PREFIX, name);
        if sem_name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }

        let mode = FileMode::new(FileMode::S_IFREG | (perm & 0o7777));
        let mut ip = self.create_in(proc, &mut dir, &sem_name, mode)?;
        self.inode_touch(&mut ip);
        Ok(ip)
    }

    fn create_in<'v>(
        &'v self,
        proc: &Process<'v>,
        dir: &mut LockedInode<'v>,
        name: &str,
        mode: FileMode,
    ) -> FsResult<LockedInode<'v>> {
        if matches!(name, "/" | "." | "..") {
            return Err(FsError::AlreadyExists);
        }
        if !dir.is_directory() {
            return Err(FsError::NotDirectory);
        }
        if !permission(dir.mode, dir.uid, dir.gid, proc, MAY_WRITE | MAY_EXEC) {
            return Err(FsError::PermissionDenied);
        }
        if self.dir_search(dir, name)?.is_some() {
            return Err(FsError::AlreadyExists);
        }

        let sb = self.superblock(dir.dev)?;
        let mut ip = self.inode_alloc(&sb)?;
        ip.mode = mode;
        ip.uid = proc.uid;
        ip.gid = proc.gid;
        ip.nlinks = 1;

        let linked = self.link_new(dir, &mut ip, name);
        if let Err(e) = linked {
            // Unlinked: the put below frees it again
            ip.nlinks = 0;
            return Err(e);
        }

        self.inode_touch(dir);
        Ok(ip)
    }

    fn link_new(&self, dir: &mut LockedInode<'_>, ip: &mut LockedInode<'_>, name: &str) -> FsResult<()> {
        let num = ip.num;
        if ip.is_directory() {
            self.dir_add(ip, ".", num)?;
            self.dir_add(ip, "..", dir.num)?;
            ip.nlinks = 2;
        }

        self.dir_add(dir, name, num)?;
        if ip.is_directory() {
            dir.nlinks += 1;
        }
        Ok(())
    }

    /// Create a device node at `path` referring to `rdev`
    pub fn mknod<'v>(
        &'v self,
        proc: &Process<'v>,
        path: &str,
        mode: FileMode,
        rdev: DevId,
    ) -> FsResult<LockedInode<'v>> {
        if !proc.is_superuser() {
            return Err(FsError::PermissionDenied);
        }
        if !mode.is_device() && !mode.is_fifo() {
            return Err(FsError::InvalidArgument);
        }

        let mut ip = self.create(proc, path, mode)?;
        if mode.is_device() {
            ip.blocks[0] = rdev.raw();
        }
        ip.mark_dirty();
        Ok(ip)
    }

    /// Format `image` with filesystem type `fs_id`
    pub fn mkfs(&self, fs_id: FsTypeId, image: &mut [u8], ninodes: u32, nblocks: u32, uid: u16, gid: u16) -> FsResult<()> {
        let fs = self.registry.get(fs_id).ok_or(FsError::InvalidArgument)?;
        fs.format(image, ninodes, nblocks, uid, gid)?;
        log_info!("VFS", "formatted '{}' image: {} inodes, {} blocks", fs.name(), ninodes, nblocks);
        Ok(())
    }
}
