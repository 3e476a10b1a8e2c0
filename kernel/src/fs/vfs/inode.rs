//! In-core Inode Types and Handles
//!
//! `InodeData` is the payload of one cache slot. Callers never touch a slot
//! directly; they hold one of two handles:
//!
//! - [`InodeRef`]: a counted reference without the content lock
//! - [`LockedInode`]: a counted reference with the content lock held
//!
//! Dropping either handle releases its reference through the cache, so a
//! partial path walk that bails out with `?` leaks nothing.

use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use super::icache::SlotId;
use super::pipe::PipeBuffer;
use super::Vfs;
use crate::config::NR_ZONES;
use crate::drivers::DevId;

/// File mode bits following POSIX specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct FileMode(pub u16);

impl FileMode {
    pub const S_IFMT: u16 = 0o170000;
    pub const S_IFREG: u16 = 0o100000;
    pub const S_IFDIR: u16 = 0o040000;
    pub const S_IFCHR: u16 = 0o020000;
    pub const S_IFBLK: u16 = 0o060000;
    pub const S_IFIFO: u16 = 0o010000;

    pub const S_IRUSR: u16 = 0o0400;
    pub const S_IWUSR: u16 = 0o0200;
    pub const S_IXUSR: u16 = 0o0100;
    pub const S_IXGRP: u16 = 0o0010;
    pub const S_IXOTH: u16 = 0o0001;

    /// Any execute bit
    pub const S_IXUGO: u16 = Self::S_IXUSR | Self::S_IXGRP | Self::S_IXOTH;

    pub const fn new(mode: u16) -> Self {
        Self(mode)
    }

    pub const fn file_type(&self) -> u16 {
        self.0 & Self::S_IFMT
    }

    pub const fn permissions(&self) -> u16 {
        self.0 & 0o7777
    }

    pub const fn is_regular(&self) -> bool {
        self.file_type() == Self::S_IFREG
    }

    pub const fn is_directory(&self) -> bool {
        self.file_type() == Self::S_IFDIR
    }

    pub const fn is_char_device(&self) -> bool {
        self.file_type() == Self::S_IFCHR
    }

    pub const fn is_block_device(&self) -> bool {
        self.file_type() == Self::S_IFBLK
    }

    pub const fn is_device(&self) -> bool {
        self.is_char_device() || self.is_block_device()
    }

    pub const fn is_fifo(&self) -> bool {
        self.file_type() == Self::S_IFIFO
    }
}

/// Access request bits for permission checks
pub const MAY_READ: u16 = 4;
pub const MAY_WRITE: u16 = 2;
pub const MAY_EXEC: u16 = 1;

/// On-disk inode number
pub type InodeNum = u32;

/// Identity of a cached inode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InodeId {
    pub dev: DevId,
    pub num: InodeNum,
}

impl InodeId {
    pub const fn new(dev: DevId, num: InodeNum) -> Self {
        Self { dev, num }
    }
}

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.dev, self.num)
    }
}

bitflags::bitflags! {
    /// Cache status of an inode slot
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InodeFlags: u8 {
        /// Payload holds a loaded object
        const VALID = 1 << 0;
        /// Content lock held
        const LOCKED = 1 << 1;
        /// Payload differs from disk
        const DIRTY = 1 << 2;
        /// Anonymous pipe
        const PIPE = 1 << 3;
        /// Directory with a filesystem mounted on it
        const MOUNT = 1 << 4;
    }
}

/// Payload of an in-core inode
#[derive(Debug, Default)]
pub struct InodeData {
    pub dev: DevId,
    pub num: InodeNum,
    pub mode: FileMode,
    pub uid: u16,
    pub gid: u16,
    pub nlinks: u16,
    /// Size in bytes
    pub size: u32,
    /// Modification time
    pub time: u64,
    /// Zone list; device nodes keep their device number in zone 0
    pub blocks: [u32; NR_ZONES],
    /// Buffer state when this is a pipe
    pub pipe: Option<PipeBuffer>,
}

impl InodeData {
    /// Blank payload for `(dev, num)`
    pub fn empty(dev: DevId, num: InodeNum) -> Self {
        Self {
            dev,
            num,
            ..Self::default()
        }
    }

    pub fn id(&self) -> InodeId {
        InodeId::new(self.dev, self.num)
    }

    /// Device a device node refers to
    pub fn rdev(&self) -> DevId {
        DevId::from_raw(self.blocks[0])
    }

    pub fn is_directory(&self) -> bool {
        self.mode.is_directory()
    }
}

/// A counted, unlocked reference to a cached inode
///
/// This is what a process keeps for its root and working directory.
pub struct InodeRef<'v> {
    vfs: &'v Vfs,
    slot: SlotId,
}

impl<'v> InodeRef<'v> {
    /// Wrap a slot whose reference the caller already owns
    pub(crate) fn from_slot(vfs: &'v Vfs, slot: SlotId) -> Self {
        Self { vfs, slot }
    }

    pub fn vfs(&self) -> &'v Vfs {
        self.vfs
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn id(&self) -> InodeId {
        self.vfs.cache.id(self.slot)
    }

    pub fn flags(&self) -> InodeFlags {
        self.vfs.cache.flags(self.slot)
    }

    /// Take the content lock, blocking while another holder has it
    pub fn lock(self) -> LockedInode<'v> {
        let this = ManuallyDrop::new(self);
        this.vfs.cache.lock(this.slot);
        LockedInode {
            vfs: this.vfs,
            slot: this.slot,
        }
    }

    /// Another reference to the same inode
    pub fn dup(&self) -> InodeRef<'v> {
        self.vfs.cache.add_ref(self.slot);
        InodeRef::from_slot(self.vfs, self.slot)
    }
}

impl Drop for InodeRef<'_> {
    fn drop(&mut self) {
        self.vfs.cache.lock(self.slot);
        self.vfs.release(self.slot);
    }
}

impl fmt::Debug for InodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InodeRef")
            .field("slot", &self.slot)
            .field("id", &self.id())
            .finish()
    }
}

/// A counted reference holding the inode's content lock
///
/// Dereferences to the payload. Dropping it is `inode_put`.
pub struct LockedInode<'v> {
    vfs: &'v Vfs,
    slot: SlotId,
}

impl<'v> LockedInode<'v> {
    /// Wrap a slot the caller holds locked with one reference
    pub(crate) fn from_slot(vfs: &'v Vfs, slot: SlotId) -> Self {
        Self { vfs, slot }
    }

    pub fn vfs(&self) -> &'v Vfs {
        self.vfs
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn flags(&self) -> InodeFlags {
        self.vfs.cache.flags(self.slot)
    }

    pub fn set_flags(&self, flags: InodeFlags) {
        self.vfs.cache.set_flags(self.slot, flags);
    }

    pub fn clear_flags(&self, flags: InodeFlags) {
        self.vfs.cache.clear_flags(self.slot, flags);
    }

    /// Record that the payload must be written back
    pub fn mark_dirty(&self) {
        self.set_flags(InodeFlags::DIRTY);
    }

    /// Current reference count
    pub fn count(&self) -> u32 {
        self.vfs.cache.count(self.slot)
    }

    /// Another reference to the same inode, not locked
    pub fn dup(&self) -> InodeRef<'v> {
        self.vfs.cache.add_ref(self.slot);
        InodeRef::from_slot(self.vfs, self.slot)
    }

    /// Drop the content lock but keep the reference
    pub fn unlock(self) -> InodeRef<'v> {
        let this = ManuallyDrop::new(self);
        this.vfs.cache.unlock(this.slot);
        InodeRef::from_slot(this.vfs, this.slot)
    }
}

impl Deref for LockedInode<'_> {
    type Target = InodeData;

    fn deref(&self) -> &InodeData {
        // SAFETY: the LOCKED flag is held through this handle.
        unsafe { self.vfs.cache.data(self.slot) }
    }
}

impl DerefMut for LockedInode<'_> {
    fn deref_mut(&mut self) -> &mut InodeData {
        // SAFETY: the LOCKED flag is held through this handle, and `&mut self`
        // rules out a second borrow through it.
        unsafe { self.vfs.cache.data(self.slot) }
    }
}

impl Drop for LockedInode<'_> {
    fn drop(&mut self) {
        self.vfs.release(self.slot);
    }
}

impl fmt::Debug for LockedInode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedInode")
            .field("slot", &self.slot)
            .field("id", &self.id())
            .field("mode", &self.mode)
            .field("flags", &self.flags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_mode_types() {
        let dir = FileMode::new(FileMode::S_IFDIR | 0o755);
        assert!(dir.is_directory());
        assert!(!dir.is_regular());
        assert_eq!(dir.permissions(), 0o755);

        let blk = FileMode::new(FileMode::S_IFBLK | 0o600);
        assert!(blk.is_device());
        assert!(!FileMode::new(FileMode::S_IFIFO).is_device());
    }

    #[test]
    fn test_rdev_from_zone_zero() {
        let mut data = InodeData::empty(DevId::new(0, 0), 5);
        data.blocks[0] = DevId::new(1, 2).raw();
        assert_eq!(data.rdev(), DevId::new(1, 2));
        assert_eq!(data.id(), InodeId::new(DevId::new(0, 0), 5));
    }
}
