//! Superblock and Filesystem Type Trait
//!
//! A filesystem type is the capability set the inode cache dispatches to on
//! a miss, on write-back and on teardown. The five inode capabilities are
//! required; file data I/O and formatting are optional.

use super::inode::{InodeData, InodeNum};
use super::{FsError, FsResult};
use crate::drivers::DevId;

/// Index of a filesystem type in the registry
pub type FsTypeId = usize;

/// In-core view of a mounted filesystem's control block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// Device holding the filesystem
    pub dev: DevId,
    /// Registry id of the type that recognized it
    pub fs_type: FsTypeId,
    pub ninodes: u32,
    pub nblocks: u32,
    pub block_size: u32,
    /// Root directory inode number
    pub root: InodeNum,
}

/// Filesystem type
pub trait FsType: Send + Sync {
    /// Returns the filesystem type name (e.g., "mfs")
    fn name(&self) -> &'static str;

    /// Read the superblock of `dev`
    ///
    /// Fails if the device content is not this type's format. A type that
    /// accepts a device may keep per-device state until it is unmounted.
    fn probe(&self, dev: DevId) -> FsResult<SuperBlock>;

    /// Load inode `num` of `dev` into `ip`
    fn read_inode(&self, dev: DevId, num: InodeNum, ip: &mut InodeData) -> FsResult<()>;

    /// Write `ip` back to its device
    fn write_inode(&self, ip: &InodeData);

    /// Reserve a fresh on-disk inode and fill `ip` with it
    fn alloc_inode(&self, sb: &SuperBlock, ip: &mut InodeData) -> FsResult<()>;

    /// Release the on-disk inode behind `ip`
    fn free_inode(&self, ip: &InodeData);

    /// Release every data block of `ip` and set its size to zero
    fn truncate_inode(&self, ip: &mut InodeData);

    /// Read file data at byte offset `off`; returns the bytes read
    fn read_data(&self, _ip: &InodeData, _off: u32, _buf: &mut [u8]) -> FsResult<usize> {
        Err(FsError::NotSupported)
    }

    /// Write file data at byte offset `off`, growing the file as needed
    fn write_data(&self, _ip: &mut InodeData, _off: u32, _buf: &[u8]) -> FsResult<usize> {
        Err(FsError::NotSupported)
    }

    /// Lay out an empty filesystem in `image`
    fn format(&self, _image: &mut [u8], _ninodes: u32, _nblocks: u32, _uid: u16, _gid: u16) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    /// Forget per-device state after an unmount
    fn release(&self, _dev: DevId) {}
}
