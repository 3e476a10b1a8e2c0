// Block device driver module

pub mod ramdisk;

pub use ramdisk::RamDisk;

use crate::config::BLOCK_SIZE;
use crate::fs::vfs::{FsError, FsResult};

/// Block device driver for filesystem integration
///
/// Byte-addressed `read`/`write` back the raw device nodes; the block
/// entry points are what filesystem types use. Drivers that only provide
/// one side keep the `NotSupported` defaults for the other.
pub trait BlockDriver: Send + Sync {
    fn read(&self, _minor: u8, _buf: &mut [u8], _off: u64) -> FsResult<usize> {
        Err(FsError::NotSupported)
    }

    fn write(&self, _minor: u8, _buf: &[u8], _off: u64) -> FsResult<usize> {
        Err(FsError::NotSupported)
    }

    fn read_block(&self, _minor: u8, _block: u32, _buf: &mut [u8; BLOCK_SIZE]) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    fn write_block(&self, _minor: u8, _block: u32, _buf: &[u8; BLOCK_SIZE]) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    /// Number of `BLOCK_SIZE` blocks behind `minor`
    fn block_count(&self, minor: u8) -> u32;
}
