// RAM disk block driver
//
// Each minor is an in-memory image. Images are attached at run time, so a
// test or the boot path can hand over a prebuilt filesystem image.

use alloc::vec::Vec;
use spin::Mutex;

use super::BlockDriver;
use crate::config::BLOCK_SIZE;
use crate::fs::vfs::{FsError, FsResult};

/// RAM disk with one backing image per minor
pub struct RamDisk {
    images: Mutex<Vec<Vec<u8>>>,
}

impl RamDisk {
    pub const fn new() -> Self {
        Self {
            images: Mutex::new(Vec::new()),
        }
    }

    /// Attach an image as the next minor
    ///
    /// The image is padded up to a whole number of blocks.
    pub fn attach(&self, mut image: Vec<u8>) -> u8 {
        let rem = image.len() % BLOCK_SIZE;
        if rem != 0 {
            image.resize(image.len() + BLOCK_SIZE - rem, 0);
        }

        let mut images = self.images.lock();
        images.push(image);
        let minor = (images.len() - 1) as u8;
        log_debug!("RAMDISK", "attached minor {} ({} blocks)", minor, images[minor as usize].len() / BLOCK_SIZE);
        minor
    }

    /// Copy of the image behind `minor`
    pub fn snapshot(&self, minor: u8) -> Option<Vec<u8>> {
        self.images.lock().get(minor as usize).cloned()
    }

    fn range(len: usize, off: u64, n: usize) -> FsResult<(usize, usize)> {
        let start = usize::try_from(off).map_err(|_| FsError::InvalidArgument)?;
        if start > len {
            return Err(FsError::InvalidArgument);
        }
        Ok((start, core::cmp::min(len, start + n)))
    }
}

impl Default for RamDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDriver for RamDisk {
    fn read(&self, minor: u8, buf: &mut [u8], off: u64) -> FsResult<usize> {
        let images = self.images.lock();
        let image = images.get(minor as usize).ok_or(FsError::NoDevice)?;
        let (start, end) = Self::range(image.len(), off, buf.len())?;
        buf[..end - start].copy_from_slice(&image[start..end]);
        Ok(end - start)
    }

    fn write(&self, minor: u8, buf: &[u8], off: u64) -> FsResult<usize> {
        let mut images = self.images.lock();
        let image = images.get_mut(minor as usize).ok_or(FsError::NoDevice)?;
        let (start, end) = Self::range(image.len(), off, buf.len())?;
        image[start..end].copy_from_slice(&buf[..end - start]);
        Ok(end - start)
    }

    fn read_block(&self, minor: u8, block: u32, buf: &mut [u8; BLOCK_SIZE]) -> FsResult<()> {
        let off = block as u64 * BLOCK_SIZE as u64;
        match self.read(minor, buf, off)? {
            BLOCK_SIZE => Ok(()),
            _ => Err(FsError::IoError),
        }
    }

    fn write_block(&self, minor: u8, block: u32, buf: &[u8; BLOCK_SIZE]) -> FsResult<()> {
        let off = block as u64 * BLOCK_SIZE as u64;
        match self.write(minor, buf, off)? {
            BLOCK_SIZE => Ok(()),
            _ => Err(FsError::IoError),
        }
    }

    fn block_count(&self, minor: u8) -> u32 {
        self.images
            .lock()
            .get(minor as usize)
            .map_or(0, |image| (image.len() / BLOCK_SIZE) as u32)
    }
}
