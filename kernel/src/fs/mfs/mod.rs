//! MelloFS - MelloOS Native Filesystem
//!
//! A small bitmap-allocated filesystem with 1 KiB blocks and twelve direct
//! zones per inode. It implements the whole [`FsType`] capability set and
//! is what the root device is formatted with.

pub mod allocator;
pub mod inode;
pub mod super_impl;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use spin::Mutex;

use self::allocator::Bitmap;
use self::inode::{DiskInode, DISK_INODE_SIZE, INODES_PER_BLOCK};
use self::super_impl::{MfsSuperblock, SUPERBLOCK_BLOCK};
use crate::config::{BLOCK_SIZE, NR_ZONES};
use crate::drivers::{DevId, DeviceSwitch};
use crate::fs::vfs::{FsError, FsResult, FsType, InodeData, InodeNum, SuperBlock};

/// Largest file the direct zones can hold
pub const MAX_FILE_SIZE: u32 = (NR_ZONES * BLOCK_SIZE) as u32;

/// MelloFS filesystem type
pub struct Mfs {
    devices: Arc<DeviceSwitch>,
    /// Superblocks of probed devices; also serializes bitmap updates
    volumes: Mutex<BTreeMap<DevId, MfsSuperblock>>,
}

impl Mfs {
    pub fn new(devices: Arc<DeviceSwitch>) -> Self {
        Self {
            devices,
            volumes: Mutex::new(BTreeMap::new()),
        }
    }

    fn volume(&self, dev: DevId) -> Option<MfsSuperblock> {
        self.volumes.lock().get(&dev).copied()
    }

    fn imap(sb: &MfsSuperblock) -> Bitmap {
        Bitmap::new(sb.imap_start, sb.ninodes)
    }

    fn zmap(sb: &MfsSuperblock) -> Bitmap {
        Bitmap::new(sb.zmap_start, sb.data_zones())
    }

    /// Block and byte offset of inode `num`'s record
    fn inode_pos(sb: &MfsSuperblock, num: InodeNum) -> (u32, usize) {
        let block = sb.itable_start + num / INODES_PER_BLOCK as u32;
        let off = (num as usize % INODES_PER_BLOCK) * DISK_INODE_SIZE;
        (block, off)
    }

    fn alloc_zone(&self, dev: DevId) -> Option<u32> {
        let volumes = self.volumes.lock();
        let sb = volumes.get(&dev).copied()?;
        let bit = Self::zmap(&sb).alloc(&self.devices, dev)?;
        let zone = sb.data_start + bit;
        self.devices.write_block(dev, zone, &[0u8; BLOCK_SIZE]);
        Some(zone)
    }

    fn free_zone(&self, dev: DevId, zone: u32) {
        let volumes = self.volumes.lock();
        let Some(sb) = volumes.get(&dev) else {
            return;
        };
        if zone < sb.data_start || zone >= sb.nblocks {
            log_warn!("MFS", "freeing zone {} outside the data region of {}", zone, dev);
            return;
        }
        if !Self::zmap(sb).free(&self.devices, dev, zone - sb.data_start) {
            log_warn!("MFS", "freeing free zone {} on {}", zone, dev);
        }
    }
}

impl FsType for Mfs {
    fn name(&self) -> &'static str {
        "mfs"
    }

    fn probe(&self, dev: DevId) -> FsResult<SuperBlock> {
        let mut buf = [0u8; BLOCK_SIZE];
        let off = SUPERBLOCK_BLOCK as u64 * BLOCK_SIZE as u64;
        if self.devices.block_read(dev, &mut buf, off)? != BLOCK_SIZE {
            return Err(FsError::InvalidArgument);
        }

        let sb = MfsSuperblock::from_bytes(&buf)?;
        // The device must actually hold every block the superblock claims
        let last = (sb.nblocks as u64 - 1) * BLOCK_SIZE as u64;
        if self.devices.block_read(dev, &mut buf, last)? != BLOCK_SIZE {
            return Err(FsError::InvalidArgument);
        }

        self.volumes.lock().insert(dev, sb);
        log_info!("MFS", "device {}: {} inodes, {} blocks", dev, sb.ninodes, sb.nblocks);

        Ok(SuperBlock {
            dev,
            fs_type: 0,
            ninodes: sb.ninodes,
            nblocks: sb.nblocks,
            block_size: BLOCK_SIZE as u32,
            root: sb.root,
        })
    }

    fn read_inode(&self, dev: DevId, num: InodeNum, ip: &mut InodeData) -> FsResult<()> {
        let sb = self.volume(dev).ok_or(FsError::NoDevice)?;
        if num == 0 || num >= sb.ninodes {
            return Err(FsError::InvalidArgument);
        }
        if !Self::imap(&sb).is_set(&self.devices, dev, num) {
            return Err(FsError::NotFound);
        }

        let (block, off) = Self::inode_pos(&sb, num);
        let mut buf = [0u8; BLOCK_SIZE];
        self.devices.read_block(dev, block, &mut buf);

        DiskInode::from_bytes(&buf[off..off + DISK_INODE_SIZE]).load_into(ip);
        ip.dev = dev;
        ip.num = num;
        Ok(())
    }

    fn write_inode(&self, ip: &InodeData) {
        // Records share blocks; the read-modify-write runs under the volume lock
        let volumes = self.volumes.lock();
        let Some(sb) = volumes.get(&ip.dev) else {
            kpanic!("MFS", "writing inode {} to unprobed device {}", ip.num, ip.dev);
        };
        let (block, off) = Self::inode_pos(sb, ip.num);

        let mut buf = [0u8; BLOCK_SIZE];
        self.devices.read_block(ip.dev, block, &mut buf);
        DiskInode::from(ip).to_bytes(&mut buf[off..off + DISK_INODE_SIZE]);
        self.devices.write_block(ip.dev, block, &buf);
    }

    fn alloc_inode(&self, sb: &SuperBlock, ip: &mut InodeData) -> FsResult<()> {
        let num = {
            let volumes = self.volumes.lock();
            let vol = volumes.get(&sb.dev).ok_or(FsError::NoDevice)?;
            Self::imap(vol).alloc(&self.devices, sb.dev).ok_or(FsError::NoSpace)?
        };

        *ip = InodeData::empty(sb.dev, num);
        self.write_inode(ip);
        log_debug!("MFS", "allocated inode {} on {}", num, sb.dev);
        Ok(())
    }

    fn free_inode(&self, ip: &InodeData) {
        let volumes = self.volumes.lock();
        let Some(sb) = volumes.get(&ip.dev) else {
            return;
        };
        if !Self::imap(sb).free(&self.devices, ip.dev, ip.num) {
            log_warn!("MFS", "freeing free inode {} on {}", ip.num, ip.dev);
        }
    }

    fn truncate_inode(&self, ip: &mut InodeData) {
        // Zone 0 of a device node is its device number
        let dev = ip.dev;
        if !ip.mode.is_device() {
            for zone in ip.blocks.iter_mut().filter(|z| **z != 0) {
                self.free_zone(dev, *zone);
                *zone = 0;
            }
        }
        ip.size = 0;
    }

    fn read_data(&self, ip: &InodeData, off: u32, buf: &mut [u8]) -> FsResult<usize> {
        if off >= ip.size {
            return Ok(0);
        }
        let end = core::cmp::min(ip.size as usize, off as usize + buf.len());

        let mut block = [0u8; BLOCK_SIZE];
        let mut pos = off as usize;
        while pos < end {
            let idx = pos / BLOCK_SIZE;
            let within = pos % BLOCK_SIZE;
            let n = core::cmp::min(BLOCK_SIZE - within, end - pos);
            let dst = &mut buf[pos - off as usize..pos - off as usize + n];

            match ip.blocks.get(idx).copied() {
                Some(0) => dst.fill(0),
                Some(zone) => {
                    self.devices.read_block(ip.dev, zone, &mut block);
                    dst.copy_from_slice(&block[within..within + n]);
                }
                None => break,
            }
            pos += n;
        }

        Ok(pos - off as usize)
    }

    fn write_data(&self, ip: &mut InodeData, off: u32, buf: &[u8]) -> FsResult<usize> {
        if off >= MAX_FILE_SIZE {
            return Err(FsError::NoSpace);
        }
        let end = core::cmp::min(MAX_FILE_SIZE as usize, off as usize + buf.len());

        let mut block = [0u8; BLOCK_SIZE];
        let mut pos = off as usize;
        while pos < end {
            let idx = pos / BLOCK_SIZE;
            let within = pos % BLOCK_SIZE;
            let n = core::cmp::min(BLOCK_SIZE - within, end - pos);

            if ip.blocks[idx] == 0 {
                match self.alloc_zone(ip.dev) {
                    Some(zone) => ip.blocks[idx] = zone,
                    None => break,
                }
            }

            let zone = ip.blocks[idx];
            self.devices.read_block(ip.dev, zone, &mut block);
            block[within..within + n].copy_from_slice(&buf[pos - off as usize..pos - off as usize + n]);
            self.devices.write_block(ip.dev, zone, &block);
            pos += n;
        }

        let written = pos - off as usize;
        if written == 0 && !buf.is_empty() {
            return Err(FsError::NoSpace);
        }
        ip.size = core::cmp::max(ip.size, pos as u32);
        Ok(written)
    }

    fn format(&self, image: &mut [u8], ninodes: u32, nblocks: u32, uid: u16, gid: u16) -> FsResult<()> {
        super_impl::format(image, ninodes, nblocks, uid, gid).map(|_| ())
    }

    fn release(&self, dev: DevId) {
        self.volumes.lock().remove(&dev);
    }
}
