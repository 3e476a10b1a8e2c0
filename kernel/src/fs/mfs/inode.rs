//! MelloFS Disk Inode
//!
//! 64-byte records packed 16 to a block in the inode table.

use crate::config::{BLOCK_SIZE, NR_ZONES};
use crate::fs::vfs::{FileMode, InodeData};

pub const DISK_INODE_SIZE: usize = 64;
pub const INODES_PER_BLOCK: usize = BLOCK_SIZE / DISK_INODE_SIZE;

/// On-disk inode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskInode {
    pub mode: u16,
    pub nlinks: u16,
    pub uid: u16,
    pub gid: u16,
    pub size: u32,
    pub time: u32,
    pub zones: [u32; NR_ZONES],
}

impl DiskInode {
    pub fn from_bytes(raw: &[u8]) -> Self {
        let u16_at = |off: usize| u16::from_le_bytes([raw[off], raw[off + 1]]);
        let u32_at = |off: usize| u32::from_le_bytes([raw[off], raw[off + 1], raw[off + 2], raw[off + 3]]);

        let mut zones = [0u32; NR_ZONES];
        for (i, zone) in zones.iter_mut().enumerate() {
            *zone = u32_at(16 + i * 4);
        }

        Self {
            mode: u16_at(0),
            nlinks: u16_at(2),
            uid: u16_at(4),
            gid: u16_at(6),
            size: u32_at(8),
            time: u32_at(12),
            zones,
        }
    }

    pub fn to_bytes(&self, raw: &mut [u8]) {
        raw[0..2].copy_from_slice(&self.mode.to_le_bytes());
        raw[2..4].copy_from_slice(&self.nlinks.to_le_bytes());
        raw[4..6].copy_from_slice(&self.uid.to_le_bytes());
        raw[6..8].copy_from_slice(&self.gid.to_le_bytes());
        raw[8..12].copy_from_slice(&self.size.to_le_bytes());
        raw[12..16].copy_from_slice(&self.time.to_le_bytes());
        for (i, zone) in self.zones.iter().enumerate() {
            raw[16 + i * 4..20 + i * 4].copy_from_slice(&zone.to_le_bytes());
        }
    }

    /// Copy into an in-core payload
    pub fn load_into(&self, ip: &mut InodeData) {
        ip.mode = FileMode::new(self.mode);
        ip.nlinks = self.nlinks;
        ip.uid = self.uid;
        ip.gid = self.gid;
        ip.size = self.size;
        ip.time = self.time as u64;
        ip.blocks = self.zones;
    }
}

impl From<&InodeData> for DiskInode {
    fn from(ip: &InodeData) -> Self {
        Self {
            mode: ip.mode.0,
            nlinks: ip.nlinks,
            uid: ip.uid,
            gid: ip.gid,
            size: ip.size,
            time: ip.time as u32,
            zones: ip.blocks,
        }
    }
}
