//! MelloFS Superblock
//!
//! Block 0 is the boot block, block 1 the superblock. The regions that
//! follow, in order: inode bitmap, zone bitmap, inode table, data zones.
//! All fields are little-endian `u32`s.

use super::allocator::{set_bit, BITS_PER_BLOCK};
use super::inode::{DiskInode, DISK_INODE_SIZE, INODES_PER_BLOCK};
use crate::config::{BLOCK_SIZE, INODE_ROOT};
use crate::fs::vfs::{DirEntry, FileMode, FsError, FsResult, DIRENT_SIZE};

/// Magic number for the MelloFS minimal format: "MFS1"
pub const MFS_MAGIC: u32 = 0x4D46_5331;

/// Superblock location (block number)
pub const SUPERBLOCK_BLOCK: u32 = 1;

const FIELDS: usize = 11;

/// On-disk superblock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MfsSuperblock {
    pub magic: u32,
    pub ninodes: u32,
    /// Total blocks, metadata included
    pub nblocks: u32,
    pub imap_start: u32,
    pub imap_blocks: u32,
    pub zmap_start: u32,
    pub zmap_blocks: u32,
    pub itable_start: u32,
    pub itable_blocks: u32,
    /// First data zone
    pub data_start: u32,
    pub root: u32,
}

fn blocks_for(items: u32, per_block: u32) -> u32 {
    items.div_ceil(per_block)
}

impl MfsSuperblock {
    /// Compute the region layout for a fresh filesystem
    pub fn layout(ninodes: u32, nblocks: u32) -> FsResult<Self> {
        // Directory entries address inodes with 16 bits
        if ninodes < 2 || ninodes > u16::MAX as u32 + 1 {
            return Err(FsError::InvalidArgument);
        }

        let imap_blocks = blocks_for(ninodes, BITS_PER_BLOCK);
        let zmap_blocks = blocks_for(nblocks, BITS_PER_BLOCK);
        let itable_blocks = blocks_for(ninodes, INODES_PER_BLOCK as u32);

        let imap_start = SUPERBLOCK_BLOCK + 1;
        let zmap_start = imap_start + imap_blocks;
        let itable_start = zmap_start + zmap_blocks;
        let data_start = itable_start + itable_blocks;

        if data_start >= nblocks {
            return Err(FsError::NoSpace);
        }

        Ok(Self {
            magic: MFS_MAGIC,
            ninodes,
            nblocks,
            imap_start,
            imap_blocks,
            zmap_start,
            zmap_blocks,
            itable_start,
            itable_blocks,
            data_start,
            root: INODE_ROOT,
        })
    }

    /// Number of data zones
    pub fn data_zones(&self) -> u32 {
        self.nblocks - self.data_start
    }

    fn fields(&self) -> [u32; FIELDS] {
        [
            self.magic,
            self.ninodes,
            self.nblocks,
            self.imap_start,
            self.imap_blocks,
            self.zmap_start,
            self.zmap_blocks,
            self.itable_start,
            self.itable_blocks,
            self.data_start,
            self.root,
        ]
    }

    pub fn to_bytes(&self, buf: &mut [u8]) {
        for (i, field) in self.fields().iter().enumerate() {
            buf[i * 4..i * 4 + 4].copy_from_slice(&field.to_le_bytes());
        }
    }

    /// Parse and validate a superblock
    pub fn from_bytes(bytes: &[u8]) -> FsResult<Self> {
        if bytes.len() < FIELDS * 4 {
            return Err(FsError::InvalidArgument);
        }

        let mut f = [0u32; FIELDS];
        for (i, field) in f.iter_mut().enumerate() {
            *field = u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]]);
        }

        if f[0] != MFS_MAGIC {
            return Err(FsError::InvalidArgument);
        }

        let sb = Self::layout(f[1], f[2])?;
        let on_disk = Self {
            magic: f[0],
            ninodes: f[1],
            nblocks: f[2],
            imap_start: f[3],
            imap_blocks: f[4],
            zmap_start: f[5],
            zmap_blocks: f[6],
            itable_start: f[7],
            itable_blocks: f[8],
            data_start: f[9],
            root: f[10],
        };

        // Regions must be the ones this layout produces
        if on_disk.fields()[..10] != sb.fields()[..10] || on_disk.root == 0 || on_disk.root >= on_disk.ninodes {
            return Err(FsError::InvalidArgument);
        }
        Ok(on_disk)
    }
}

fn block_mut(image: &mut [u8], block: u32) -> &mut [u8] {
    let start = block as usize * BLOCK_SIZE;
    &mut image[start..start + BLOCK_SIZE]
}

/// Lay out an empty filesystem in `image`
///
/// The root directory is inode 1, owned by `uid:gid`, and holds "." and
/// ".." entries that both point back at it.
pub fn format(image: &mut [u8], ninodes: u32, nblocks: u32, uid: u16, gid: u16) -> FsResult<MfsSuperblock> {
    if image.len() < nblocks as usize * BLOCK_SIZE {
        return Err(FsError::InvalidArgument);
    }

    let sb = MfsSuperblock::layout(ninodes, nblocks)?;

    // Metadata and the root directory's zone start out zeroed
    for block in 0..=sb.data_start {
        block_mut(image, block).fill(0);
    }

    sb.to_bytes(block_mut(image, SUPERBLOCK_BLOCK));

    // Inode 0 is never handed out
    let imap = block_mut(image, sb.imap_start);
    set_bit(imap, 0);
    set_bit(imap, sb.root);

    let root_zone = sb.data_start;
    set_bit(block_mut(image, sb.zmap_start), 0);

    let mut root = DiskInode {
        mode: FileMode::S_IFDIR | 0o755,
        nlinks: 2,
        uid,
        gid,
        size: (2 * DIRENT_SIZE) as u32,
        ..DiskInode::default()
    };
    root.zones[0] = root_zone;

    let itable = block_mut(image, sb.itable_start + sb.root / INODES_PER_BLOCK as u32);
    let off = (sb.root as usize % INODES_PER_BLOCK) * DISK_INODE_SIZE;
    root.to_bytes(&mut itable[off..off + DISK_INODE_SIZE]);

    let dir = block_mut(image, root_zone);
    dir[..DIRENT_SIZE].copy_from_slice(&DirEntry::new(sb.root, ".")?.to_bytes());
    dir[DIRENT_SIZE..2 * DIRENT_SIZE].copy_from_slice(&DirEntry::new(sb.root, "..")?.to_bytes());

    Ok(sb)
}
