//! MelloFS Bitmap Allocator
//!
//! Inodes and data zones are tracked by on-disk bitmaps, one bit per
//! object, first fit.

use crate::config::BLOCK_SIZE;
use crate::drivers::{DevId, DeviceSwitch};

/// Bits held by one bitmap block
pub const BITS_PER_BLOCK: u32 = (BLOCK_SIZE * 8) as u32;

pub fn set_bit(map: &mut [u8], bit: u32) {
    map[(bit / 8) as usize] |= 1 << (bit % 8);
}

pub fn clear_bit(map: &mut [u8], bit: u32) {
    map[(bit / 8) as usize] &= !(1 << (bit % 8));
}

pub fn test_bit(map: &[u8], bit: u32) -> bool {
    map[(bit / 8) as usize] & (1 << (bit % 8)) != 0
}

/// First clear bit below `limit`
pub fn first_clear(map: &[u8], limit: u32) -> Option<u32> {
    let limit = core::cmp::min(limit, (map.len() * 8) as u32);
    (0..limit).find(|&bit| !test_bit(map, bit))
}

/// A bitmap region on a device
#[derive(Debug, Clone, Copy)]
pub struct Bitmap {
    /// First block of the region
    pub start: u32,
    /// Number of valid bits
    pub bits: u32,
}

impl Bitmap {
    pub fn new(start: u32, bits: u32) -> Self {
        Self { start, bits }
    }

    fn blocks(&self) -> u32 {
        self.bits.div_ceil(BITS_PER_BLOCK)
    }

    /// Claim the first clear bit
    pub fn alloc(&self, devices: &DeviceSwitch, dev: DevId) -> Option<u32> {
        let mut buf = [0u8; BLOCK_SIZE];
        for b in 0..self.blocks() {
            let base = b * BITS_PER_BLOCK;
            devices.read_block(dev, self.start + b, &mut buf);
            if let Some(bit) = first_clear(&buf, self.bits - base) {
                set_bit(&mut buf, bit);
                devices.write_block(dev, self.start + b, &buf);
                return Some(base + bit);
            }
        }
        None
    }

    /// Clear `bit`; returns whether it was set
    pub fn free(&self, devices: &DeviceSwitch, dev: DevId, bit: u32) -> bool {
        if bit >= self.bits {
            return false;
        }
        let mut buf = [0u8; BLOCK_SIZE];
        let block = self.start + bit / BITS_PER_BLOCK;
        let bit = bit % BITS_PER_BLOCK;

        devices.read_block(dev, block, &mut buf);
        let was_set = test_bit(&buf, bit);
        clear_bit(&mut buf, bit);
        devices.write_block(dev, block, &buf);
        was_set
    }

    pub fn is_set(&self, devices: &DeviceSwitch, dev: DevId, bit: u32) -> bool {
        if bit >= self.bits {
            return false;
        }
        let mut buf = [0u8; BLOCK_SIZE];
        devices.read_block(dev, self.start + bit / BITS_PER_BLOCK, &mut buf);
        test_bit(&buf, bit % BITS_PER_BLOCK)
    }
}
