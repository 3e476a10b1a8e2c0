//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use mellos_vfs::clock::TickClock;
use mellos_vfs::config::{FsConfig, BLOCK_SIZE, ROOT_DEV};
use mellos_vfs::drivers::block::RamDisk;
use mellos_vfs::drivers::{DevId, DeviceSwitch, RAMDISK_MAJOR};
use mellos_vfs::fs::mfs::super_impl::format;
use mellos_vfs::fs::vfs::FileMode;
use mellos_vfs::sync::Sleeper;
use mellos_vfs::{fs, Process, Vfs};

pub const ROOT_INODES: u32 = 64;
pub const ROOT_BLOCKS: u32 = 256;

/// Sleeper that yields the host thread between polls
pub struct YieldSleeper;

impl Sleeper for YieldSleeper {
    fn relax(&self) {
        std::thread::yield_now();
    }
}

pub struct Fixture {
    pub vfs: Vfs,
    pub disk: Arc<RamDisk>,
    pub clock: Arc<TickClock>,
}

impl Fixture {
    /// Attach a freshly formatted image and return its device number
    pub fn add_disk(&self, ninodes: u32, nblocks: u32) -> DevId {
        let mut image = vec![0u8; nblocks as usize * BLOCK_SIZE];
        format(&mut image, ninodes, nblocks, 0, 0).unwrap();
        DevId::new(RAMDISK_MAJOR, self.disk.attach(image))
    }

    /// Attach a zeroed image that no filesystem recognizes
    pub fn add_blank_disk(&self, nblocks: u32) -> DevId {
        DevId::new(RAMDISK_MAJOR, self.disk.attach(vec![0u8; nblocks as usize * BLOCK_SIZE]))
    }

    /// Superuser process rooted at "/"
    pub fn root_proc(&self) -> Process<'_> {
        Process::new(&self.vfs, 0, 0).unwrap()
    }

    /// Create block device node `path` for `dev`
    pub fn mknod_blk(&self, path: &str, dev: DevId) {
        let proc = self.root_proc();
        self.vfs
            .mknod(&proc, path, FileMode::new(FileMode::S_IFBLK | 0o600), dev)
            .unwrap();
    }
}

/// Boot a core whose root filesystem lives on a formatted RAM disk
pub fn boot_with(config: FsConfig) -> Fixture {
    let devices = Arc::new(DeviceSwitch::new());
    let disk = Arc::new(RamDisk::new());

    let mut image = vec![0u8; ROOT_BLOCKS as usize * BLOCK_SIZE];
    format(&mut image, ROOT_INODES, ROOT_BLOCKS, 0, 0).unwrap();
    let minor = disk.attach(image);
    assert_eq!(DevId::new(RAMDISK_MAJOR, minor), ROOT_DEV);

    devices.register_block(RAMDISK_MAJOR, disk.clone()).unwrap();

    let clock = Arc::new(TickClock::new(1000));
    let vfs = Vfs::new(config, devices, clock.clone(), Arc::new(YieldSleeper));
    fs::boot(&vfs, ROOT_DEV).unwrap();

    Fixture { vfs, disk, clock }
}

pub fn boot() -> Fixture {
    boot_with(FsConfig::default())
}

/// Boot from an existing root image
pub fn boot_image(image: Vec<u8>) -> Fixture {
    let devices = Arc::new(DeviceSwitch::new());
    let disk = Arc::new(RamDisk::new());
    disk.attach(image);
    devices.register_block(RAMDISK_MAJOR, disk.clone()).unwrap();

    let clock = Arc::new(TickClock::new(2000));
    let vfs = Vfs::new(FsConfig::default(), devices, clock.clone(), Arc::new(YieldSleeper));
    fs::boot(&vfs, ROOT_DEV).unwrap();

    Fixture { vfs, disk, clock }
}

pub fn dir_mode(perm: u16) -> FileMode {
    FileMode::new(FileMode::S_IFDIR | perm)
}

pub fn file_mode(perm: u16) -> FileMode {
    FileMode::new(FileMode::S_IFREG | perm)
}
