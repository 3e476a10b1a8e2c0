//! Device Switch
//!
//! Dispatch tables for character and block drivers, indexed by major
//! number. The filesystem core only reaches devices through this switch:
//! filesystem types issue block I/O against a `DevId`, and the switch routes
//! it to whichever driver registered that major.

pub mod block;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use spin::Mutex;

use crate::config::{BLOCK_SIZE, NR_BLKDEV, NR_CHRDEV};
use crate::fs::vfs::{FsError, FsResult};

pub use block::BlockDriver;

/// Null character device
pub const NULL_MAJOR: u8 = 0;
/// Terminal
pub const TTY_MAJOR: u8 = 1;
/// Kernel log
pub const KLOG_MAJOR: u8 = 2;

/// RAM disk
pub const RAMDISK_MAJOR: u8 = 0;
/// ATA hard disk
pub const ATA_MAJOR: u8 = 1;

/// Device number: a (major, minor) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevId {
    pub major: u8,
    pub minor: u8,
}

impl DevId {
    /// Identity of objects that live on no device (pipes)
    pub const NULL: DevId = DevId::new(u8::MAX, u8::MAX);

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Packed form, as stored in a device node's first zone
    pub const fn raw(self) -> u32 {
        ((self.major as u32) << 8) | self.minor as u32
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self::new((raw >> 8) as u8, raw as u8)
    }
}

impl Default for DevId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for DevId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// Character device driver
///
/// Capabilities a driver does not provide keep the default body and report
/// `NotSupported`.
pub trait CharDriver: Send + Sync {
    fn read(&self, _minor: u8, _buf: &mut [u8]) -> FsResult<usize> {
        Err(FsError::NotSupported)
    }

    fn write(&self, _minor: u8, _buf: &[u8]) -> FsResult<usize> {
        Err(FsError::NotSupported)
    }

    fn open(&self, _minor: u8) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    fn close(&self, _minor: u8) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    fn ioctl(&self, _minor: u8, _cmd: u32, _arg: usize) -> FsResult<i32> {
        Err(FsError::NotSupported)
    }
}

/// Character and block device tables
pub struct DeviceSwitch {
    cdevsw: Mutex<Vec<Option<Arc<dyn CharDriver>>>>,
    bdevsw: Mutex<Vec<Option<Arc<dyn BlockDriver>>>>,
}

impl DeviceSwitch {
    pub fn new() -> Self {
        let mut cdevsw = Vec::with_capacity(NR_CHRDEV);
        cdevsw.resize_with(NR_CHRDEV, || None);
        let mut bdevsw = Vec::with_capacity(NR_BLKDEV);
        bdevsw.resize_with(NR_BLKDEV, || None);

        Self {
            cdevsw: Mutex::new(cdevsw),
            bdevsw: Mutex::new(bdevsw),
        }
    }

    /// Register a character driver under `major`
    ///
    /// The null major is built in and can never be claimed.
    pub fn register_char(&self, major: u8, driver: Arc<dyn CharDriver>) -> FsResult<()> {
        let mut cdevsw = self.cdevsw.lock();
        let slot = cdevsw
            .get_mut(major as usize)
            .ok_or(FsError::InvalidArgument)?;

        if major == NULL_MAJOR || slot.is_some() {
            return Err(FsError::Busy);
        }

        *slot = Some(driver);
        log_info!("DEV", "registered character device major {}", major);
        Ok(())
    }

    /// Register a block driver under `major`
    pub fn register_block(&self, major: u8, driver: Arc<dyn BlockDriver>) -> FsResult<()> {
        let mut bdevsw = self.bdevsw.lock();
        let slot = bdevsw
            .get_mut(major as usize)
            .ok_or(FsError::InvalidArgument)?;

        if slot.is_some() {
            return Err(FsError::Busy);
        }

        *slot = Some(driver);
        log_info!("DEV", "registered block device major {}", major);
        Ok(())
    }

    fn char_driver(&self, dev: DevId) -> FsResult<Arc<dyn CharDriver>> {
        self.cdevsw
            .lock()
            .get(dev.major as usize)
            .and_then(|slot| slot.clone())
            .ok_or(FsError::InvalidArgument)
    }

    fn block_driver(&self, dev: DevId) -> Option<Arc<dyn BlockDriver>> {
        self.bdevsw
            .lock()
            .get(dev.major as usize)
            .and_then(|slot| slot.clone())
    }

    /// Is a block driver registered for `dev`'s major?
    pub fn has_block_driver(&self, dev: DevId) -> bool {
        self.block_driver(dev).is_some()
    }

    /// Read from a character device
    pub fn char_read(&self, dev: DevId, buf: &mut [u8]) -> FsResult<usize> {
        if dev.major == NULL_MAJOR {
            return Ok(0);
        }
        self.char_driver(dev)?.read(dev.minor, buf)
    }

    /// Write to a character device
    pub fn char_write(&self, dev: DevId, buf: &[u8]) -> FsResult<usize> {
        if dev.major == NULL_MAJOR {
            return Ok(buf.len());
        }
        self.char_driver(dev)?.write(dev.minor, buf)
    }

    pub fn char_open(&self, dev: DevId) -> FsResult<()> {
        if dev.major == NULL_MAJOR {
            return Ok(());
        }
        self.char_driver(dev)?.open(dev.minor)
    }

    pub fn char_close(&self, dev: DevId) -> FsResult<()> {
        if dev.major == NULL_MAJOR {
            return Ok(());
        }
        self.char_driver(dev)?.close(dev.minor)
    }

    pub fn char_ioctl(&self, dev: DevId, cmd: u32, arg: usize) -> FsResult<i32> {
        if dev.major == NULL_MAJOR {
            return Err(FsError::NoDevice);
        }
        self.char_driver(dev)?.ioctl(dev.minor, cmd, arg)
    }

    /// Read `buf.len()` bytes from a block device at byte offset `off`
    pub fn block_read(&self, dev: DevId, buf: &mut [u8], off: u64) -> FsResult<usize> {
        self.block_driver(dev)
            .ok_or(FsError::InvalidArgument)?
            .read(dev.minor, buf, off)
    }

    /// Write `buf` to a block device at byte offset `off`
    pub fn block_write(&self, dev: DevId, buf: &[u8], off: u64) -> FsResult<usize> {
        self.block_driver(dev)
            .ok_or(FsError::InvalidArgument)?
            .write(dev.minor, buf, off)
    }

    /// Read one filesystem block
    ///
    /// # Panics
    /// Panics if no driver is registered for `dev`, if the driver cannot
    /// read whole blocks, or if the transfer fails.
    pub fn read_block(&self, dev: DevId, block: u32, buf: &mut [u8; BLOCK_SIZE]) {
        let Some(driver) = self.block_driver(dev) else {
            kpanic!("DEV", "reading block from invalid device {}", dev);
        };

        match driver.read_block(dev.minor, block, buf) {
            Ok(()) => {}
            Err(FsError::NotSupported) => kpanic!("DEV", "block device {} cannot read blocks", dev),
            Err(e) => kpanic!("DEV", "failed to read block {} from device {}: {}", block, dev, e),
        }
    }

    /// Write one filesystem block
    ///
    /// # Panics
    /// Same conditions as [`DeviceSwitch::read_block`].
    pub fn write_block(&self, dev: DevId, block: u32, buf: &[u8; BLOCK_SIZE]) {
        let Some(driver) = self.block_driver(dev) else {
            kpanic!("DEV", "writing block to invalid device {}", dev);
        };

        match driver.write_block(dev.minor, block, buf) {
            Ok(()) => {}
            Err(FsError::NotSupported) => kpanic!("DEV", "block device {} cannot write blocks", dev),
            Err(e) => kpanic!("DEV", "failed to write block {} to device {}: {}", block, dev, e),
        }
    }
}

impl Default for DeviceSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::block::RamDisk;

    struct EchoTty;

    impl CharDriver for EchoTty {
        fn write(&self, _minor: u8, buf: &[u8]) -> FsResult<usize> {
            Ok(buf.len())
        }
    }

    #[test]
    fn test_devid_packing() {
        let dev = DevId::new(1, 3);
        assert_eq!(dev.raw(), 0x0103);
        assert_eq!(DevId::from_raw(0x0103), dev);
    }

    #[test]
    fn test_register_char_rules() {
        let sw = DeviceSwitch::new();
        assert_eq!(
            sw.register_char(NR_CHRDEV as u8, Arc::new(EchoTty)),
            Err(FsError::InvalidArgument)
        );
        assert_eq!(sw.register_char(NULL_MAJOR, Arc::new(EchoTty)), Err(FsError::Busy));
        assert_eq!(sw.register_char(TTY_MAJOR, Arc::new(EchoTty)), Ok(()));
        assert_eq!(sw.register_char(TTY_MAJOR, Arc::new(EchoTty)), Err(FsError::Busy));
    }

    #[test]
    fn test_null_device() {
        let sw = DeviceSwitch::new();
        let null = DevId::new(NULL_MAJOR, 0);
        let mut buf = [0u8; 8];
        assert_eq!(sw.char_write(null, b"discard"), Ok(7));
        assert_eq!(sw.char_read(null, &mut buf), Ok(0));
        assert_eq!(sw.char_open(null), Ok(()));
        assert_eq!(sw.char_ioctl(null, 0, 0), Err(FsError::NoDevice));
    }

    #[test]
    fn test_char_dispatch() {
        let sw = DeviceSwitch::new();
        let tty = DevId::new(TTY_MAJOR, 0);
        let mut buf = [0u8; 4];

        // Not registered yet
        assert_eq!(sw.char_write(tty, b"hi"), Err(FsError::InvalidArgument));

        sw.register_char(TTY_MAJOR, Arc::new(EchoTty)).unwrap();
        assert_eq!(sw.char_write(tty, b"hi"), Ok(2));
        assert_eq!(sw.char_read(tty, &mut buf), Err(FsError::NotSupported));
        assert_eq!(sw.char_ioctl(tty, 1, 2), Err(FsError::NotSupported));
    }

    #[test]
    fn test_block_dispatch() {
        let sw = DeviceSwitch::new();
        let disk = Arc::new(RamDisk::new());
        let minor = disk.attach(alloc::vec![0u8; 4 * BLOCK_SIZE]);
        let dev = DevId::new(RAMDISK_MAJOR, minor);

        assert_eq!(sw.block_write(dev, b"abc", 10), Err(FsError::InvalidArgument));
        sw.register_block(RAMDISK_MAJOR, disk.clone()).unwrap();
        assert_eq!(sw.register_block(RAMDISK_MAJOR, disk), Err(FsError::Busy));

        assert_eq!(sw.block_write(dev, b"abc", 10), Ok(3));
        let mut buf = [0u8; 3];
        assert_eq!(sw.block_read(dev, &mut buf, 10), Ok(3));
        assert_eq!(&buf, b"abc");

        let mut block = [0u8; BLOCK_SIZE];
        sw.read_block(dev, 0, &mut block);
        assert_eq!(&block[10..13], b"abc");
    }

    #[test]
    #[should_panic(expected = "reading block from invalid device")]
    fn test_read_block_unregistered_panics() {
        let sw = DeviceSwitch::new();
        let mut block = [0u8; BLOCK_SIZE];
        sw.read_block(DevId::new(ATA_MAJOR, 0), 0, &mut block);
    }
}
