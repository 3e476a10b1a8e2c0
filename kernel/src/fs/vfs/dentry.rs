//! Directory Entries
//!
//! A directory's data is an array of fixed 16-byte records: a little-endian
//! `u16` inode number (0 marks an empty record) followed by the name,
//! NUL-padded to `NAME_MAX` bytes. Directories are scanned linearly through
//! the owning filesystem type's data capabilities.

use alloc::vec::Vec;

use super::inode::{InodeData, InodeNum, LockedInode};
use super::{FsError, FsResult, Vfs};
use crate::config::NAME_MAX;

/// Size of one on-disk directory record
pub const DIRENT_SIZE: usize = 2 + NAME_MAX;

/// One directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u16,
    name: [u8; NAME_MAX],
}

impl DirEntry {
    pub fn new(ino: InodeNum, name: &str) -> FsResult<Self> {
        if name.is_empty() || name.contains('/') {
            return Err(FsError::InvalidArgument);
        }
        if name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }
        let ino = u16::try_from(ino).map_err(|_| FsError::InvalidArgument)?;

        let mut raw = [0u8; NAME_MAX];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self { ino, name: raw })
    }

    pub fn is_empty(&self) -> bool {
        self.ino == 0
    }

    /// Stored name, up to the first NUL
    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_MAX);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    pub fn matches(&self, name: &str) -> bool {
        !self.is_empty() && self.name() == name
    }

    pub fn to_bytes(&self) -> [u8; DIRENT_SIZE] {
        let mut raw = [0u8; DIRENT_SIZE];
        raw[..2].copy_from_slice(&self.ino.to_le_bytes());
        raw[2..].copy_from_slice(&self.name);
        raw
    }

    pub fn from_bytes(raw: &[u8; DIRENT_SIZE]) -> Self {
        let mut name = [0u8; NAME_MAX];
        name.copy_from_slice(&raw[2..]);
        Self {
            ino: u16::from_le_bytes([raw[0], raw[1]]),
            name,
        }
    }
}

impl Vfs {
    /// Visit every record of `dir` until `f` returns `Some`
    fn scan_dir<T>(
        &self,
        dir: &InodeData,
        mut f: impl FnMut(u32, &DirEntry) -> Option<T>,
    ) -> FsResult<Option<T>> {
        if !dir.is_directory() {
            return Err(FsError::NotDirectory);
        }

        let fs = self.fs_for(dir.dev);
        let mut raw = [0u8; DIRENT_SIZE];
        let mut off = 0u32;

        while (off as usize) + DIRENT_SIZE <= dir.size as usize {
            if fs.read_data(dir, off, &mut raw)? != DIRENT_SIZE {
                return Err(FsError::IoError);
            }
            if let Some(hit) = f(off, &DirEntry::from_bytes(&raw)) {
                return Ok(Some(hit));
            }
            off += DIRENT_SIZE as u32;
        }

        Ok(None)
    }

    /// Inode number of entry `name` in `dir`
    pub fn dir_search(&self, dir: &InodeData, name: &str) -> FsResult<Option<InodeNum>> {
        self.scan_dir(dir, |_, ent| ent.matches(name).then_some(ent.ino as InodeNum))
    }

    /// Every occupied record of `dir`, in on-disk order
    pub fn dir_entries(&self, dir: &InodeData) -> FsResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        self.scan_dir::<()>(dir, |_, ent| {
            if !ent.is_empty() {
                entries.push(*ent);
            }
            None
        })?;
        Ok(entries)
    }

    /// Link `name` to inode `ino` in `dir`
    ///
    /// Reuses the first empty record, otherwise appends one.
    pub fn dir_add(&self, dir: &mut LockedInode<'_>, name: &str, ino: InodeNum) -> FsResult<()> {
        let entry = DirEntry::new(ino, name)?;

        let off = self.scan_dir(&**dir, |off, ent| ent.is_empty().then_some(off))?;
        let off = off.unwrap_or(dir.size);

        let fs = self.fs_for(dir.dev);
        if fs.write_data(&mut **dir, off, &entry.to_bytes())? != DIRENT_SIZE {
            return Err(FsError::NoSpace);
        }
        dir.mark_dirty();
        Ok(())
    }

    /// Overwrite the name of entry `old` in place
    ///
    /// Returns `false` when `dir` has no entry called `old`.
    pub fn dir_rename(&self, dir: &mut LockedInode<'_>, old: &str, new: &str) -> FsResult<bool> {
        let Some((off, ino)) = self.scan_dir(&**dir, |off, ent| ent.matches(old).then_some((off, ent.ino)))? else {
            return Ok(false);
        };

        let entry = DirEntry::new(ino as InodeNum, new)?;
        let fs = self.fs_for(dir.dev);
        if fs.write_data(&mut **dir, off, &entry.to_bytes())? != DIRENT_SIZE {
            return Err(FsError::IoError);
        }
        dir.mark_dirty();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_layout() {
        let ent = DirEntry::new(0x0102, "hello").unwrap();
        let raw = ent.to_bytes();
        assert_eq!(&raw[..2], &[0x02, 0x01]);
        assert_eq!(&raw[2..7], b"hello");
        assert!(raw[7..].iter().all(|&b| b == 0));
        assert_eq!(DirEntry::from_bytes(&raw), ent);
    }

    #[test]
    fn test_full_length_name() {
        let ent = DirEntry::new(3, "abcdefghijklmn").unwrap();
        assert_eq!(ent.name(), "abcdefghijklmn");
        assert!(ent.matches("abcdefghijklmn"));
        assert!(!ent.matches("abcdefghijklm"));
    }

    #[test]
    fn test_invalid_entries() {
        assert_eq!(DirEntry::new(1, ""), Err(FsError::InvalidArgument));
        assert_eq!(DirEntry::new(1, "a/b"), Err(FsError::InvalidArgument));
        assert_eq!(DirEntry::new(1, "abcdefghijklmno"), Err(FsError::NameTooLong));
        assert_eq!(DirEntry::new(70000, "big"), Err(FsError::InvalidArgument));
    }

    #[test]
    fn test_empty_record_never_matches() {
        let ent = DirEntry::from_bytes(&[0u8; DIRENT_SIZE]);
        assert!(ent.is_empty());
        assert!(!ent.matches(""));
    }
}
