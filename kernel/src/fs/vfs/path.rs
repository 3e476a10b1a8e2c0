//! Path Resolution
//!
//! Walks slash-separated paths against the inode cache one component at a
//! time. Every non-final component is classified once as a normal
//! directory, the process's namespace root, or the root of a mounted
//! filesystem; the last two change what ".." means.
//!
//! Three entry points share the walk:
//!
//! - [`Vfs::inode_dname`] stops at the parent and returns the final name
//! - [`Vfs::inode_name`] resolves the final name and crosses into mounts
//! - [`Vfs::inode_nameb`] resolves the final name without crossing down

use super::inode::{FileMode, InodeRef, LockedInode, MAY_EXEC};
use super::{FsError, FsResult, Vfs};
use crate::config::NAME_MAX;

/// Split off the first component of `path`
///
/// Leading separators are skipped. Returns `("", "")` once the path is
/// exhausted, so a trailing slash is ignored.
pub fn break_path(path: &str) -> FsResult<(&str, &str)> {
    let path = path.trim_start_matches('/');
    let (name, rest) = path.split_once('/').unwrap_or((path, ""));

    if name.len() > NAME_MAX {
        return Err(FsError::NameTooLong);
    }
    Ok((name, rest))
}

/// Where a directory sits relative to the boundaries ".." respects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Normal,
    /// The calling process's root; ".." stays put
    ProcessRoot,
    /// Root of a mounted filesystem; ".." leaves the mount
    MountRoot,
}

/// Credentials and namespace anchors of the calling process
pub struct Process<'v> {
    pub uid: u16,
    pub gid: u16,
    root: InodeRef<'v>,
    pwd: InodeRef<'v>,
    /// Negative errno of the last failed syscall
    pub errno: i32,
}

impl<'v> Process<'v> {
    /// Process rooted at the global root, working in it
    pub fn new(vfs: &'v Vfs, uid: u16, gid: u16) -> FsResult<Self> {
        let root = vfs.root_inode()?;
        let pwd = root.dup();
        Ok(Self::with_dirs(uid, gid, root, pwd))
    }

    pub fn with_dirs(uid: u16, gid: u16, root: InodeRef<'v>, pwd: InodeRef<'v>) -> Self {
        Self {
            uid,
            gid,
            root,
            pwd,
            errno: 0,
        }
    }

    pub fn vfs(&self) -> &'v Vfs {
        self.root.vfs()
    }

    pub fn root(&self) -> &InodeRef<'v> {
        &self.root
    }

    pub fn pwd(&self) -> &InodeRef<'v> {
        &self.pwd
    }

    pub fn is_superuser(&self) -> bool {
        self.uid == 0
    }

    /// Change the working directory
    pub fn chdir(&mut self, path: &str) -> FsResult<()> {
        let dir = self.enterable(path)?;
        self.pwd = dir;
        Ok(())
    }

    /// Change the namespace root
    pub fn chroot(&mut self, path: &str) -> FsResult<()> {
        if !self.is_superuser() {
            return Err(FsError::PermissionDenied);
        }
        let dir = self.enterable(path)?;
        self.root = dir;
        Ok(())
    }

    fn enterable(&self, path: &str) -> FsResult<InodeRef<'v>> {
        let ip = self.vfs().inode_name(self, path)?;
        if !ip.is_directory() {
            return Err(FsError::NotDirectory);
        }
        if !permission(ip.mode, ip.uid, ip.gid, self, MAY_EXEC) {
            return Err(FsError::PermissionDenied);
        }
        Ok(ip.unlock())
    }
}

/// May `proc` access an object with `mode`, owned by `uid:gid`, for `mask`?
///
/// Owner bits apply when the uid matches, then group bits, then other bits.
/// The superuser passes read and write checks outright, and exec checks when
/// any exec bit is set or the object is a directory.
pub fn permission(mode: FileMode, uid: u16, gid: u16, proc: &Process<'_>, mask: u16) -> bool {
    let mask = mask & 0o7;

    if proc.is_superuser() {
        if mask & MAY_EXEC != 0 {
            return mode.0 & FileMode::S_IXUGO != 0 || mode.is_directory();
        }
        return true;
    }

    let bits = if proc.uid == uid {
        mode.0 >> 6
    } else if proc.gid == gid {
        mode.0 >> 3
    } else {
        mode.0
    };

    bits & mask == mask
}

impl Vfs {
    fn boundary(&self, proc: &Process<'_>, dir: &LockedInode<'_>) -> Boundary {
        let id = dir.id();
        if id == proc.root().id() {
            Boundary::ProcessRoot
        } else if self.mounts.lock().is_fs_root(id).is_some() {
            Boundary::MountRoot
        } else {
            Boundary::Normal
        }
    }

    /// Require traversal rights on `dir`
    fn may_search(&self, proc: &Process<'_>, dir: &LockedInode<'_>) -> FsResult<()> {
        if !dir.is_directory() {
            return Err(FsError::NotDirectory);
        }
        if !permission(dir.mode, dir.uid, dir.gid, proc, MAY_EXEC) {
            return Err(FsError::PermissionDenied);
        }
        Ok(())
    }

    /// Move from `dir` to its entry `name`
    ///
    /// `dir` is released before the entry is loaded.
    fn step<'v>(&'v self, dir: LockedInode<'v>, name: &str) -> FsResult<LockedInode<'v>> {
        let num = self.dir_search(&dir, name)?.ok_or(FsError::NotFound)?;
        let dev = dir.dev;
        drop(dir);
        self.inode_get(dev, num)
    }

    /// Resolve every component but the last
    ///
    /// Returns the locked parent directory and the final name. A path naming
    /// the start directory itself ("/" or "///") yields the name "/".
    pub fn inode_dname<'v, 'p>(
        &'v self,
        proc: &Process<'v>,
        path: &'p str,
    ) -> FsResult<(LockedInode<'v>, &'p str)> {
        if path.is_empty() {
            return Err(FsError::InvalidArgument);
        }

        let start = if path.starts_with('/') { proc.root() } else { proc.pwd() };
        let mut ip = start.dup().lock();

        let (mut name, mut rest) = break_path(path)?;
        if name.is_empty() {
            return Ok((ip, "/"));
        }

        loop {
            let (next, after) = break_path(rest)?;
            if next.is_empty() {
                return Ok((ip, name));
            }

            self.may_search(proc, &ip)?;

            if name == ".." {
                match self.boundary(proc, &ip) {
                    Boundary::ProcessRoot => {
                        name = next;
                        rest = after;
                        continue;
                    }
                    Boundary::MountRoot => {
                        ip = self.cross_up(ip)?;
                        self.may_search(proc, &ip)?;
                    }
                    Boundary::Normal => {}
                }
            }

            ip = self.step(ip, name)?;
            ip = self.cross_down(ip)?;

            name = next;
            rest = after;
        }
    }

    fn resolve<'v>(&'v self, proc: &Process<'v>, path: &str, cross: bool) -> FsResult<LockedInode<'v>> {
        let (mut dir, name) = self.inode_dname(proc, path)?;
        if name == "/" {
            return Ok(dir);
        }

        if name == ".." {
            match self.boundary(proc, &dir) {
                Boundary::ProcessRoot => return Ok(dir),
                Boundary::MountRoot => dir = self.cross_up(dir)?,
                Boundary::Normal => {}
            }
        }

        self.may_search(proc, &dir)?;
        let ip = self.step(dir, name)?;
        if cross {
            self.cross_down(ip)
        } else {
            Ok(ip)
        }
    }

    /// Resolve `path` to a locked inode, entering a final mount point
    pub fn inode_name<'v>(&'v self, proc: &Process<'v>, path: &str) -> FsResult<LockedInode<'v>> {
        self.resolve(proc, path, true)
    }

    /// Resolve `path` to a locked inode without entering a final mount point
    pub fn inode_nameb<'v>(&'v self, proc: &Process<'v>, path: &str) -> FsResult<LockedInode<'v>> {
        self.resolve(proc, path, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_break_path() {
        assert_eq!(break_path("/usr/bin"), Ok(("usr", "bin")));
        assert_eq!(break_path("///a//b/"), Ok(("a", "/b/")));
        assert_eq!(break_path("/b/"), Ok(("b", "")));
        assert_eq!(break_path("/"), Ok(("", "")));
        assert_eq!(break_path(""), Ok(("", "")));
    }

    #[test]
    fn test_break_path_name_limit() {
        assert_eq!(break_path("abcdefghijklmn"), Ok(("abcdefghijklmn", "")));
        assert_eq!(break_path("abcdefghijklmno/x"), Err(FsError::NameTooLong));
    }
}
