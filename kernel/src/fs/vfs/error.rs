//! Filesystem error kinds

use core::fmt;

/// Recoverable filesystem errors
///
/// Each kind maps onto a POSIX errno; [`FsError::errno`] gives the negative
/// value the syscall layer hands back to user space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    NotDirectory,
    IsDirectory,
    NoSpace,
    IoError,
    OutOfMemory,
    NameTooLong,
    Busy,
    NotSupported,
    NoDevice,
    /// No free in-core inode slot
    CacheExhausted,
}

impl FsError {
    /// Negative errno for this error
    pub const fn errno(self) -> i32 {
        -match self {
            FsError::NotFound => 2,
            FsError::IoError => 5,
            FsError::OutOfMemory => 12,
            FsError::PermissionDenied => 13,
            FsError::Busy => 16,
            FsError::AlreadyExists => 17,
            FsError::NoDevice => 19,
            FsError::NotDirectory => 20,
            FsError::IsDirectory => 21,
            FsError::InvalidArgument => 22,
            FsError::CacheExhausted => 23,
            FsError::NoSpace => 28,
            FsError::NameTooLong => 36,
            FsError::NotSupported => 95,
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsError::InvalidArgument => "invalid argument",
            FsError::NotFound => "no such file or directory",
            FsError::AlreadyExists => "file exists",
            FsError::PermissionDenied => "permission denied",
            FsError::NotDirectory => "not a directory",
            FsError::IsDirectory => "is a directory",
            FsError::NoSpace => "no space left on device",
            FsError::IoError => "I/O error",
            FsError::OutOfMemory => "out of memory",
            FsError::NameTooLong => "file name too long",
            FsError::Busy => "device or resource busy",
            FsError::NotSupported => "operation not supported",
            FsError::NoDevice => "no such device",
            FsError::CacheExhausted => "inode table overflow",
        };
        f.write_str(msg)
    }
}

/// Result type for filesystem operations
pub type FsResult<T> = Result<T, FsError>;
