//! Core error type, shared by every operation in the crate.
//!
//! The FUSE adapter is the only place this gets translated into a raw
//! errno; everywhere else it is propagated as an ordinary `Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("name too long")]
    NameTooLong,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("is a directory")]
    IsADirectory,
    #[error("file too large for this image")]
    FileTooBig,
    #[error("no space left on device")]
    NoSpace,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// Maps a core error onto the errno `reply.error()` expects at the FUSE boundary.
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::NotPermitted => libc::EPERM,
            FsError::IsADirectory => libc::EISDIR,
            FsError::FileTooBig => libc::EFBIG,
            FsError::NoSpace => libc::ENOSPC,
            FsError::Io(_) => libc::EIO,
        }
    }
}
