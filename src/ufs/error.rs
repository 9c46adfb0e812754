//! Error type shared by the filesystem, the path service and the tools.

use std::io;
use thiserror::Error;

/// A filesystem operation result.
pub type FsResult<T> = Result<T, UfsError>;

/// The errors surfaced through the filesystem API.
///
/// Block-device failures convert from [`io::Error`] and are fatal for the
/// call that hit them; the enclosing transaction rolls back before the error
/// reaches the caller.
#[derive(Debug, Error)]
pub enum UfsError {
    /// The named entry does not exist.
    #[error("not found")]
    NotFound,
    /// The request is malformed.
    #[error("bad request")]
    BadRequest,
    /// No free inode or data block is left.
    #[error("out of space")]
    OutOfSpace,
    /// The block device failed.
    #[error("disk error: {0}")]
    Io(#[from] io::Error),
    /// The inode number is out of range or not of the expected type.
    #[error("invalid inode")]
    InvalidInode,
    /// The requested size is out of range.
    #[error("invalid size")]
    InvalidSize,
    /// The object's type does not allow the operation.
    #[error("invalid type")]
    InvalidType,
    /// The name is empty, too long, or contains a reserved character.
    #[error("invalid name")]
    InvalidName,
    /// The directory still contains entries other than `.` and `..`.
    #[error("directory not empty")]
    DirNotEmpty,
    /// The entry may not be unlinked.
    #[error("unlink not allowed")]
    UnlinkNotAllowed,
}

impl UfsError {
    /// Returns the stable numeric code of the error.
    ///
    /// `0` is reserved for success and never returned here.
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound => -1,
            Self::BadRequest => -2,
            Self::OutOfSpace => -3,
            Self::Io(_) => -4,
            Self::InvalidInode => -5,
            Self::InvalidSize => -6,
            Self::InvalidType => -7,
            Self::InvalidName => -8,
            Self::DirNotEmpty => -9,
            Self::UnlinkNotAllowed => -10,
        }
    }

    /// Tells whether the error reports a malformed request rather than a
    /// missing object or an internal failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::BadRequest
                | Self::InvalidInode
                | Self::InvalidSize
                | Self::InvalidType
                | Self::InvalidName
                | Self::DirNotEmpty
                | Self::UnlinkNotAllowed
        )
    }
}
