#![forbid(unsafe_code)]
//! Error types for SeamFS.
//!
//! Defines `SfsError` and the `Errno` value the policy engine returns.
//! Selection failures travel as explicit values, never through a
//! thread-local errno slot.

use sfs_types::BranchParseError;
use std::fmt;
use thiserror::Error;

/// A POSIX errno carried as an explicit value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    pub const ENOENT: Self = Self(libc::ENOENT);
    pub const EACCES: Self = Self(libc::EACCES);
    pub const EROFS: Self = Self(libc::EROFS);
    pub const ENOSPC: Self = Self(libc::ENOSPC);
    pub const EINVAL: Self = Self(libc::EINVAL);
    pub const EIO: Self = Self(libc::EIO);

    #[must_use]
    pub fn raw(self) -> i32 {
        self.0
    }

    /// Symbolic name for the common values, `None` for the rest.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        match self.0 {
            v if v == libc::ENOENT => Some("ENOENT"),
            v if v == libc::EACCES => Some("EACCES"),
            v if v == libc::EROFS => Some("EROFS"),
            v if v == libc::ENOSPC => Some("ENOSPC"),
            v if v == libc::EINVAL => Some("EINVAL"),
            v if v == libc::EIO => Some("EIO"),
            v if v == libc::EPERM => Some("EPERM"),
            v if v == libc::EEXIST => Some("EEXIST"),
            v if v == libc::ENOTDIR => Some("ENOTDIR"),
            v if v == libc::EISDIR => Some("EISDIR"),
            _ => None,
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "errno {}", self.0),
        }
    }
}

impl From<std::io::Error> for Errno {
    fn from(err: std::io::Error) -> Self {
        Self(err.raw_os_error().unwrap_or(libc::EIO))
    }
}

/// Unified error type for SeamFS operations outside the policy hot path.
#[derive(Debug, Error)]
pub enum SfsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid branch specification: {0}")]
    Branch(#[from] BranchParseError),

    #[error("unknown policy {0:?}")]
    UnknownPolicy(String),

    #[error("no branch qualified: {0}")]
    NoBranch(Errno),
}

impl SfsError {
    /// Convert this error into a POSIX errno suitable for a VFS reply.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::Branch(_) | Self::UnknownPolicy(_) => libc::EINVAL,
            Self::NoBranch(errno) => errno.raw(),
        }
    }
}

/// Result alias using `SfsError`.
pub type Result<T> = std::result::Result<T, SfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_display_uses_symbolic_names() {
        assert_eq!(Errno::ENOENT.to_string(), "ENOENT");
        assert_eq!(Errno::ENOSPC.to_string(), "ENOSPC");
        assert_eq!(Errno(4095).to_string(), "errno 4095");
    }

    #[test]
    fn errno_from_io_error() {
        let err = std::io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(Errno::from(err), Errno::EACCES);

        let err = std::io::Error::other("synthetic");
        assert_eq!(Errno::from(err), Errno::EIO);
    }

    #[test]
    fn sfs_error_to_errno() {
        assert_eq!(
            SfsError::UnknownPolicy("nope".to_owned()).to_errno(),
            libc::EINVAL
        );
        assert_eq!(SfsError::NoBranch(Errno::EROFS).to_errno(), libc::EROFS);
        assert_eq!(
            SfsError::Io(std::io::Error::from_raw_os_error(libc::ENOSPC)).to_errno(),
            libc::ENOSPC
        );
    }
}
