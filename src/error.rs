// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io;

/// The crate's result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed error taxonomy shared by every public operation in this crate.
///
/// Every fallible operation returns one of these kinds. `Io` is the catch-all
/// used only when none of the more specific kinds apply.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("permission denied")]
    PermissionDenied,

    #[error("is a directory")]
    IsDirectory,

    #[error("not a directory")]
    NotDirectory,

    #[error("no space left on device")]
    NoSpace,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid handle")]
    InvalidHandle,

    #[error("handle belongs to a different executor")]
    ScopeMismatch,

    #[error("executor is shutting down or has shut down")]
    Shutdown,

    #[error("operation was cancelled")]
    Cancelled,

    #[error("unsupported on this platform")]
    Unsupported,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Builds an [`Error::InvalidArgument`] with a formatted message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// The underlying platform error code, when this error wraps one.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Classifies a raw [`io::Error`] into the crate's taxonomy using its
    /// [`io::ErrorKind`] first, falling back to the transparent [`Error::Io`]
    /// variant when no more specific kind applies.
    pub(crate) fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            #[cfg(unix)]
            _ if err.raw_os_error() == Some(libc::ENOSPC) => Self::NoSpace,
            #[cfg(unix)]
            _ if err.raw_os_error() == Some(libc::ENOTDIR) => Self::NotDirectory,
            #[cfg(unix)]
            _ if err.raw_os_error() == Some(libc::EISDIR) => Self::IsDirectory,
            _ => Self::Io(err),
        }
    }
}
