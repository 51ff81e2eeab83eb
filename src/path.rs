// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The validated [`Path`] data type.
//!
//! Unlike `std::path::Path`, this type is never canonicalized and never
//! resolves `..`; it is validated once at construction time (no embedded
//! NUL, no embedded newline, no empty components other than the root) and
//! compares by byte identity from then on.

use std::ffi::OsStr;
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// An immutable, validated filesystem path.
///
/// `Path` does not resolve `..` or symlinks and is not canonicalized; it
/// only rejects inputs that could never name a real entry on any supported
/// platform (embedded NUL bytes, embedded newlines, empty components).
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Path {
    inner: PathBuf,
}

impl Path {
    /// Validates and wraps `raw` as a [`Path`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `raw` contains an embedded NUL
    /// or newline byte, or an empty non-root component (e.g. `a//b`).
    pub fn new(raw: impl Into<PathBuf>) -> Result<Self> {
        let inner: PathBuf = raw.into();
        Self::validate(&inner)?;
        Ok(Self { inner })
    }

    #[cfg(unix)]
    fn has_byte(os_str: &OsStr, byte: u8) -> bool {
        use std::os::unix::ffi::OsStrExt as _;
        os_str.as_bytes().contains(&byte)
    }

    #[cfg(windows)]
    fn has_byte(os_str: &OsStr, byte: u8) -> bool {
        use std::os::windows::ffi::OsStrExt as _;
        os_str.encode_wide().any(|unit| unit == u16::from(byte))
    }

    fn validate(path: &std::path::Path) -> Result<()> {
        let os_str = path.as_os_str();
        if Self::has_byte(os_str, 0) {
            return Err(Error::invalid_argument("path contains an embedded NUL byte"));
        }
        if Self::has_byte(os_str, b'\n') {
            return Err(Error::invalid_argument("path contains an embedded newline"));
        }
        // `Components` silently collapses repeated separators, so an empty
        // component (`a//b`) has to be caught in the raw text instead.
        let text = os_str.to_string_lossy();
        let doubled_separator = if cfg!(windows) {
            text.contains("//") || text.contains(r"\\")
        } else {
            text.contains("//")
        };
        if doubled_separator {
            return Err(Error::invalid_argument("path contains an empty component"));
        }
        Ok(())
    }

    /// Borrows the underlying `std::path::Path`.
    ///
    /// This is the escape hatch used internally to hand the validated value
    /// to `std::fs`/`libc`/`windows-sys` calls; it performs no further
    /// resolution.
    #[must_use]
    pub fn as_std_path(&self) -> &std::path::Path {
        &self.inner
    }

    /// Returns the path as an `OsStr`.
    #[must_use]
    pub fn as_os_str(&self) -> &OsStr {
        self.inner.as_os_str()
    }

    /// Consumes this `Path`, returning the inner `PathBuf`.
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.inner
    }

    /// Whether this path is absolute.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.inner.is_absolute()
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.display())
    }
}

impl AsRef<std::path::Path> for Path {
    fn as_ref(&self) -> &std::path::Path {
        &self.inner
    }
}

impl TryFrom<PathBuf> for Path {
    type Error = Error;

    fn try_from(value: PathBuf) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Path {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(PathBuf::from(value))
    }
}
