// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A builder for the flags [`Handle::open`](crate::handle::Handle) and
//! [`Directory::open`](crate::directory::Directory::open) accept.
//!
//! Grounded on `crates/file/src/open_options.rs`'s builder shape
//! (`read`/`write`/`append`/`truncate`/`create`/`create_new`, each a
//! `const fn` setter), adapted to produce this crate's single [`Handle`]
//! type instead of one of the upstream crate's six file types.

use std::fs;

use crate::error::{Error, Result};
use crate::handle::{AccessMode, Handle};
use crate::path::Path;

/// A builder for the options a [`Handle`] is opened with.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    read: bool,
    write: bool,
    append: bool,
    truncate: bool,
    create: bool,
    create_new: bool,
    close_on_exec: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read: false,
            write: false,
            append: false,
            truncate: false,
            create: false,
            create_new: false,
            close_on_exec: true,
        }
    }
}

impl OpenOptions {
    /// Starts from every flag cleared, except `close_on_exec`, which
    /// defaults to `true`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    #[must_use]
    pub const fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    #[must_use]
    pub const fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    #[must_use]
    pub const fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    #[must_use]
    pub const fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Exclusive-create: fails with [`Error::AlreadyExists`] if the path
    /// already exists, instead of opening it.
    #[must_use]
    pub const fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    /// Whether the resulting descriptor is marked close-on-exec. Unix
    /// platforms already default `std::fs::File` to close-on-exec; this
    /// flag exists so callers can state the requirement explicitly rather
    /// than relying on the platform default. Defaults to `true`.
    #[must_use]
    pub const fn close_on_exec(mut self, close_on_exec: bool) -> Self {
        self.close_on_exec = close_on_exec;
        self
    }

    /// Opens `path` with these options, producing a [`Handle`].
    ///
    /// A plain blocking call — run it from inside an
    /// [`Executor`](crate::executor::Executor) worker closure, as with every
    /// other `Handle`-producing operation.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the path doesn't exist and neither `create`
    /// nor `create_new` is set. [`Error::AlreadyExists`] if `create_new` is
    /// set and the path exists. [`Error::IsDirectory`] if the path names a
    /// directory.
    pub fn open(&self, path: &Path) -> Result<Handle> {
        let mut options = fs::OpenOptions::new();
        options
            .read(self.read)
            .write(self.write)
            .append(self.append)
            .truncate(self.truncate)
            .create(self.create)
            .create_new(self.create_new);

        #[cfg(unix)]
        if self.close_on_exec {
            use std::os::unix::fs::OpenOptionsExt as _;
            options.custom_flags(libc::O_CLOEXEC);
        }

        let file = options.open(path.as_std_path()).map_err(Error::from_io)?;
        let mode = access_mode(self.read, self.write || self.append);
        Ok(Handle::from_file(file, mode))
    }
}

fn access_mode(read: bool, write: bool) -> AccessMode {
    match (read, write) {
        (true, true) => AccessMode::ReadWrite,
        (_, true) => AccessMode::Write,
        _ => AccessMode::Read,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_new_fails_if_the_file_already_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"x").expect("seed");
        let path = Path::new(path.to_str().expect("utf8 path")).expect("valid path");

        let result = OpenOptions::new().write(true).create_new(true).open(&path);
        assert!(matches!(result, Err(Error::AlreadyExists)));
    }

    #[test]
    fn create_makes_a_new_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("a.txt");
        let path = Path::new(raw.to_str().expect("utf8 path")).expect("valid path");

        let handle = OpenOptions::new().write(true).create(true).open(&path).expect("open");
        assert_eq!(handle.mode(), AccessMode::Write);
        assert!(raw.exists());
    }

    #[test]
    fn missing_file_without_create_fails_with_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let raw = dir.path().join("missing.txt");
        let path = Path::new(raw.to_str().expect("utf8 path")).expect("valid path");

        let result = OpenOptions::new().read(true).open(&path);
        assert!(matches!(result, Err(Error::NotFound)));
    }
}
