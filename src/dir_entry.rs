// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ffi::{OsStr, OsString};
use std::fs::{FileType, Metadata};

use crate::error::Error;

/// An entry within a directory, produced by [`crate::dir::ReadDir`].
/// [`crate::dir::Walk`] yields plain paths instead.
///
/// Unlike `std::fs::DirEntry`, this type does not expose the full path to the
/// entry, preserving the capability-based access model: a caller holding only
/// a `DirEntry` cannot construct an absolute path to escape the `Directory`
/// it was read from.
///
/// Metadata and file type are fetched eagerly during directory iteration, so
/// accessing them is allocation-free and instant.
#[derive(Debug)]
pub struct DirEntry {
    file_name: OsString,
    file_type: Result<FileType, std::io::Error>,
    metadata: Result<Metadata, std::io::Error>,
    depth: usize,
}

impl DirEntry {
    /// Creates a `DirEntry` by eagerly capturing all data from a `std::fs::DirEntry`.
    pub(crate) fn from_std(entry: &std::fs::DirEntry, depth: usize) -> Self {
        let file_name = entry.file_name();
        let metadata = entry.metadata();
        // Extract file_type from metadata when available, avoiding a
        // separate syscall on platforms where file_type() would stat again.
        let file_type = metadata.as_ref().map_or_else(|_| entry.file_type(), |m| Ok(m.file_type()));
        Self {
            file_name,
            file_type,
            metadata,
            depth,
        }
    }

    /// Returns the bare file name of this directory entry without any other
    /// leading path component.
    #[must_use]
    pub fn file_name(&self) -> &OsStr {
        &self.file_name
    }

    /// Returns the metadata for the file that this entry points at.
    ///
    /// This function will not traverse symlinks if this entry points at a
    /// symlink.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata could not be read when the directory
    /// was iterated.
    pub fn metadata(&self) -> Result<&Metadata, Error> {
        self.metadata.as_ref().map_err(|e| Error::from_io(clone_io_error(e)))
    }

    /// Returns the file type for the file that this entry points at.
    ///
    /// This function will not traverse symlinks if this entry points at a
    /// symlink.
    ///
    /// # Errors
    ///
    /// Returns an error if the file type could not be read when the directory
    /// was iterated.
    pub fn file_type(&self) -> Result<FileType, Error> {
        match &self.file_type {
            Ok(ft) => Ok(*ft),
            Err(e) => Err(Error::from_io(clone_io_error(e))),
        }
    }

    /// Depth of this entry relative to the root of the walk that produced it
    /// (`0` for entries of the directory passed to [`crate::dir::Walk::new`]).
    ///
    /// Always `0` for entries produced by a flat [`crate::dir::ReadDir`].
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

fn clone_io_error(err: &std::io::Error) -> std::io::Error {
    match err.raw_os_error() {
        Some(code) => std::io::Error::from_raw_os_error(code),
        None => std::io::Error::new(err.kind(), err.to_string()),
    }
}
