// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The copy engine: a per-platform fallback ladder from a kernel-assisted
//! fast path down to a manual chunked loop, with a single classification
//! function per platform (`classify.rs`) deciding whether a failed tier
//! should fall through or surface immediately.
//!
//! Generalizes `crates/file/src/directory.rs::copy`'s bare `std::fs::copy`
//! into that ladder.

mod classify;
mod fallback;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(windows)]
mod windows;

use std::fs;
use std::io;
use std::path::Path as StdPath;

use crate::error::{Error, Result};
use crate::path::Path;

struct Outcome {
    bytes: u64,
    attributes_carried: bool,
}

/// Options controlling a single [`copy`] call.
#[derive(Debug, Clone, Copy)]
pub struct CopyOptions {
    overwrite: bool,
    copy_attributes: bool,
    follow_symlinks: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            copy_attributes: false,
            follow_symlinks: true,
        }
    }
}

impl CopyOptions {
    /// Starts from the defaults: no overwrite, no attribute copy, symlinks
    /// followed (their target's contents are copied, not the link itself).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// If `true`, an existing destination is replaced instead of causing
    /// [`Error::AlreadyExists`].
    #[must_use]
    pub const fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// If `true`, the source's permission bits and modification time are
    /// applied to the destination when the chosen tier doesn't already
    /// carry them natively.
    #[must_use]
    pub const fn copy_attributes(mut self, copy_attributes: bool) -> Self {
        self.copy_attributes = copy_attributes;
        self
    }

    /// If `false`, a symlink source is recreated as a symlink at the
    /// destination instead of having its target's contents copied.
    #[must_use]
    pub const fn follow_symlinks(mut self, follow_symlinks: bool) -> Self {
        self.follow_symlinks = follow_symlinks;
        self
    }
}

/// Copies the file at `source` to `destination`, picking the fastest
/// available platform primitive and falling back down the ladder on
/// failures that indicate the fast path just isn't available here (crossing
/// filesystems, an unsupported destination, etc.). Failures that indicate a
/// real problem (permission denied, no space) are surfaced immediately
/// without trying further tiers.
///
/// # Errors
///
/// [`Error::AlreadyExists`] if `destination` exists and `options.overwrite`
/// is `false`. [`Error::NoSpace`], [`Error::PermissionDenied`], and other
/// [`Error::Io`]-derived kinds propagate from whichever tier ran.
pub fn copy(source: &Path, destination: &Path, options: CopyOptions) -> Result<()> {
    let source_std = source.as_std_path();
    let destination_std = destination.as_std_path();

    let source_meta = fs::symlink_metadata(source_std).map_err(Error::from_io)?;

    if !options.follow_symlinks && source_meta.file_type().is_symlink() {
        return copy_symlink(source_std, destination_std, options.overwrite);
    }

    preflight_destination(destination_std, options.overwrite)?;
    let len = source_meta.len();

    let outcome = match platform_copy(source_std, destination_std, len, options.copy_attributes) {
        Ok(outcome) => outcome,
        Err(e) => {
            // Every byte currently at `destination_std` was written by this
            // call (preflight already rejected a pre-existing destination
            // under `overwrite = false`), so a failed tier's partial output
            // is ours to clean up.
            let _ = fs::remove_file(destination_std);
            return Err(e);
        }
    };

    if options.copy_attributes && !outcome.attributes_carried {
        apply_attributes(destination_std, &source_meta)?;
    }

    Ok(())
}

#[cfg(target_os = "macos")]
fn platform_copy(source: &StdPath, destination: &StdPath, len: u64, copy_attributes: bool) -> Result<Outcome> {
    let outcome = macos::copy(source, destination, len, copy_attributes)?;
    Ok(Outcome { bytes: outcome.bytes, attributes_carried: outcome.attributes_carried })
}

#[cfg(all(target_os = "linux", not(target_os = "macos")))]
fn platform_copy(source: &StdPath, destination: &StdPath, len: u64, _copy_attributes: bool) -> Result<Outcome> {
    let mut src_file = std::fs::File::open(source).map_err(Error::from_io)?;
    let mut dst_file = create_destination(destination)?;
    let bytes = linux::copy(&mut src_file, &mut dst_file, len)?;
    Ok(Outcome { bytes, attributes_carried: false })
}

#[cfg(windows)]
fn platform_copy(source: &StdPath, destination: &StdPath, len: u64, _copy_attributes: bool) -> Result<Outcome> {
    let outcome = windows::copy(source, destination, len)?;
    Ok(Outcome { bytes: outcome.bytes, attributes_carried: outcome.attributes_carried })
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn platform_copy(source: &StdPath, destination: &StdPath, _len: u64, _copy_attributes: bool) -> Result<Outcome> {
    let mut src_file = std::fs::File::open(source).map_err(Error::from_io)?;
    let mut dst_file = create_destination(destination)?;
    let bytes = fallback::copy_remaining(&mut src_file, &mut dst_file)?;
    Ok(Outcome { bytes, attributes_carried: false })
}

#[cfg(not(any(target_os = "macos", windows)))]
fn create_destination(path: &StdPath) -> Result<std::fs::File> {
    std::fs::File::create(path).map_err(Error::from_io)
}

fn preflight_destination(destination: &StdPath, overwrite: bool) -> Result<()> {
    match fs::symlink_metadata(destination) {
        Ok(meta) if overwrite => {
            if meta.is_dir() {
                fs::remove_dir(destination).map_err(Error::from_io)
            } else {
                fs::remove_file(destination).map_err(Error::from_io)
            }
        }
        Ok(_) => Err(Error::AlreadyExists),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::from_io(e)),
    }
}

fn copy_symlink(source: &StdPath, destination: &StdPath, overwrite: bool) -> Result<()> {
    preflight_destination(destination, overwrite)?;
    let target = fs::read_link(source).map_err(Error::from_io)?;
    create_symlink(&target, destination)
}

#[cfg(unix)]
fn create_symlink(target: &StdPath, link: &StdPath) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(Error::from_io)
}

#[cfg(windows)]
fn create_symlink(target: &StdPath, link: &StdPath) -> Result<()> {
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };
    result.map_err(Error::from_io)
}

fn apply_attributes(destination: &StdPath, source_meta: &fs::Metadata) -> Result<()> {
    fs::set_permissions(destination, source_meta.permissions()).map_err(Error::from_io)?;
    let accessed = source_meta.accessed().unwrap_or_else(|_| std::time::SystemTime::now());
    let modified = source_meta.modified().map_err(Error::from_io)?;
    let times = fs::FileTimes::new().set_accessed(accessed).set_modified(modified);
    let file = fs::OpenOptions::new().write(true).open(destination).map_err(Error::from_io)?;
    file.set_times(times).map_err(Error::from_io)
}
