// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The atomic-write protocol.
//!
//! Built on the temp-sibling-then-rename pattern, generalized to several
//! durability levels and optional exclusive-rename semantics.
//!
//! Every function here is a plain blocking call, run from inside an
//! [`Executor`](crate::executor::Executor) worker closure — the same
//! convention [`crate::handle::Handle`] follows.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path as StdPath, PathBuf};

use crate::error::{Error, Result};

/// How durably [`atomic_write`] flushes the temporary file before renaming
/// it into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// `fsync`-equivalent on the temp file's data and metadata, and (unless
    /// running on Windows, which has no directory-handle fsync) on the
    /// containing directory afterward — the strongest guarantee this
    /// protocol offers against a crash losing the write or the rename.
    Full,
    /// Flush data only; skip the directory fsync. Cheaper, but a crash
    /// between rename and the next directory fsync done by *something else*
    /// can still lose the rename on some filesystems.
    DataOnly,
    /// No flush at all. The temp file is written and renamed, relying
    /// entirely on the filesystem's own ordering.
    None,
}

/// Options controlling a single [`atomic_write`] call.
#[derive(Debug, Clone, Copy)]
pub struct AtomicWriteOptions {
    durability: Durability,
    exclusive: bool,
    permissions: Option<u32>,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self {
        Self {
            durability: Durability::Full,
            exclusive: false,
            permissions: None,
        }
    }
}

impl AtomicWriteOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the durability level. Defaults to [`Durability::Full`].
    #[must_use]
    pub const fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// If `true`, the final rename fails with [`Error::AlreadyExists`]
    /// instead of silently replacing an existing file at the target path.
    #[must_use]
    pub const fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Unix permission bits to apply to the temp file before it is renamed
    /// into place. Ignored on Windows.
    #[must_use]
    pub const fn permissions(mut self, mode: u32) -> Self {
        self.permissions = Some(mode);
        self
    }
}

/// Writes `contents` to `target` such that an observer never sees a partial
/// write: the data is written to a freshly created temp file in the same
/// directory, flushed per `options.durability`, then renamed into place.
///
/// # Errors
///
/// [`Error::AlreadyExists`] if `options.exclusive` is set and `target`
/// already exists. Any I/O failure during the write leaves `target`
/// untouched and removes the temp file on a best-effort basis.
pub fn atomic_write(target: &StdPath, contents: &[u8], options: AtomicWriteOptions) -> Result<()> {
    let temp_path = temp_sibling(target)?;

    let write_result = write_temp(&temp_path, contents, &options);
    if let Err(e) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    let rename_result = if options.exclusive {
        rename_exclusive(&temp_path, target)
    } else {
        fs::rename(&temp_path, target).map_err(Error::from_io)
    };
    if let Err(e) = rename_result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if options.durability == Durability::Full {
        fsync_parent_dir(target)?;
    }

    Ok(())
}

fn write_temp(temp_path: &StdPath, contents: &[u8], options: &AtomicWriteOptions) -> Result<()> {
    let mut file = File::options()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .map_err(Error::from_io)?;

    file.write_all(contents).map_err(classify_write_error)?;

    #[cfg(unix)]
    if let Some(mode) = options.permissions {
        use std::os::unix::fs::PermissionsExt as _;
        file.set_permissions(fs::Permissions::from_mode(mode)).map_err(Error::from_io)?;
    }

    match options.durability {
        Durability::Full => file.sync_all().map_err(Error::from_io)?,
        Durability::DataOnly => sync_data_only(&file)?,
        Durability::None => {}
    }

    Ok(())
}

fn classify_write_error(err: std::io::Error) -> Error {
    #[cfg(unix)]
    if err.raw_os_error() == Some(libc::ENOSPC) {
        return Error::NoSpace;
    }
    Error::from_io(err)
}

#[cfg(unix)]
fn sync_data_only(file: &File) -> Result<()> {
    use std::os::unix::io::AsRawFd as _;
    // SAFETY: `fd` borrowed for the call only; `file` outlives it.
    let rc = unsafe { libc::fdatasync(file.as_raw_fd()) };
    if rc != 0 {
        return Err(Error::from_io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(windows)]
fn sync_data_only(file: &File) -> Result<()> {
    file.sync_all().map_err(Error::from_io)
}

/// Builds a temp-file path alongside `target`, named
/// `.{file_name}.iofs-tmp-{16 random hex digits}`.
fn temp_sibling(target: &StdPath) -> Result<PathBuf> {
    let file_name = target
        .file_name()
        .ok_or_else(|| Error::invalid_argument("atomic_write target has no file name"))?
        .to_string_lossy();
    let parent = target.parent().unwrap_or_else(|| StdPath::new("."));
    let suffix: u64 = fastrand::u64(..);
    Ok(parent.join(format!(".{file_name}.iofs-tmp-{suffix:016x}")))
}

#[cfg(not(target_os = "linux"))]
fn rename_exclusive(temp_path: &StdPath, target: &StdPath) -> Result<()> {
    // No portable rename-no-replace primitive on this platform; fall back to
    // a check-then-rename sequence. This has a benign TOCTOU window (another
    // writer could create `target` between the check and the rename), noted
    // in `DESIGN.md`.
    if fs::symlink_metadata(target).is_ok() {
        return Err(Error::AlreadyExists);
    }
    fs::rename(temp_path, target).map_err(Error::from_io)
}

#[cfg(target_os = "linux")]
fn rename_exclusive(temp_path: &StdPath, target: &StdPath) -> Result<()> {
    linux_renameat2::rename_no_replace(temp_path, target)
}

#[cfg(target_os = "linux")]
mod linux_renameat2 {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt as _;
    use std::path::Path as StdPath;

    use crate::error::{Error, Result};

    const AT_FDCWD: i32 = -100;
    const RENAME_NOREPLACE: u32 = 1 << 0;

    #[cfg(target_arch = "x86_64")]
    const SYS_RENAMEAT2: i64 = 316;
    #[cfg(target_arch = "aarch64")]
    const SYS_RENAMEAT2: i64 = 276;
    #[cfg(target_arch = "x86")]
    const SYS_RENAMEAT2: i64 = 353;

    /// Renames `old` to `new`, failing with [`Error::AlreadyExists`] if `new`
    /// already exists, atomically (`renameat2(..., RENAME_NOREPLACE)`) where
    /// the syscall number for the running architecture is known.
    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "x86"))]
    pub(super) fn rename_no_replace(old: &StdPath, new: &StdPath) -> Result<()> {
        let old_c = CString::new(old.as_os_str().as_bytes()).expect("path has no embedded NUL");
        let new_c = CString::new(new.as_os_str().as_bytes()).expect("path has no embedded NUL");

        // SAFETY: both `CString`s remain alive for the duration of the call.
        let rc = unsafe {
            libc::syscall(
                SYS_RENAMEAT2,
                AT_FDCWD,
                old_c.as_ptr(),
                AT_FDCWD,
                new_c.as_ptr(),
                RENAME_NOREPLACE,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ENOSYS) => fallback(old, new),
            Some(libc::EEXIST) => Err(Error::AlreadyExists),
            _ => Err(Error::from_io(err)),
        }
    }

    /// `renameat2`'s syscall number is unknown on this architecture.
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "x86")))]
    pub(super) fn rename_no_replace(_old: &StdPath, _new: &StdPath) -> Result<()> {
        Err(Error::Unsupported)
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "x86"))]
    fn fallback(old: &StdPath, new: &StdPath) -> Result<()> {
        if std::fs::symlink_metadata(new).is_ok() {
            return Err(Error::AlreadyExists);
        }
        std::fs::rename(old, new).map_err(Error::from_io)
    }
}

#[cfg(not(windows))]
fn fsync_parent_dir(target: &StdPath) -> Result<()> {
    let parent = target.parent().unwrap_or_else(|| StdPath::new("."));
    let dir = File::open(parent).map_err(Error::from_io)?;
    dir.sync_all().map_err(Error::from_io)
}

#[cfg(windows)]
fn fsync_parent_dir(_target: &StdPath) -> Result<()> {
    // Windows has no directory-handle fsync; the rename's own durability is
    // the best this protocol can do here.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_visible_only_after_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("config.toml");
        atomic_write(&target, b"hello", AtomicWriteOptions::new()).expect("atomic_write");
        assert_eq!(fs::read(&target).expect("read back"), b"hello");
        let leftover = fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "config.toml")
            .count();
        assert_eq!(leftover, 0, "temp file must not survive a successful write");
    }

    #[test]
    fn overwrites_existing_file_by_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("config.toml");
        fs::write(&target, b"old").expect("seed");
        atomic_write(&target, b"new", AtomicWriteOptions::new()).expect("atomic_write");
        assert_eq!(fs::read(&target).expect("read back"), b"new");
    }

    #[test]
    fn exclusive_rejects_existing_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("config.toml");
        fs::write(&target, b"old").expect("seed");
        let result = atomic_write(&target, b"new", AtomicWriteOptions::new().exclusive(true));
        assert!(matches!(result, Err(Error::AlreadyExists)));
        assert_eq!(fs::read(&target).expect("unchanged"), b"old");
    }

    #[test]
    fn exclusive_succeeds_against_a_fresh_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("config.toml");
        atomic_write(&target, b"fresh", AtomicWriteOptions::new().exclusive(true)).expect("atomic_write");
        assert_eq!(fs::read(&target).expect("read back"), b"fresh");
    }

    #[test]
    fn temp_file_is_cleaned_up_on_write_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A directory target makes the temp-file open succeed but the final
        // rename step moot; instead we exercise cleanup by writing to a path
        // whose parent does not exist, which fails at temp-file creation.
        let target = dir.path().join("missing-parent").join("config.toml");
        let result = atomic_write(&target, b"data", AtomicWriteOptions::new());
        assert!(result.is_err());
    }
}
