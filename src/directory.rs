// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The capability-based [`Directory`] (component C0): every path accepted by
//! its methods is relative to the directory it was bound or narrowed to, and
//! is lexically confined there by [`crate::path_utils::safe_join`] before any
//! I/O happens.
//!
//! Grounded on `crates/file/src/directory.rs`, generalized from that file's
//! ad hoc `std::fs` calls onto this crate's [`Handle`]/[`Executor`]/copy
//! ladder/atomic-write protocol.

use std::fs::{FileType, Metadata, Permissions};
use std::path::{Path as StdPath, PathBuf};

use crate::atomic_write::{self, AtomicWriteOptions};
use crate::copy::{self, CopyOptions};
use crate::dir::{ReadDir, ReadDirOptions, Walk, WalkOptions};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::handle::Handle;
use crate::open_options::OpenOptions;
use crate::path::Path;
use crate::path_utils::safe_join;

/// A capability representing access to a directory on the filesystem.
///
/// All paths accepted by `Directory` methods are relative to the directory it
/// represents; components that would escape it (a leading `..` at the root,
/// an absolute path) are rejected before any filesystem call is made. Cloning
/// a `Directory` is cheap — it shares the underlying [`Executor`].
#[derive(Debug, Clone)]
pub struct Directory {
    base_path: PathBuf,
    executor: Executor,
}

impl Directory {
    pub(crate) const fn new(base_path: PathBuf, executor: Executor) -> Self {
        Self { base_path, executor }
    }

    /// The canonical absolute path this directory is bound to.
    #[must_use]
    pub fn base_path(&self) -> &StdPath {
        &self.base_path
    }

    pub(crate) const fn executor(&self) -> &Executor {
        &self.executor
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        safe_join(&self.base_path, path.as_std_path())
    }

    /// Opens a subdirectory, returning a new `Directory` capability scoped to
    /// it — the sole mechanism for narrowing a capability in this model.
    ///
    /// # Errors
    ///
    /// [`Error::NotDirectory`] if `path` exists but isn't a directory;
    /// [`Error::NotFound`] if it doesn't exist; [`Error::InvalidArgument`] if
    /// `path` would escape this directory.
    pub async fn open_dir(&self, path: &Path) -> Result<Self> {
        let full_path = self.resolve(path)?;
        let executor = self.executor.clone();
        let base_path = self
            .executor
            .run(move || {
                let metadata = std::fs::metadata(&full_path).map_err(Error::from_io)?;
                if !metadata.is_dir() {
                    return Err(Error::NotDirectory);
                }
                Ok(full_path)
            })
            .await?;
        Ok(Self { base_path, executor })
    }

    /// Opens a file within this directory per `options`, producing a
    /// [`Handle`]. The caller is responsible for registering it with an
    /// [`Executor`] (typically this directory's own) if it needs to be
    /// addressed by [`crate::executor::HandleId`] afterward.
    ///
    /// # Errors
    ///
    /// See [`OpenOptions::open`].
    pub async fn open(&self, path: &Path, options: OpenOptions) -> Result<Handle> {
        let full_path = Path::new(self.resolve(path)?)?;
        self.executor.run(move || options.open(&full_path)).await
    }

    /// Returns the canonical, absolute form of `path` with symlinks resolved.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `path` does not exist.
    pub async fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::canonicalize(&full_path).map_err(Error::from_io)).await
    }

    /// Copies `src` (relative to this directory) to `dst` (relative to
    /// `dst_dir`) using the platform copy ladder (component C3).
    ///
    /// # Errors
    ///
    /// See [`crate::copy::copy`].
    pub async fn copy(&self, src: &Path, dst_dir: &Self, dst: &Path, options: CopyOptions) -> Result<()> {
        let src_path = Path::new(self.resolve(src)?)?;
        let dst_path = Path::new(dst_dir.resolve(dst)?)?;
        self.executor.run(move || copy::copy(&src_path, &dst_path, options)).await
    }

    /// Writes `contents` to `path` via the atomic-write protocol
    /// (component C4) instead of a plain truncate-and-write.
    ///
    /// # Errors
    ///
    /// See [`crate::atomic_write::atomic_write`].
    pub async fn write_atomic(&self, path: &Path, contents: Vec<u8>, options: AtomicWriteOptions) -> Result<()> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || atomic_write::atomic_write(&full_path, &contents, options)).await
    }

    /// Creates a new, empty directory at `path`.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyExists`] if `path` already exists.
    pub async fn create_dir(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::create_dir(&full_path).map_err(Error::from_io)).await
    }

    /// Recursively creates `path` and any missing parent components.
    /// Succeeds if the full path already exists.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures from any intermediate component's creation.
    pub async fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::create_dir_all(&full_path).map_err(Error::from_io)).await
    }

    /// Returns whether `path` names an existing entity, following symlinks.
    ///
    /// # Errors
    ///
    /// Only on I/O failures unrelated to whether the path exists (e.g. a
    /// permission-denied traversal of an intermediate component).
    pub async fn exists(&self, path: &Path) -> Result<bool> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || full_path.try_exists().map_err(Error::from_io)).await
    }

    /// Creates a hard link: `dst` (relative to `dst_dir`) becomes a link to
    /// `src` (relative to this directory). Neither path may name a directory.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `src` doesn't exist; platform errors if the two
    /// paths cross filesystems.
    pub async fn hard_link(&self, src: &Path, dst_dir: &Self, dst: &Path) -> Result<()> {
        let src_path = self.resolve(src)?;
        let dst_path = dst_dir.resolve(dst)?;
        self.executor.run(move || std::fs::hard_link(&src_path, &dst_path).map_err(Error::from_io)).await
    }

    /// Queries metadata for `path`, following symlinks.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `path` doesn't exist.
    pub async fn metadata(&self, path: &Path) -> Result<Metadata> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::metadata(&full_path).map_err(Error::from_io)).await
    }

    /// Reads the entire contents of `path` into a `Vec<u8>`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `path` doesn't exist; [`Error::IsDirectory`] if
    /// it names a directory.
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::read(&full_path).map_err(Error::from_io)).await
    }

    /// Reads the entire contents of `path` as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// As [`Directory::read`], plus an I/O-kind error if the contents are not
    /// valid UTF-8.
    pub async fn read_to_string(&self, path: &Path) -> Result<String> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::read_to_string(&full_path).map_err(Error::from_io)).await
    }

    /// Returns a batched, backpressured [`ReadDir`] over the entries of
    /// `path`. The directory is opened synchronously on the executor before
    /// this call returns; entries are streamed lazily as the iterator is
    /// driven.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`]/[`Error::NotDirectory`] if `path` isn't an
    /// existing directory.
    pub async fn read_dir(&self, path: &Path, options: ReadDirOptions) -> Result<ReadDir> {
        let full_path = self.resolve(path)?;
        preflight_is_dir(&self.executor, full_path.clone()).await?;
        Ok(ReadDir::spawn(self.executor.clone(), full_path, options))
    }

    /// Returns a batched, backpressured [`Walk`] over every path reached by
    /// recursively descending from `path`.
    ///
    /// # Errors
    ///
    /// As [`Directory::read_dir`].
    pub async fn walk(&self, path: &Path, options: WalkOptions) -> Result<Walk> {
        let full_path = self.resolve(path)?;
        preflight_is_dir(&self.executor, full_path.clone()).await?;
        Ok(Walk::spawn(self.executor.clone(), full_path, options))
    }

    /// Reads the target of a symbolic link at `path`.
    ///
    /// # Errors
    ///
    /// Fails if `path` doesn't exist or isn't a symlink.
    pub async fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::read_link(&full_path).map_err(Error::from_io)).await
    }

    /// Removes an existing, empty directory at `path`.
    ///
    /// # Errors
    ///
    /// Fails if `path` doesn't exist or isn't empty.
    pub async fn remove_dir(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::remove_dir(&full_path).map_err(Error::from_io)).await
    }

    /// Removes `path` and everything beneath it. Use carefully — there is no
    /// capability-level undo.
    ///
    /// # Errors
    ///
    /// Propagates the first I/O failure encountered while clearing the tree.
    pub async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::remove_dir_all(&full_path).map_err(Error::from_io)).await
    }

    /// Removes the file at `path`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if it doesn't exist.
    pub async fn remove_file(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::remove_file(&full_path).map_err(Error::from_io)).await
    }

    /// Renames `src` (relative to this directory) to `dst` (relative to
    /// `dst_dir`), replacing an existing `dst`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `src` doesn't exist.
    pub async fn rename(&self, src: &Path, dst_dir: &Self, dst: &Path) -> Result<()> {
        let src_path = self.resolve(src)?;
        let dst_path = dst_dir.resolve(dst)?;
        self.executor.run(move || std::fs::rename(&src_path, &dst_path).map_err(Error::from_io)).await
    }

    /// Changes the permission bits of `path`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `path` doesn't exist.
    pub async fn set_permissions(&self, path: &Path, permissions: Permissions) -> Result<()> {
        let full_path = self.resolve(path)?;
        self.executor
            .run(move || std::fs::set_permissions(&full_path, permissions).map_err(Error::from_io))
            .await
    }

    /// Creates a symbolic link at `link` pointing to `original`, both
    /// relative to this directory.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyExists`] if `link` already exists.
    pub async fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        let original_path = self.resolve(original)?;
        let link_path = self.resolve(link)?;
        self.executor
            .run(move || {
                #[cfg(unix)]
                {
                    std::os::unix::fs::symlink(&original_path, &link_path).map_err(Error::from_io)
                }
                #[cfg(windows)]
                {
                    let points_at_dir = std::fs::metadata(&original_path).map(|m| m.is_dir()).unwrap_or(false);
                    let result = if points_at_dir {
                        std::os::windows::fs::symlink_dir(&original_path, &link_path)
                    } else {
                        std::os::windows::fs::symlink_file(&original_path, &link_path)
                    };
                    result.map_err(Error::from_io)
                }
            })
            .await
    }

    /// Queries metadata for `path` without following a terminal symlink.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `path` doesn't exist.
    pub async fn symlink_metadata(&self, path: &Path) -> Result<Metadata> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::symlink_metadata(&full_path).map_err(Error::from_io)).await
    }

    /// Returns the file type of `path` without following a terminal symlink.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `path` doesn't exist.
    pub async fn symlink_file_type(&self, path: &Path) -> Result<FileType> {
        Ok(self.symlink_metadata(path).await?.file_type())
    }

    /// Writes `contents` to `path`, creating or truncating it.
    ///
    /// Unlike [`Directory::write_atomic`], this is a plain truncate-then-write
    /// and offers no crash-consistency guarantee; prefer `write_atomic` when
    /// that matters.
    ///
    /// # Errors
    ///
    /// Fails if the parent directory doesn't exist or permissions are denied.
    pub async fn write(&self, path: &Path, contents: Vec<u8>) -> Result<()> {
        let full_path = self.resolve(path)?;
        self.executor.run(move || std::fs::write(&full_path, &contents).map_err(Error::from_io)).await
    }
}

async fn preflight_is_dir(executor: &Executor, path: PathBuf) -> Result<()> {
    executor
        .run(move || {
            let metadata = std::fs::metadata(&path).map_err(Error::from_io)?;
            if !metadata.is_dir() {
                return Err(Error::NotDirectory);
            }
            Ok(())
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorConfig;

    fn executor() -> Executor {
        Executor::new(ExecutorConfig::new())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn write_then_read_round_trips() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = Directory::new(tmp.path().to_path_buf(), executor());
        let path = Path::new("greeting.txt").expect("valid path");

        dir.write(&path, b"hello".to_vec()).await.expect("write");
        let contents = dir.read(&path).await.expect("read");
        assert_eq!(contents, b"hello");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_dir_rejects_a_plain_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("not-a-dir"), b"x").expect("seed");
        let dir = Directory::new(tmp.path().to_path_buf(), executor());

        let result = dir.open_dir(&Path::new("not-a-dir").expect("valid path")).await;
        assert!(matches!(result, Err(Error::NotDirectory)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_dir_narrows_the_capability() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(tmp.path().join("sub")).expect("mkdir");
        std::fs::write(tmp.path().join("sub/inner.txt"), b"x").expect("seed");
        let root = Directory::new(tmp.path().to_path_buf(), executor());

        let sub = root.open_dir(&Path::new("sub").expect("valid path")).await.expect("open_dir");
        let contents = sub.read(&Path::new("inner.txt").expect("valid path")).await.expect("read");
        assert_eq!(contents, b"x");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rename_moves_between_two_directory_handles() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(tmp.path().join("a")).expect("mkdir a");
        std::fs::create_dir(tmp.path().join("b")).expect("mkdir b");
        std::fs::write(tmp.path().join("a/file.txt"), b"moved").expect("seed");

        let shared_executor = executor();
        let dir_a = Directory::new(tmp.path().join("a"), shared_executor.clone());
        let dir_b = Directory::new(tmp.path().join("b"), shared_executor);

        dir_a
            .rename(&Path::new("file.txt").expect("valid"), &dir_b, &Path::new("file.txt").expect("valid"))
            .await
            .expect("rename");

        assert!(!tmp.path().join("a/file.txt").exists());
        assert_eq!(std::fs::read(tmp.path().join("b/file.txt")).expect("read back"), b"moved");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_dir_rejects_a_missing_path() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = Directory::new(tmp.path().to_path_buf(), executor());
        let result = dir.read_dir(&Path::new("missing").expect("valid"), ReadDirOptions::new()).await;
        assert!(result.is_err());
    }
}
