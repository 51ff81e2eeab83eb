// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A builder for directory creation. Grounded on
//! `crates/file/src/dir_builder.rs` directly.

use crate::directory::Directory;
use crate::error::Result;
use crate::path::Path;

/// A builder used to create directories, optionally recursively.
#[derive(Debug, Clone, Copy)]
pub struct DirBuilder {
    recursive: bool,
}

impl Default for DirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DirBuilder {
    /// Starts with `recursive` cleared.
    #[must_use]
    pub const fn new() -> Self {
        Self { recursive: false }
    }

    /// If `true`, missing parent components of the target path are created
    /// too, and an already-existing target is not an error. Defaults to
    /// `false`.
    #[must_use]
    pub const fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Creates `path` (relative to `dir`) with the configured options.
    ///
    /// # Errors
    ///
    /// [`crate::error::Error::AlreadyExists`] if the target exists and
    /// `recursive` is `false`.
    pub async fn create(&self, dir: &Directory, path: &Path) -> Result<()> {
        if self.recursive {
            dir.create_dir_all(path).await
        } else {
            dir.create_dir(path).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Executor, ExecutorConfig};

    #[tokio::test(flavor = "multi_thread")]
    async fn non_recursive_fails_when_parent_missing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = Directory::new(tmp.path().to_path_buf(), Executor::new(ExecutorConfig::new()));
        let path = Path::new("a/b").expect("valid path");
        assert!(DirBuilder::new().create(&dir, &path).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recursive_creates_every_missing_parent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = Directory::new(tmp.path().to_path_buf(), Executor::new(ExecutorConfig::new()));
        let path = Path::new("a/b/c").expect("valid path");
        DirBuilder::new().recursive(true).create(&dir, &path).await.expect("create");
        assert!(tmp.path().join("a/b/c").is_dir());
    }
}
