// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The entry point into capability-based filesystem access.
//!
//! Grounded on `crates/file/src/root.rs` almost directly; generalized to
//! bind against a caller-supplied [`Executor`] instead of creating a private
//! dispatcher, so a single executor's worker pool and handle registry can be
//! shared across every `Directory` a process binds.

use std::path::PathBuf;

use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::executor::Executor;

/// The sole mechanism for obtaining a [`Directory`] capability.
///
/// The path passed to [`Root::bind`] is the only place an absolute,
/// unconfined path is accepted anywhere in this crate's capability layer;
/// every `Directory` operation from then on is lexically confined to the
/// bound subtree.
#[derive(Debug)]
pub struct Root;

impl Root {
    /// Binds `path` on the filesystem, returning a [`Directory`] capability
    /// scoped to it. Blocking work runs on `executor`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `path` doesn't exist; [`Error::NotDirectory`] if
    /// it names something other than a directory; [`Error::Shutdown`] if
    /// `executor` is draining or shut down.
    pub async fn bind(path: impl Into<PathBuf>, executor: Executor) -> Result<Directory> {
        let path = path.into();
        let base_path = executor
            .run(move || {
                let canonical = std::fs::canonicalize(&path).map_err(Error::from_io)?;
                let metadata = std::fs::metadata(&canonical).map_err(Error::from_io)?;
                if !metadata.is_dir() {
                    return Err(Error::NotDirectory);
                }
                Ok(canonical)
            })
            .await?;
        Ok(Directory::new(base_path, executor))
    }
}
