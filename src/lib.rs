// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An asynchronous filesystem API built around four components: a blocking
//! [`Handle`], an [`Executor`] that dispatches blocking work onto either a
//! dedicated thread pool or the ambient async runtime's blocking pool, a
//! platform-tiered [`copy`], and an atomic-write/batched-directory-walk
//! pipeline.
//!
//! This crate differs from [`std::fs`] in three ways:
//!
//! 1. **Capability-based access control.** Every operation is scoped to a
//!    [`Directory`] obtained via [`Root::bind`]. Paths are always relative to
//!    a directory, and traversal that would escape it (a leading `/` or `..`
//!    above the root) is rejected before any filesystem call is made.
//! 2. **Fully asynchronous, with an explicit dispatch model.** Blocking I/O
//!    never runs inline on the calling task; it is submitted to an
//!    [`Executor`], whose [`ThreadModel`] a caller picks explicitly
//!    (`Dedicated` OS threads, or `Cooperative` use of the ambient runtime's
//!    blocking pool).
//! 3. **A single [`Handle`] type.** Read/write/seek and positional
//!    (offset-based, cursor-free) I/O live on the same type; the access mode
//!    recorded at open time is checked at the call site rather than at the
//!    type level.
//!
//! # Quick start
//!
//! ```no_run
//! # async fn example() -> iofs::Result<()> {
//! use iofs::{Executor, ExecutorConfig, Path, Root};
//!
//! let executor = Executor::new(ExecutorConfig::new());
//! let dir = Root::bind("/var/data", executor).await?;
//!
//! dir.write(&Path::new("greeting.txt")?, b"Hello!".to_vec()).await?;
//! let text = dir.read_to_string(&Path::new("greeting.txt")?).await?;
//!
//! let sub = dir.open_dir(&Path::new("subdir")?).await?;
//! let data = sub.read(&Path::new("nested_file.txt")?).await?;
//! # let _ = (text, data);
//! # Ok(())
//! # }
//! ```
//!
//! # Copying files
//!
//! [`copy`] walks a per-platform ladder of kernel-assisted fast paths
//! (`copy_file_range`/`sendfile` on Linux, `copyfile(2)` on macOS,
//! `CopyFileW` on Windows) before falling back to a manual chunked loop,
//! classifying each tier's failure as either "try the next tier" or "surface
//! immediately" so a caller never silently pays for a slow path when a fast
//! one would have worked.
//!
//! # Writing durably
//!
//! [`atomic_write`] never lets an observer see a partial write: the data
//! lands in a temp file beside the target, is flushed per [`Durability`],
//! then renamed into place.
//!
//! # Walking a directory tree
//!
//! [`Directory::read_dir`] and [`Directory::walk`] both stream entries
//! through a single-slot channel — the producer task blocks on `send` until
//! the consumer has drained the previous batch, which *is* the backpressure
//! mechanism, not a separate bound.

mod atomic_write;
mod copy;
mod dir;
mod dir_builder;
mod dir_entry;
mod directory;
mod error;
mod executor;
mod handle;
mod open_options;
mod path;
mod path_utils;
mod root;

pub use atomic_write::{AtomicWriteOptions, Durability, atomic_write};
pub use copy::{CopyOptions, copy};
pub use dir::{ReadDir, ReadDirOptions, Walk, WalkOptions};
pub use dir_builder::DirBuilder;
pub use dir_entry::DirEntry;
pub use directory::Directory;
pub use error::{Error, Result};
pub use executor::{Executor, ExecutorConfig, HandleId, ThreadModel};
pub use handle::{AccessMode, Handle, SyncMode};
pub use open_options::OpenOptions;
pub use path::Path;
pub use root::Root;

pub use std::fs::{FileType, Metadata, Permissions};
pub use std::io::SeekFrom;
