// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recursive, concurrency-bounded directory walk.
//!
//! `walk` yields a flat sequence of absolute [`PathBuf`]s (unlike
//! [`super::ReadDir`], which yields [`DirEntry`](crate::dir_entry::DirEntry)).
//! No teacher equivalent exists — `crates/file` has only a flat `read_dir`.
//! Grounded on the same producer/single-slot-channel discipline as
//! [`super::ReadDir`], generalized to a BFS frontier of several directories
//! expanded at once, bounded by a [`tokio::sync::Semaphore`] sized to
//! `max_concurrency`.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{Error, Result};
use crate::executor::Executor;

use super::clamp_batch_size;

/// A `(device, inode)`-equivalent key used to detect directory cycles when
/// `follow_symlinks` is enabled.
type VisitKey = (u64, u64);

/// Options controlling a [`Walk`].
#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    follow_symlinks: bool,
    skip_hidden: bool,
    max_depth: Option<usize>,
    max_concurrency: usize,
    batch_size: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            skip_hidden: false,
            max_depth: None,
            max_concurrency: 4,
            batch_size: super::DEFAULT_BATCH_SIZE,
        }
    }
}

impl WalkOptions {
    /// Starts from the defaults: symlinks not followed, hidden entries not
    /// skipped, no depth limit, up to 4 directories expanded concurrently.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// If `true`, a directory reached through a symlink is entered too, and
    /// a visited-directory set breaks cycles. Defaults to `false`.
    #[must_use]
    pub const fn follow_symlinks(mut self, follow_symlinks: bool) -> Self {
        self.follow_symlinks = follow_symlinks;
        self
    }

    /// If `true`, entries whose name begins with `.` are skipped entirely —
    /// neither yielded nor descended into. This is the POSIX convention;
    /// applied on Windows too, without consulting the hidden-attribute bit.
    #[must_use]
    pub const fn skip_hidden(mut self, skip_hidden: bool) -> Self {
        self.skip_hidden = skip_hidden;
        self
    }

    /// Bounds how many directory levels below the walk root are entered.
    /// `None` (the default) means unlimited.
    #[must_use]
    pub const fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Bounds how many directories may have their entries read at once, via
    /// a semaphore sized to this value. Zero is treated as one. Defaults to
    /// 4.
    ///
    /// Flat output order is not fully deterministic once this exceeds 1:
    /// cycle-breaking and completeness are unaffected (the visited-set check
    /// happens before a directory is scheduled, not after it is expanded),
    /// but interleaving across concurrently expanded directories is not
    /// specified.
    #[must_use]
    pub const fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = if max_concurrency == 0 { 1 } else { max_concurrency };
        self
    }

    /// Entries read per executor submission while expanding a directory.
    /// Clamped into `[1, 1024]`.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = clamp_batch_size(batch_size);
        self
    }
}

struct PendingDir {
    path: PathBuf,
    depth: usize,
}

/// A backpressured async iterator over every path reached by recursively
/// walking a directory tree.
///
/// One producer task is spawned per `Walk`. It keeps up to
/// `max_concurrency` directory listings in flight on the owning
/// [`Executor`], delivers batches of paths through a single-slot channel —
/// the same backpressure discipline as [`super::ReadDir`] — and tears itself
/// down (aborting every in-flight listing) the moment the consumer stops
/// pulling.
pub struct Walk {
    receiver: mpsc::Receiver<Result<Vec<PathBuf>>>,
    producer: Option<JoinHandle<()>>,
    buffer: VecDeque<PathBuf>,
    done: bool,
}

impl fmt::Debug for Walk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Walk")
            .field("buffered", &self.buffer.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Walk {
    pub(crate) fn spawn(executor: Executor, root: PathBuf, options: WalkOptions) -> Self {
        let (sender, receiver) = mpsc::channel(1);
        let producer = tokio::spawn(async move { run_producer(executor, root, options, sender).await });
        Self {
            receiver,
            producer: Some(producer),
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Returns the next path, or `Ok(None)` once the walk is complete.
    ///
    /// # Errors
    ///
    /// Per-entry errors (e.g. permission denied listing a subdirectory) fail
    /// the walk: the prefix already delivered is not retracted, but this
    /// call returns the error and every later call returns `Ok(None)`.
    pub async fn next(&mut self) -> Result<Option<PathBuf>> {
        loop {
            if let Some(path) = self.buffer.pop_front() {
                return Ok(Some(path));
            }
            if self.done {
                return Ok(None);
            }
            match self.receiver.recv().await {
                Some(Ok(batch)) => {
                    if batch.is_empty() {
                        continue;
                    }
                    self.buffer.extend(batch);
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Err(e);
                }
                None => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }
    }

    /// Idempotently tears this walk down: every in-flight directory listing
    /// is cancelled and any buffered paths are discarded. After this call,
    /// [`Walk::next`] always returns `Ok(None)`.
    pub fn terminate(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
        self.buffer.clear();
        self.done = true;
    }
}

impl Drop for Walk {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn run_producer(executor: Executor, root: PathBuf, options: WalkOptions, sender: mpsc::Sender<Result<Vec<PathBuf>>>) {
    let mut visited: HashSet<VisitKey> = HashSet::new();
    if options.follow_symlinks {
        if let Some(key) = stat_key(&executor, root.clone()).await {
            visited.insert(key);
        }
    }

    let semaphore = Arc::new(Semaphore::new(options.max_concurrency));
    let mut queue: VecDeque<PendingDir> = VecDeque::from([PendingDir { path: root, depth: 0 }]);
    let mut in_flight: JoinSet<Result<Vec<(PathBuf, usize, Option<VisitKey>)>>> = JoinSet::new();

    loop {
        while let Some(dir) = queue.pop_front() {
            let at_max_depth = options.max_depth.is_some_and(|max| dir.depth >= max);
            let permit = Arc::clone(&semaphore);
            in_flight.spawn(expand(
                executor.clone(),
                dir,
                options.skip_hidden,
                options.follow_symlinks,
                at_max_depth,
                options.batch_size,
                permit,
                sender.clone(),
            ));
        }

        let Some(joined) = in_flight.join_next().await else {
            return; // queue and in-flight set both empty: the walk is complete
        };

        match joined {
            Ok(Ok(subdirs)) => {
                for (path, depth, key) in subdirs {
                    if let Some(key) = key {
                        if !visited.insert(key) {
                            continue; // already entered this directory via another path
                        }
                    }
                    queue.push_back(PendingDir { path, depth });
                }
            }
            Ok(Err(e)) => {
                let _ = sender.send(Err(e)).await;
                return;
            }
            Err(_join_err) => {
                // The expand task panicked, or this walk's own producer is
                // itself being cancelled from outside; either way there is
                // nothing further to report for that branch.
            }
        }
    }
}

async fn stat_key(executor: &Executor, path: PathBuf) -> Option<VisitKey> {
    let path_for_key = path.clone();
    let meta = executor.run(move || std::fs::metadata(&path).map_err(Error::from_io)).await.ok()?;
    visit_key(&path_for_key, &meta)
}

/// Expands one directory, delivering path batches directly to `sender` as
/// they are read (honoring `batch_size` per executor submission, same as
/// [`super::ReadDir`]) and returning the subdirectories discovered so the
/// producer loop can schedule them. Holds one semaphore permit for the
/// duration of the directory listing, bounding how many directories are
/// expanded at once.
#[expect(clippy::too_many_arguments, reason = "internal helper; grouping these into a struct would not reduce call-site complexity")]
async fn expand(
    executor: Executor,
    dir: PendingDir,
    skip_hidden: bool,
    follow_symlinks: bool,
    at_max_depth: bool,
    batch_size: usize,
    semaphore: Arc<Semaphore>,
    sender: mpsc::Sender<Result<Vec<PathBuf>>>,
) -> Result<Vec<(PathBuf, usize, Option<VisitKey>)>> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .expect("the semaphore is never closed while its Walk is alive");

    let open_path = dir.path.clone();
    let opened = executor.run(move || std::fs::read_dir(&open_path).map_err(Error::from_io)).await?;
    let mut iter = opened;
    let mut subdirs = Vec::new();
    let depth = dir.depth;

    loop {
        let batch_result = executor
            .run(move || {
                let mut paths = Vec::new();
                let mut candidates = Vec::new();
                let mut exhausted = false;
                for _ in 0..batch_size {
                    match iter.next() {
                        Some(Ok(entry)) => {
                            let name = entry.file_name();
                            if skip_hidden && name.to_string_lossy().starts_with('.') {
                                continue;
                            }
                            let full_path = entry.path();
                            let file_type = entry.file_type().map_err(Error::from_io)?;
                            if !at_max_depth {
                                if file_type.is_dir() {
                                    candidates.push((full_path.clone(), None));
                                } else if file_type.is_symlink() && follow_symlinks {
                                    if let Ok(meta) = std::fs::metadata(&full_path) {
                                        if meta.is_dir() {
                                            candidates.push((full_path.clone(), visit_key(&full_path, &meta)));
                                        }
                                    }
                                }
                            }
                            paths.push(full_path);
                        }
                        Some(Err(e)) => return Err(Error::from_io(e)),
                        None => {
                            exhausted = true;
                            break;
                        }
                    }
                }
                Ok((iter, paths, candidates, exhausted))
            })
            .await;

        match batch_result {
            Ok((next_iter, paths, candidates, exhausted)) => {
                iter = next_iter;
                for (path, key) in candidates {
                    subdirs.push((path, depth + 1, key));
                }
                if !paths.is_empty() && sender.send(Ok(paths)).await.is_err() {
                    return Ok(subdirs); // consumer gone; stop feeding new work upward too
                }
                if exhausted {
                    return Ok(subdirs);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(unix)]
fn visit_key(_path: &std::path::Path, meta: &std::fs::Metadata) -> Option<VisitKey> {
    use std::os::unix::fs::MetadataExt as _;
    Some((meta.dev(), meta.ino()))
}

#[cfg(windows)]
fn visit_key(_path: &std::path::Path, meta: &std::fs::Metadata) -> Option<VisitKey> {
    use std::os::windows::fs::MetadataExt as _;
    match (meta.volume_serial_number(), meta.file_index()) {
        (Some(volume), Some(index)) => Some((u64::from(volume), index)),
        _ => None,
    }
}

/// No `(device, inode)` equivalent is available here, so identity is
/// approximated by hashing the canonicalized (symlink-resolved) path. This
/// still distinguishes two unrelated directories from each other — unlike
/// always returning the same placeholder key — though it cannot detect a
/// cycle introduced purely through a hard link to the same directory.
#[cfg(not(any(unix, windows)))]
fn visit_key(path: &std::path::Path, _meta: &std::fs::Metadata) -> Option<VisitKey> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let canonical = std::fs::canonicalize(path).ok()?;
    let mut low = DefaultHasher::new();
    canonical.hash(&mut low);
    let mut high = DefaultHasher::new();
    high.write_u8(1);
    canonical.hash(&mut high);
    Some((low.finish(), high.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorConfig;

    async fn collect(walk: &mut Walk) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        while let Some(path) = walk.next().await.expect("next") {
            paths.push(path);
        }
        paths
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn walks_nested_directories_completely() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(tmp.path().join("a/b")).expect("mkdirs");
        std::fs::write(tmp.path().join("a/one.txt"), b"1").expect("seed");
        std::fs::write(tmp.path().join("a/b/two.txt"), b"2").expect("seed");
        std::fs::write(tmp.path().join("top.txt"), b"0").expect("seed");

        let executor = Executor::new(ExecutorConfig::new());
        let mut walk = Walk::spawn(executor, tmp.path().to_path_buf(), WalkOptions::new());
        let mut paths = collect(&mut walk).await;
        paths.sort();

        let mut expected = vec![
            tmp.path().join("a"),
            tmp.path().join("a/one.txt"),
            tmp.path().join("a/b"),
            tmp.path().join("a/b/two.txt"),
            tmp.path().join("top.txt"),
        ];
        expected.sort();
        assert_eq!(paths, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn max_depth_stops_descent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(tmp.path().join("a/b")).expect("mkdirs");
        std::fs::write(tmp.path().join("a/b/deep.txt"), b"x").expect("seed");

        let executor = Executor::new(ExecutorConfig::new());
        let mut walk = Walk::spawn(executor, tmp.path().to_path_buf(), WalkOptions::new().max_depth(Some(1)));
        let paths = collect(&mut walk).await;

        assert_eq!(paths, vec![tmp.path().join("a")]);
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn symlink_cycle_terminates_with_follow_symlinks() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(tmp.path().join("sub")).expect("mkdir");
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("sub/loop")).expect("symlink");

        let executor = Executor::new(ExecutorConfig::new());
        let mut walk = Walk::spawn(
            executor,
            tmp.path().to_path_buf(),
            WalkOptions::new().follow_symlinks(true),
        );
        let paths = collect(&mut walk).await;

        let loop_entries = paths.iter().filter(|p| p.ends_with("loop")).count();
        assert!(loop_entries <= 1, "expected the cycle to be entered at most once, got {loop_entries}");
    }
}
