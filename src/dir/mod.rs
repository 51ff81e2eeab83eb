// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Async batched directory iteration.
//!
//! Built on `crates/file/src/read_dir.rs`'s producer/dispatch shape, widened
//! from one job per entry to a single producer task per [`ReadDir`] that
//! reads up to `batch_size` entries per executor submission and hands each
//! batch to the consumer through a channel holding exactly one slot. The
//! producer blocks on `send` until the previous batch has been drained —
//! that single-slot channel *is* the backpressure mechanism, not a separate
//! semaphore or bound.

mod walk;

pub use walk::{Walk, WalkOptions};

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dir_entry::DirEntry;
use crate::error::{Error, Result};
use crate::executor::Executor;

/// Default entries read per executor submission.
pub(crate) const DEFAULT_BATCH_SIZE: usize = 64;
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 1024;

pub(crate) fn clamp_batch_size(requested: usize) -> usize {
    requested.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE)
}

/// Options controlling how a [`ReadDir`] batches entries.
#[derive(Debug, Clone, Copy)]
pub struct ReadDirOptions {
    batch_size: usize,
}

impl Default for ReadDirOptions {
    fn default() -> Self {
        Self { batch_size: DEFAULT_BATCH_SIZE }
    }
}

impl ReadDirOptions {
    /// Starts from the default batch size (64).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries read per executor submission. Clamped into `[1, 1024]`.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = clamp_batch_size(batch_size);
        self
    }
}

/// A backpressured async iterator over the entries of a single directory.
///
/// A single producer task is spawned when the `ReadDir` is created (see
/// [`crate::directory::Directory::read_dir`]). It runs blocking directory
/// reads on the owning [`Executor`] and writes batches of entries to a
/// bounded channel holding exactly one batch slot; [`ReadDir::next`] reads
/// from that channel, so the producer is naturally throttled to the
/// consumer's pace.
pub struct ReadDir {
    receiver: mpsc::Receiver<Result<Vec<DirEntry>>>,
    producer: Option<JoinHandle<()>>,
    buffer: VecDeque<DirEntry>,
    done: bool,
}

impl fmt::Debug for ReadDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadDir")
            .field("buffered", &self.buffer.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl ReadDir {
    pub(crate) fn spawn(executor: Executor, path: PathBuf, options: ReadDirOptions) -> Self {
        let (sender, receiver) = mpsc::channel(1);
        let batch_size = options.batch_size;
        let producer = tokio::spawn(async move { run_producer(executor, path, batch_size, sender).await });
        Self {
            receiver,
            producer: Some(producer),
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Returns the next entry, or `Ok(None)` once the directory is exhausted.
    ///
    /// Entries within a single batch — and batches themselves — are
    /// delivered in the underlying directory iterator's natural order; this
    /// crate never sorts or deduplicates them.
    ///
    /// # Errors
    ///
    /// Returns whatever error the underlying blocking iterator produced.
    /// Entries already returned by earlier calls are not retracted.
    pub async fn next(&mut self) -> Result<Option<DirEntry>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }
            if self.done {
                return Ok(None);
            }
            match self.receiver.recv().await {
                Some(Ok(batch)) => {
                    if batch.is_empty() {
                        self.done = true;
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

    /// Idempotently tears this iterator down: the producer task is
    /// cancelled (closing the underlying blocking iterator on a worker once
    /// it next yields), and any buffered entries are discarded. After this
    /// call, [`ReadDir::next`] always returns `Ok(None)`.
    pub fn terminate(&mut self) {
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
        self.buffer.clear();
        self.done = true;
    }
}

impl Drop for ReadDir {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn run_producer(executor: Executor, path: PathBuf, batch_size: usize, sender: mpsc::Sender<Result<Vec<DirEntry>>>) {
    let opened = executor.run(move || std::fs::read_dir(&path).map_err(Error::from_io)).await;
    let mut iter = match opened {
        Ok(iter) => iter,
        Err(e) => {
            let _ = sender.send(Err(e)).await;
            return;
        }
    };

    loop {
        let batch_result = executor
            .run(move || {
                let mut batch = Vec::with_capacity(batch_size);
                let mut exhausted = false;
                for _ in 0..batch_size {
                    match iter.next() {
                        Some(Ok(entry)) => batch.push(DirEntry::from_std(&entry, 0)),
                        Some(Err(e)) => return Err(Error::from_io(e)),
                        None => {
                            exhausted = true;
                            break;
                        }
                    }
                }
                Ok((iter, batch, exhausted))
            })
            .await;

        match batch_result {
            Ok((next_iter, batch, exhausted)) => {
                iter = next_iter;
                if !batch.is_empty() && sender.send(Ok(batch)).await.is_err() {
                    return; // consumer is gone; nothing left to deliver
                }
                if exhausted {
                    return;
                }
            }
            Err(e) => {
                let _ = sender.send(Err(e)).await;
                return;
            }
        }
    }
}
