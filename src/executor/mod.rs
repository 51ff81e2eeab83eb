// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The I/O executor (component C2).
//!
//! Accepts submitted blocking closures, runs them on workers chosen by a
//! [`ThreadModel`], and manages the registry of non-copyable kernel handles
//! that cross the async/sync boundary. See `crates/file/src/dispatcher.rs`
//! in the upstream crate this design is grounded on.

mod dispatcher;
mod registry;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::handle::Handle;

use dispatcher::Dispatcher;
pub use registry::HandleId;
use registry::Registry;

/// How jobs submitted to an [`Executor`] are scheduled.
#[derive(Debug, Clone, Copy)]
pub enum ThreadModel {
    /// Each job is spawned onto the ambient async runtime's blocking pool;
    /// the executor owns no threads of its own.
    Cooperative,
    /// `workers` OS threads owned by this executor pull jobs from a private
    /// queue. Safe for long-running blocking work; costs resident threads.
    Dedicated { workers: usize },
}

/// Configuration for an [`Executor`].
///
/// The configuration surface is exactly three knobs: `workers`,
/// `queue_limit`, `thread_model`. No others are introduced.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    thread_model: ThreadModel,
    queue_limit: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_model: ThreadModel::Cooperative,
            queue_limit: 10_000,
        }
    }
}

impl ExecutorConfig {
    /// Starts from the defaults (`Cooperative`, `queue_limit = 10_000`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the thread model. For `Dedicated`, `workers` is the fixed number
    /// of OS threads the executor will own for its lifetime.
    #[must_use]
    pub const fn thread_model(mut self, thread_model: ThreadModel) -> Self {
        self.thread_model = thread_model;
        self
    }

    /// Sets the maximum number of jobs that may be admitted (running or
    /// queued) at once; callers beyond this limit suspend until a slot frees.
    #[must_use]
    pub const fn queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = queue_limit;
        self
    }
}

const STATE_RUNNING: u8 = 0;
const STATE_DRAINING: u8 = 1;
const STATE_SHUT_DOWN: u8 = 2;

/// The I/O executor.
///
/// Cheaply cloneable (`Clone` shares the same underlying executor via `Arc`);
/// every clone observes the same shutdown state and handle registry.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<Inner>,
}

struct Inner {
    dispatcher: Dispatcher,
    registry: Registry,
    admission: Semaphore,
    queue_limit: usize,
    state: AtomicU8,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("state", &self.inner.state.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// Builds an executor from `config`.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        tracing::debug!(?config, "executor starting");
        Self {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(config.thread_model),
                registry: Registry::new(),
                admission: Semaphore::new(config.queue_limit),
                queue_limit: config.queue_limit,
                state: AtomicU8::new(STATE_RUNNING),
            }),
        }
    }

    fn check_running(&self) -> Result<()> {
        if self.inner.state.load(Ordering::Acquire) != STATE_RUNNING {
            return Err(Error::Shutdown);
        }
        Ok(())
    }

    /// Submits a blocking closure for execution, suspending the caller if
    /// `queue-limit` admitted jobs are already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if the executor is `Draining` or
    /// `ShutDown`. Any error or panic produced by `job` itself propagates
    /// through the returned future unchanged.
    pub async fn run<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.check_running()?;
        let permit = self
            .inner
            .admission
            .acquire()
            .await
            .expect("the admission semaphore is never closed while `self` is alive");
        let inner = Arc::clone(&self.inner);
        let result = self
            .inner
            .dispatcher
            .dispatch(move || {
                if inner.state.load(Ordering::Acquire) != STATE_RUNNING {
                    return Err(Error::Shutdown);
                }
                job()
            })
            .await;
        drop(permit);
        result
    }

    /// Registers an already-open [`Handle`] with this executor's registry,
    /// returning the opaque [`HandleId`] callers use to address it from then
    /// on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] if the executor is not `Running`.
    pub fn register_handle(&self, handle: Handle) -> Result<HandleId> {
        self.check_running()?;
        Ok(self.inner.registry.register(handle))
    }

    /// Runs `job` with exclusive access to the [`Handle`] named by `id` for
    /// the duration of the closure. The slot lock is held from before
    /// dispatch until `job` returns, so concurrent `with_handle` calls
    /// against the same `id` are serialized.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if `id` is stale or already closed,
    /// [`Error::ScopeMismatch`] if `id` belongs to a different executor, and
    /// [`Error::Shutdown`] if this executor is not `Running`.
    pub async fn with_handle<T, F>(&self, id: HandleId, job: F) -> Result<T>
    where
        F: FnOnce(&mut Handle) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.check_running()?;
        let mut guard = self.inner.registry.lock(id).await?;
        let permit = self
            .inner
            .admission
            .acquire()
            .await
            .expect("the admission semaphore is never closed while `self` is alive");
        let inner = Arc::clone(&self.inner);
        let result = self
            .inner
            .dispatcher
            .dispatch(move || {
                if inner.state.load(Ordering::Acquire) != STATE_RUNNING {
                    return Err(Error::Shutdown);
                }
                let handle = guard.as_mut().ok_or(Error::InvalidHandle)?;
                job(handle)
            })
            .await;
        drop(permit);
        result
    }

    /// Removes `id` from the registry and closes the underlying handle on a
    /// worker. Idempotent in effect: calling this again with the same `id`
    /// returns [`Error::InvalidHandle`], matching `Handle::close`'s own
    /// idempotency from the caller's point of view (the handle is gone
    /// either way).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`]/[`Error::ScopeMismatch`] per
    /// `with_handle`, and [`Error::Shutdown`] if not `Running`.
    pub async fn destroy_handle(&self, id: HandleId) -> Result<()> {
        self.check_running()?;
        let arc = self.inner.registry.take(id)?;
        let permit = self
            .inner
            .admission
            .acquire()
            .await
            .expect("the admission semaphore is never closed while `self` is alive");
        let inner = Arc::clone(&self.inner);
        let result = self
            .inner
            .dispatcher
            .dispatch(move || {
                // `arc` is dropped at the end of this closure either way, so
                // the handle's descriptor is closed via `Handle`'s `Drop`
                // even on the early-return path below.
                if inner.state.load(Ordering::Acquire) != STATE_RUNNING {
                    return Err(Error::Shutdown);
                }
                let mut guard = arc.blocking_lock();
                if let Some(mut handle) = guard.take() {
                    handle.close();
                }
                Ok(())
            })
            .await;
        drop(permit);
        result
    }

    /// Transitions `Running → Draining → ShutDown`: stops admitting new jobs
    /// immediately, waits for jobs already admitted to finish, invalidates
    /// every outstanding [`HandleId`], and returns once draining is
    /// complete. Calling this more than once is a no-op after the first call.
    pub async fn shutdown(&self) {
        let previous = self.inner.state.swap(STATE_DRAINING, Ordering::AcqRel);
        if previous == STATE_SHUT_DOWN {
            self.inner.state.store(STATE_SHUT_DOWN, Ordering::Release);
            return;
        }
        tracing::debug!("executor draining");
        // The semaphore's total permit count never changes after
        // construction, so acquiring all `queue_limit` of them can only
        // succeed once every in-flight job has released the permit it is
        // holding — i.e. once draining is actually complete.
        if let Ok(permits) = self.inner.admission.acquire_many(self.inner.queue_limit as u32).await {
            drop(permits);
        }
        let remaining = self.inner.registry.invalidate_all();
        if !remaining.is_empty() {
            tracing::debug!(count = remaining.len(), "closing handles left in the registry");
            let _ = self
                .inner
                .dispatcher
                .dispatch(move || {
                    for arc in remaining {
                        if let Some(mut handle) = arc.blocking_lock().take() {
                            handle.close();
                        }
                    }
                })
                .await;
        }
        self.inner.state.store(STATE_SHUT_DOWN, Ordering::Release);
        tracing::debug!("executor shut down");
    }

    /// The executor-scoped identifier embedded in every [`HandleId`] this
    /// executor mints, for diagnostics.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.registry.executor_id()
    }
}
