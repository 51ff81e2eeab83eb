// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Job dispatch for the two thread models.
//!
//! Built on an `async_task` + `flume` pattern. Unlike a global auto-scaling
//! dispatcher singleton, each [`Dispatcher`] here is owned by exactly one
//! `Executor`, sized once from `ExecutorConfig`, and carries no
//! `ScopedDispatchFuture`/unsafe-Send-pointer machinery because every job
//! closure here owns (or `Arc`s) everything it touches instead of borrowing
//! a caller's stack frame — see `DESIGN.md`.

use std::panic::{self, AssertUnwindSafe};

use async_task::Runnable;

use super::ThreadModel;

/// Executes dispatched closures according to a [`ThreadModel`].
pub(crate) enum Dispatcher {
    Dedicated(DedicatedDispatcher),
    Cooperative,
}

impl Dispatcher {
    pub(crate) fn new(model: ThreadModel) -> Self {
        match model {
            ThreadModel::Cooperative => Self::Cooperative,
            ThreadModel::Dedicated { workers } => Self::Dedicated(DedicatedDispatcher::new(workers)),
        }
    }

    /// Runs `job` on a worker and returns its result asynchronously. The
    /// closure runs exactly once, on exactly one thread; a panic inside it is
    /// re-raised in the awaiting task rather than silently dropped.
    pub(crate) fn dispatch<T, F>(&self, job: F) -> DispatchFuture<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (runnable, task) = match self {
            Self::Dedicated(dispatcher) => {
                let sender = dispatcher.sender.clone();
                async_task::spawn(
                    async move { run_catching_panics(job) },
                    move |runnable| {
                        // Reaching a closed channel means every worker has
                        // already exited (the dispatcher was dropped); there
                        // is nothing left to hand the runnable to.
                        let _ = sender.send(runnable);
                    },
                )
            }
            Self::Cooperative => async_task::spawn(async move { run_catching_panics(job) }, |runnable| {
                tokio::task::spawn_blocking(move || runnable.run());
            }),
        };
        runnable.schedule();
        DispatchFuture { task }
    }
}

fn run_catching_panics<T, F: FnOnce() -> T>(job: F) -> std::thread::Result<T> {
    panic::catch_unwind(AssertUnwindSafe(job))
}

/// A fixed pool of OS threads owned by the executor, fed through an unbounded
/// `flume` channel. The channel is unbounded because admission is already
/// bounded upstream by the executor's semaphore (`queue-limit`); bounding the
/// channel too would just move the same backpressure to a second place.
pub(crate) struct DedicatedDispatcher {
    sender: flume::Sender<Runnable>,
    _threads: Vec<std::thread::JoinHandle<()>>,
}

impl DedicatedDispatcher {
    fn new(workers: usize) -> Self {
        let (sender, receiver) = flume::unbounded();
        let threads = (0..workers.max(1))
            .map(|i| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("iofs-worker-{i}"))
                    .spawn(move || worker_loop(&receiver))
                    .expect("spawning a worker thread should not fail")
            })
            .collect();
        Self {
            sender,
            _threads: threads,
        }
    }
}

fn worker_loop(receiver: &flume::Receiver<Runnable>) {
    while let Ok(runnable) = receiver.recv() {
        runnable.run();
    }
}

/// The future returned by [`Dispatcher::dispatch`]. Polling it drives the
/// underlying `async_task::Task`; a panic captured on the worker thread is
/// re-raised here via `resume_unwind`, matching the panic semantics a direct
/// (non-dispatched) call to `job` would have had.
pub(crate) struct DispatchFuture<T> {
    task: async_task::Task<std::thread::Result<T>>,
}

impl<T> std::future::Future for DispatchFuture<T> {
    type Output = T;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        // `async_task::Task` is `Unpin`, so `DispatchFuture` is too.
        let this = self.get_mut();
        std::pin::Pin::new(&mut this.task).poll(cx).map(|result| match result {
            Ok(value) => value,
            Err(panic) => panic::resume_unwind(panic),
        })
    }
}
