// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The generational handle registry.
//!
//! Each [`Executor`](super::Executor) owns one [`Registry`]. A [`Handle`]
//! lives in a slot; callers only ever see the opaque [`HandleId`] `(executor
//! id, generation, slot index)`, never the slot itself, so a handle can be
//! moved onto a worker thread for the duration of an operation without the
//! calling task holding a borrow across the await point.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Error, Result};
use crate::handle::Handle;

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque, copyable identifier for a [`Handle`] registered with an
/// [`Executor`](super::Executor).
///
/// `HandleId` values are only meaningful against the `Executor` that minted
/// them; using one against a different executor fails with
/// [`Error::ScopeMismatch`], and using one whose generation no longer matches
/// the slot's current generation (the slot was freed and possibly reused, or
/// the whole registry was invalidated by `shutdown`) fails with
/// [`Error::InvalidHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    executor_id: u64,
    generation: u64,
    slot: usize,
}

struct Slot {
    generation: u64,
    handle: Option<Arc<AsyncMutex<Option<Handle>>>>,
}

/// The per-executor handle table.
pub(crate) struct Registry {
    executor_id: u64,
    slots: RwLock<Vec<Slot>>,
    free: RwLock<Vec<usize>>,
    /// Bumped on `shutdown()` to invalidate every outstanding `HandleId` at
    /// once, even slots that were never individually reused.
    shutdown_generation_bump: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            executor_id: NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed),
            slots: RwLock::new(Vec::new()),
            free: RwLock::new(Vec::new()),
            shutdown_generation_bump: AtomicU64::new(0),
        }
    }

    pub(crate) fn register(&self, handle: Handle) -> HandleId {
        let wrapped = Some(Arc::new(AsyncMutex::new(Some(handle))));
        let mut slots = self.slots.write();
        let mut free = self.free.write();
        if let Some(index) = free.pop() {
            let slot = &mut slots[index];
            slot.handle = wrapped;
            return HandleId {
                executor_id: self.executor_id,
                generation: slot.generation,
                slot: index,
            };
        }
        let generation = self.shutdown_generation_bump.load(Ordering::Acquire);
        slots.push(Slot { generation, handle: wrapped });
        HandleId {
            executor_id: self.executor_id,
            generation,
            slot: slots.len() - 1,
        }
    }

    fn slot_handle(&self, id: HandleId) -> Result<Arc<AsyncMutex<Option<Handle>>>> {
        if id.executor_id != self.executor_id {
            return Err(Error::ScopeMismatch);
        }
        let slots = self.slots.read();
        let slot = slots.get(id.slot).ok_or(Error::InvalidHandle)?;
        if slot.generation != id.generation {
            return Err(Error::InvalidHandle);
        }
        slot.handle.clone().ok_or(Error::InvalidHandle)
    }

    /// Acquires exclusive access to the handle in `id`'s slot for the
    /// duration the returned guard is held.
    pub(crate) async fn lock(&self, id: HandleId) -> Result<tokio::sync::OwnedMutexGuard<Option<Handle>>> {
        let arc = self.slot_handle(id)?;
        let guard = arc.lock_owned().await;
        if guard.is_none() {
            return Err(Error::InvalidHandle);
        }
        Ok(guard)
    }

    /// Removes the handle from its slot, bumping the slot's generation so
    /// any other outstanding `HandleId` referring to it becomes stale, and
    /// returns the handle so the caller can close it.
    pub(crate) fn take(&self, id: HandleId) -> Result<Arc<AsyncMutex<Option<Handle>>>> {
        if id.executor_id != self.executor_id {
            return Err(Error::ScopeMismatch);
        }
        let mut slots = self.slots.write();
        let slot = slots.get_mut(id.slot).ok_or(Error::InvalidHandle)?;
        if slot.generation != id.generation {
            return Err(Error::InvalidHandle);
        }
        let handle = slot.handle.take().ok_or(Error::InvalidHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.write().push(id.slot);
        Ok(handle)
    }

    /// Invalidates every `HandleId` currently outstanding and returns the
    /// handles still sitting in their slots so the caller can close them.
    /// Called once by `Executor::shutdown`, after draining is complete, so
    /// nothing is still `with_handle`-locking a slot when this runs.
    pub(crate) fn invalidate_all(&self) -> Vec<Arc<AsyncMutex<Option<Handle>>>> {
        self.shutdown_generation_bump.fetch_add(1, Ordering::AcqRel);
        let mut slots = self.slots.write();
        let mut remaining = Vec::new();
        for slot in slots.iter_mut() {
            slot.generation = slot.generation.wrapping_add(1);
            if let Some(arc) = slot.handle.take() {
                remaining.push(arc);
            }
        }
        remaining
    }

    pub(crate) fn executor_id(&self) -> u64 {
        self.executor_id
    }
}
