// src/exec/queue.rs

//! Per-core bounded queue.
//!
//! A queue is a ring of `depth` descriptor slots plus a bounded channel that
//! carries slot indices to the worker. A slot is *in flight* from the
//! moment a push claims it until the worker has finished executing the
//! descriptor it holds; the producer never overwrites an in-flight slot.
//!
//! Slots are claimed in ring order and the worker releases them in the same
//! order, so the next slot is in flight exactly when `depth` descriptors
//! are outstanding. That makes [`CoreQueue::try_push`] a constant-time,
//! non-blocking "full" check.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, trace};

use super::backend::PushError;
use super::descriptor::TaskDescriptor;

struct Slot {
    in_flight: AtomicBool,
    descriptor: Mutex<Option<TaskDescriptor>>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            descriptor: Mutex::new(None),
        }
    }
}

struct QueueInner {
    sender: Option<mpsc::Sender<usize>>,
    cursor: usize,
}

/// Producer side of one core's queue.
pub struct CoreQueue {
    core: usize,
    slots: Box<[Slot]>,
    inner: Mutex<QueueInner>,
}

impl std::fmt::Debug for CoreQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreQueue")
            .field("core", &self.core)
            .field("depth", &self.depth())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl CoreQueue {
    /// Allocate a queue of `depth` slots for `core`.
    ///
    /// `depth` must be non-zero; the runtime validates it before calling.
    pub fn new(core: usize, depth: usize) -> (Arc<Self>, QueueReceiver) {
        let depth = depth.max(1);
        let (tx, rx) = mpsc::channel(depth);
        let slots = (0..depth).map(|_| Slot::empty()).collect();
        let queue = Arc::new(Self {
            core,
            slots,
            inner: Mutex::new(QueueInner {
                sender: Some(tx),
                cursor: 0,
            }),
        });
        let receiver = QueueReceiver {
            queue: Arc::clone(&queue),
            rx,
        };
        (queue, receiver)
    }

    pub fn core(&self) -> usize {
        self.core
    }

    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Descriptors pushed but not yet fully executed.
    pub fn outstanding(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.in_flight.load(Ordering::Acquire))
            .count()
    }

    /// Enqueue without blocking.
    ///
    /// Returns the ring slot used. When the queue already holds `depth`
    /// outstanding descriptors the descriptor is handed back in
    /// [`PushError::Full`] and no slot is touched.
    pub fn try_push(&self, descriptor: TaskDescriptor) -> Result<usize, PushError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let slot_index = inner.cursor;
        let Some(sender) = inner.sender.as_ref() else {
            return Err(PushError::Closed);
        };

        let slot = &self.slots[slot_index];
        if slot.in_flight.load(Ordering::Acquire) {
            return Err(PushError::Full(descriptor));
        }

        slot.in_flight.store(true, Ordering::Release);
        *slot.descriptor.lock().unwrap_or_else(PoisonError::into_inner) = Some(descriptor);

        match sender.try_send(slot_index) {
            Ok(()) => {
                inner.cursor = (slot_index + 1) % self.slots.len();
                trace!(core = self.core, slot = slot_index, "descriptor enqueued");
                Ok(slot_index)
            }
            Err(err) => {
                let descriptor = slot
                    .descriptor
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                slot.in_flight.store(false, Ordering::Release);
                match (err, descriptor) {
                    (TrySendError::Full(_), Some(descriptor)) => Err(PushError::Full(descriptor)),
                    _ => Err(PushError::Closed),
                }
            }
        }
    }

    /// Stop accepting descriptors. Already queued descriptors are still
    /// delivered; the worker sees the end of the queue after them.
    pub fn close(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.sender.take().is_some() {
            trace!(core = self.core, "queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sender
            .is_none()
    }

    fn take(&self, slot: usize) -> Option<TaskDescriptor> {
        self.slots
            .get(slot)?
            .descriptor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn release(&self, slot: usize) {
        if let Some(s) = self.slots.get(slot) {
            s.in_flight.store(false, Ordering::Release);
        }
    }
}

/// Consumer side of one core's queue, owned by its worker.
pub struct QueueReceiver {
    queue: Arc<CoreQueue>,
    rx: mpsc::Receiver<usize>,
}

impl QueueReceiver {
    pub fn core(&self) -> usize {
        self.queue.core
    }

    /// Block the calling thread until a descriptor arrives.
    ///
    /// Returns `None` once the queue is closed and drained. Must not be
    /// called from inside an async context.
    pub fn blocking_pop(&mut self) -> Option<SlotLease<'_>> {
        loop {
            let slot = self.rx.blocking_recv()?;
            if let Some(lease) = lease(&self.queue, slot) {
                return Some(lease);
            }
        }
    }

    /// Pop without waiting.
    pub fn try_pop(&mut self) -> Option<SlotLease<'_>> {
        loop {
            let slot = self.rx.try_recv().ok()?;
            if let Some(lease) = lease(&self.queue, slot) {
                return Some(lease);
            }
        }
    }
}

fn lease(queue: &CoreQueue, slot: usize) -> Option<SlotLease<'_>> {
    match queue.take(slot) {
        Some(descriptor) => Some(SlotLease {
            queue,
            slot,
            descriptor,
        }),
        None => {
            error!(core = queue.core, slot, "popped an empty slot; skipping");
            queue.release(slot);
            None
        }
    }
}

/// A popped descriptor. Its ring slot stays in flight until the lease is
/// dropped, which the worker does after the descriptor has executed.
pub struct SlotLease<'q> {
    queue: &'q CoreQueue,
    slot: usize,
    descriptor: TaskDescriptor,
}

impl SlotLease<'_> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }
}

impl Drop for SlotLease<'_> {
    fn drop(&mut self) {
        self.queue.release(self.slot);
    }
}
