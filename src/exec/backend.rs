// src/exec/backend.rs

//! Pluggable dispatch backend abstraction.
//!
//! The producer talks to a `DispatchBackend` instead of the worker pool
//! directly. This makes it easy to swap in a recording backend in tests
//! while production code uses [`DispatcherRuntime`](super::DispatcherRuntime).

use std::sync::Arc;

use thiserror::Error;

use super::descriptor::TaskDescriptor;

/// Why a descriptor could not be enqueued.
#[derive(Error, Debug)]
pub enum PushError {
    /// The target queue already holds `queue_depth` outstanding descriptors.
    /// The descriptor is handed back untouched.
    #[error("queue is full")]
    Full(TaskDescriptor),

    /// The dispatcher has shut down.
    #[error("queue is closed")]
    Closed,

    #[error("no queue for core {0}")]
    UnknownCore(usize),
}

impl PushError {
    /// The rejected descriptor, if it was handed back.
    pub fn into_descriptor(self) -> Option<TaskDescriptor> {
        match self {
            PushError::Full(descriptor) => Some(descriptor),
            PushError::Closed | PushError::UnknownCore(_) => None,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PushError::Full(_))
    }
}

/// Where the producer places descriptors.
///
/// Implementations must never block in `try_push`.
pub trait DispatchBackend: Send + Sync {
    /// Number of per-core queues.
    fn core_count(&self) -> usize;

    /// Non-blocking enqueue onto `core`'s queue.
    fn try_push(&self, core: usize, descriptor: TaskDescriptor) -> Result<(), PushError>;
}

impl<B> DispatchBackend for Arc<B>
where
    B: DispatchBackend + ?Sized,
{
    fn core_count(&self) -> usize {
        (**self).core_count()
    }

    fn try_push(&self, core: usize, descriptor: TaskDescriptor) -> Result<(), PushError> {
        (**self).try_push(core, descriptor)
    }
}
