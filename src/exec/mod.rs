// src/exec/mod.rs

//! Multi-core execution layer.
//!
//! - [`descriptor`] defines what is queued: graph node jobs or standalone
//!   handlers.
//! - [`queue`] is the bounded per-core queue (descriptor ring + blocking
//!   channel).
//! - [`affinity`] resolves and pins cores.
//! - [`worker`] owns the per-core loop and its panic boundary.
//! - [`backend`] provides the `DispatchBackend` trait the producer pushes
//!   through, which tests can replace with a recording implementation.
//! - [`runtime`] ties it together in `DispatcherRuntime`.

pub mod affinity;
pub mod backend;
pub mod descriptor;
pub mod queue;
pub mod runtime;
pub mod worker;

pub use backend::{DispatchBackend, PushError};
pub use descriptor::{NodeJob, TaskDescriptor, TaskHandler};
pub use queue::{CoreQueue, QueueReceiver, SlotLease};
pub use runtime::{DispatchError, DispatchOptions, DispatcherRuntime};
pub use worker::WorkerStats;
