//! Atomic primitives used by the DAG engine.
//!
//! With the `loom` feature the counters are swapped for loom's model-checked
//! atomics so `tests/loom.rs` can explore every interleaving of concurrent
//! completions.

#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::sync::atomic::{AtomicU8, AtomicU16, AtomicUsize, Ordering, fence};
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use core::sync::atomic::{AtomicU8, AtomicU16, AtomicUsize, Ordering, fence};
}

pub(crate) use imp::*;
