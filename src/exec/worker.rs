// src/exec/worker.rs

//! Worker loop: one thread per core, blocking on that core's queue.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

use core_affinity::CoreId;
use tracing::{debug, error, info, trace};

use crate::types::PanicPolicy;

use super::affinity;
use super::descriptor::TaskDescriptor;
use super::queue::QueueReceiver;

/// Counters kept by one worker.
#[derive(Debug, Default)]
pub struct WorkerStats {
    executed: AtomicU64,
    faults: AtomicU64,
}

impl WorkerStats {
    /// Descriptors executed to completion (including ones that panicked).
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Handler panics contained by this worker.
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }
}

pub(crate) struct Worker {
    pub(crate) core: usize,
    pub(crate) pin: Option<CoreId>,
    pub(crate) receiver: QueueReceiver,
    pub(crate) stats: Arc<WorkerStats>,
    pub(crate) panic_policy: PanicPolicy,
}

/// First message of every worker: its core and whether pinning held.
/// Unpinned workers always report `true`.
pub(crate) type StartupReport = (usize, bool);

impl Worker {
    pub(crate) fn spawn(
        self,
        stack_size: Option<usize>,
        started: mpsc::Sender<StartupReport>,
    ) -> io::Result<JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(format!("smpdag-core-{}", self.core));
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }
        builder.spawn(move || self.run(started))
    }

    fn run(mut self, started: mpsc::Sender<StartupReport>) {
        let pinned = self
            .pin
            .is_none_or(|id| affinity::pin_current_thread(self.core, id));
        // The runtime may have given up on start-up already.
        let _ = started.send((self.core, pinned));
        drop(started);
        if !pinned {
            return;
        }
        info!(core = self.core, "worker started");

        // The only suspension point of the loop.
        while let Some(lease) = self.receiver.blocking_pop() {
            trace!(core = self.core, slot = lease.slot(), "descriptor popped");
            execute(self.core, lease.descriptor(), &self.stats, self.panic_policy);
        }

        info!(
            core = self.core,
            executed = self.stats.executed(),
            faults = self.stats.faults(),
            "worker stopped"
        );
    }
}

/// Run one descriptor inside a panic boundary.
pub(crate) fn execute(
    core: usize,
    descriptor: &TaskDescriptor,
    stats: &WorkerStats,
    policy: PanicPolicy,
) {
    match descriptor {
        TaskDescriptor::Handler(handler) => {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle()));
            if let Err(payload) = outcome {
                contain_panic(core, handler.name(), payload, stats, policy);
            }
        }
        TaskDescriptor::Node(job) => {
            let graph = job.run.graph();
            if let Err(err) = graph.mark_dispatched(job.node) {
                error!(core, node = %job.node, error = %err, "refusing to run node");
                return;
            }
            let label = graph.label_of(job.node).unwrap_or("?");
            debug!(core, cycle = job.run.cycle(), node = %job.node, label, "running node");

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| graph.run_body(job.node)));
            if let Err(payload) = outcome {
                job.run.record_fault();
                contain_panic(core, label, payload, stats, policy);
            }
            // A faulted node still completes, so its dependents are not
            // stranded for the rest of the cycle.
            job.run.complete(job.node);
        }
    }
    stats.executed.fetch_add(1, Ordering::Relaxed);
}

fn contain_panic(
    core: usize,
    task: &str,
    payload: Box<dyn Any + Send>,
    stats: &WorkerStats,
    policy: PanicPolicy,
) {
    let message = panic_message(payload.as_ref());
    match policy {
        PanicPolicy::Continue => {
            stats.faults.fetch_add(1, Ordering::Relaxed);
            error!(core, task, panic = %message, "task panicked; worker continues");
        }
        PanicPolicy::Abort => {
            error!(core, task, panic = %message, "task panicked; aborting process");
            std::process::abort();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
