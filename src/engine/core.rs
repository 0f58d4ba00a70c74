// src/engine/core.rs

//! Pure dispatch core.
//!
//! [`DispatchCore`] decides which core each ready descriptor goes to and
//! what happens when that core's queue is full. It is synchronous and
//! deterministic: it owns no channels, no timers and no threads, and only
//! talks to the worker pool through a [`DispatchBackend`]. The async shell
//! (`engine::runtime::Producer`) feeds it events and calls [`DispatchCore::tick`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use crate::exec::{DispatchBackend, PushError, TaskDescriptor, TaskHandler};
use crate::types::FullQueueBehaviour;

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: usize,
    pub dropped: usize,
    /// Descriptors left in the backlog for the next pass.
    pub deferred: usize,
}

impl TickReport {
    fn absorb(&mut self, other: TickReport) {
        self.dispatched += other.dispatched;
        self.dropped += other.dropped;
        self.deferred = other.deferred;
    }
}

/// The handler used for the synthetic workload: logs which worker ran it.
#[derive(Debug, Default)]
pub struct SyntheticTask {
    executions: AtomicU64,
}

impl SyntheticTask {
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }
}

impl TaskHandler for SyntheticTask {
    fn handle(&self) {
        let n = self.executions.fetch_add(1, Ordering::Relaxed) + 1;
        let thread = std::thread::current();
        debug!(worker = thread.name().unwrap_or("?"), execution = n, "synthetic task executed");
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Round-robin placement of ready descriptors onto per-core queues.
pub struct DispatchCore {
    backlog: VecDeque<TaskDescriptor>,
    cursor: usize,
    behaviour: FullQueueBehaviour,
    synthetic: Arc<dyn TaskHandler>,
    totals: TickReport,
}

impl std::fmt::Debug for DispatchCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCore")
            .field("backlog", &self.backlog.len())
            .field("cursor", &self.cursor)
            .field("behaviour", &self.behaviour)
            .field("totals", &self.totals)
            .finish_non_exhaustive()
    }
}

impl DispatchCore {
    pub fn new(behaviour: FullQueueBehaviour) -> Self {
        Self {
            backlog: VecDeque::new(),
            cursor: 0,
            behaviour,
            synthetic: Arc::new(SyntheticTask::default()),
            totals: TickReport::default(),
        }
    }

    /// Replace the handler pushed by [`synthetic_round`](Self::synthetic_round).
    pub fn with_synthetic_handler(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.synthetic = handler;
        self
    }

    pub fn behaviour(&self) -> FullQueueBehaviour {
        self.behaviour
    }

    /// Queue a ready descriptor for the next pass.
    pub fn enqueue(&mut self, descriptor: TaskDescriptor) {
        self.backlog.push_back(descriptor);
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Everything dispatched and dropped since creation.
    pub fn totals(&self) -> TickReport {
        self.totals
    }

    /// Drain the backlog onto the backend without blocking.
    pub fn tick<B>(&mut self, backend: &B) -> TickReport
    where
        B: DispatchBackend + ?Sized,
    {
        let cores = backend.core_count();
        let mut report = TickReport::default();
        if cores == 0 {
            report.deferred = self.backlog.len();
            return report;
        }

        while let Some(descriptor) = self.backlog.pop_front() {
            let placed = match self.behaviour {
                FullQueueBehaviour::Drop => self.place_or_drop(backend, cores, descriptor),
                FullQueueBehaviour::Defer => self.place_or_defer(backend, cores, descriptor),
            };
            match placed {
                Placement::Dispatched => report.dispatched += 1,
                Placement::Dropped => report.dropped += 1,
                Placement::Deferred => break,
            }
        }

        report.deferred = self.backlog.len();
        if report != TickReport::default() {
            trace!(?report, "dispatch pass");
        }
        self.totals.absorb(report);
        report
    }

    /// Push one synthetic descriptor to every core, dropping on full.
    pub fn synthetic_round<B>(&mut self, backend: &B) -> TickReport
    where
        B: DispatchBackend + ?Sized,
    {
        let mut report = TickReport::default();
        for core in 0..backend.core_count() {
            let descriptor = TaskDescriptor::Handler(Arc::clone(&self.synthetic));
            match backend.try_push(core, descriptor) {
                Ok(()) => report.dispatched += 1,
                Err(err) => {
                    warn!(core, error = %err, "synthetic task dropped");
                    report.dropped += 1;
                }
            }
        }
        report.deferred = self.backlog.len();
        self.totals.absorb(report);
        report
    }

    fn next_core(&mut self, cores: usize) -> usize {
        let core = self.cursor % cores;
        self.cursor = (core + 1) % cores;
        core
    }

    /// Try the round-robin target only.
    fn place_or_drop<B>(&mut self, backend: &B, cores: usize, descriptor: TaskDescriptor) -> Placement
    where
        B: DispatchBackend + ?Sized,
    {
        let core = self.next_core(cores);
        match backend.try_push(core, descriptor) {
            Ok(()) => Placement::Dispatched,
            Err(err) => {
                drop_descriptor(core, err);
                Placement::Dropped
            }
        }
    }

    /// Try every core once, starting at the cursor. If all are full the
    /// descriptor goes back to the head of the backlog.
    fn place_or_defer<B>(&mut self, backend: &B, cores: usize, descriptor: TaskDescriptor) -> Placement
    where
        B: DispatchBackend + ?Sized,
    {
        let start = self.cursor % cores;
        let mut descriptor = descriptor;
        for offset in 0..cores {
            let core = (start + offset) % cores;
            match backend.try_push(core, descriptor) {
                Ok(()) => {
                    self.cursor = (core + 1) % cores;
                    return Placement::Dispatched;
                }
                Err(PushError::Full(back)) => descriptor = back,
                Err(err) => {
                    drop_descriptor(core, err);
                    return Placement::Dropped;
                }
            }
        }
        trace!(label = descriptor.label(), "all queues full; deferring");
        self.backlog.push_front(descriptor);
        Placement::Deferred
    }
}

enum Placement {
    Dispatched,
    Dropped,
    Deferred,
}

fn drop_descriptor(core: usize, err: PushError) {
    let reason = err.to_string();
    match err.into_descriptor() {
        Some(TaskDescriptor::Node(job)) => {
            warn!(core, reason = %reason, node = %job.node, "dropping node descriptor");
            job.run.abandon(job.node);
        }
        Some(descriptor) => {
            warn!(core, reason = %reason, task = descriptor.label(), "dropping descriptor");
        }
        None => warn!(core, reason = %reason, "descriptor not enqueued"),
    }
}
