// src/exec/runtime.rs

use std::io;
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread::{self, JoinHandle};

use core_affinity::CoreId;
use thiserror::Error;
use tracing::{error, info};

use crate::types::PanicPolicy;

use super::affinity;
use super::backend::{DispatchBackend, PushError};
use super::descriptor::TaskDescriptor;
use super::queue::CoreQueue;
use super::worker::{Worker, WorkerStats};

/// Fatal dispatcher start-up errors. Nothing is left running when one of
/// these is returned.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("core_count must be at least 1")]
    NoCores,

    #[error("queue_depth must be at least 1")]
    ZeroQueueDepth,

    #[error("{requested} pinned workers requested but only {available} cores are available")]
    CoreOutOfRange { requested: usize, available: usize },

    #[error("CPU affinity is not available on this platform")]
    AffinityUnavailable,

    #[error("worker for core {core} could not be pinned to its CPU")]
    PinFailed { core: usize },

    #[error("failed to spawn worker for core {core}: {source}")]
    Spawn {
        core: usize,
        #[source]
        source: io::Error,
    },
}

/// How the worker pool is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    pub core_count: usize,
    pub queue_depth: usize,
    /// Pin worker `i` to the `i`-th available core.
    pub pin_workers: bool,
    /// Worker stack size in bytes; platform default when `None`.
    pub stack_size: Option<usize>,
    pub panic_policy: PanicPolicy,
}

impl DispatchOptions {
    /// Pinned workers, default stack, panics contained.
    pub fn new(core_count: usize, queue_depth: usize) -> Self {
        Self {
            core_count,
            queue_depth,
            pin_workers: true,
            stack_size: None,
            panic_policy: PanicPolicy::default(),
        }
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.pin_workers = pin;
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn panic_policy(mut self, policy: PanicPolicy) -> Self {
        self.panic_policy = policy;
        self
    }
}

/// Owns every per-core resource: one bounded queue and one worker thread
/// per core.
///
/// Several runtimes can coexist in one process. Dropping the runtime shuts
/// it down.
pub struct DispatcherRuntime {
    options: DispatchOptions,
    queues: Vec<Arc<CoreQueue>>,
    stats: Vec<Arc<WorkerStats>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for DispatcherRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherRuntime")
            .field("options", &self.options)
            .field("queues", &self.queues)
            .finish_non_exhaustive()
    }
}

impl DispatcherRuntime {
    /// Start `core_count` pinned workers with `queue_depth` slots each.
    pub fn start(core_count: usize, queue_depth: usize) -> Result<Self, DispatchError> {
        Self::start_with(DispatchOptions::new(core_count, queue_depth))
    }

    pub fn start_with(options: DispatchOptions) -> Result<Self, DispatchError> {
        Self::validate(&options)?;
        let pins: Vec<Option<CoreId>> = if options.pin_workers {
            affinity::resolve_cores(options.core_count)?
                .into_iter()
                .map(Some)
                .collect()
        } else {
            vec![None; options.core_count]
        };
        Self::launch(options, pins)
    }

    /// Pin worker `i` to `cores[i]` instead of the first available cores.
    ///
    /// `core_count` and `pin_workers` of `options` are taken from `cores`.
    pub fn start_on(cores: &[CoreId], options: DispatchOptions) -> Result<Self, DispatchError> {
        let options = DispatchOptions {
            core_count: cores.len(),
            pin_workers: true,
            ..options
        };
        Self::validate(&options)?;
        Self::launch(options, cores.iter().copied().map(Some).collect())
    }

    fn validate(options: &DispatchOptions) -> Result<(), DispatchError> {
        if options.core_count == 0 {
            return Err(DispatchError::NoCores);
        }
        if options.queue_depth == 0 {
            return Err(DispatchError::ZeroQueueDepth);
        }
        Ok(())
    }

    /// Spawn one worker per entry of `pins` and wait until each has
    /// reported whether it got onto its core.
    fn launch(options: DispatchOptions, pins: Vec<Option<CoreId>>) -> Result<Self, DispatchError> {
        let (started_tx, started_rx) = mpsc::channel();
        let mut runtime = Self {
            options,
            queues: Vec::with_capacity(options.core_count),
            stats: Vec::with_capacity(options.core_count),
            workers: Mutex::new(Vec::with_capacity(options.core_count)),
        };

        for (core, pin) in pins.into_iter().enumerate() {
            let (queue, receiver) = CoreQueue::new(core, options.queue_depth);
            let stats = Arc::new(WorkerStats::default());
            runtime.queues.push(queue);
            runtime.stats.push(Arc::clone(&stats));

            let worker = Worker {
                core,
                pin,
                receiver,
                stats,
                panic_policy: options.panic_policy,
            };
            match worker.spawn(options.stack_size, started_tx.clone()) {
                Ok(handle) => runtime
                    .workers
                    .get_mut()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(handle),
                Err(source) => {
                    // Dropping `runtime` stops the workers started so far.
                    return Err(DispatchError::Spawn { core, source });
                }
            }
        }
        drop(started_tx);

        // Each worker reports exactly once before touching its queue.
        for (core, pinned) in started_rx.iter().take(runtime.queues.len()) {
            if !pinned {
                // Dropping `runtime` stops the workers that did start.
                return Err(DispatchError::PinFailed { core });
            }
        }

        info!(
            cores = options.core_count,
            queue_depth = options.queue_depth,
            pinned = options.pin_workers,
            "dispatcher started"
        );
        Ok(runtime)
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    pub fn core_count(&self) -> usize {
        self.queues.len()
    }

    pub fn queue_depth(&self) -> usize {
        self.options.queue_depth
    }

    /// Non-blocking push onto `core`'s queue; returns the ring slot used.
    pub fn try_push(&self, core: usize, descriptor: TaskDescriptor) -> Result<usize, PushError> {
        self.queues
            .get(core)
            .ok_or(PushError::UnknownCore(core))?
            .try_push(descriptor)
    }

    /// Descriptors pushed to `core` and not yet fully executed.
    pub fn outstanding(&self, core: usize) -> usize {
        self.queues.get(core).map_or(0, |q| q.outstanding())
    }

    pub fn executed(&self, core: usize) -> u64 {
        self.stats.get(core).map_or(0, |s| s.executed())
    }

    /// Contained handler panics across all workers.
    pub fn faults(&self) -> u64 {
        self.stats.iter().map(|s| s.faults()).sum()
    }

    /// Close every queue, let the workers drain what was already queued,
    /// and join them. Idempotent.
    pub fn shutdown(&self) {
        for queue in &self.queues {
            queue.close();
        }

        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if handles.is_empty() {
            return;
        }

        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread terminated by a panic");
            }
        }
        info!(cores = self.queues.len(), "dispatcher stopped");
    }
}

impl DispatchBackend for DispatcherRuntime {
    fn core_count(&self) -> usize {
        self.queues.len()
    }

    fn try_push(&self, core: usize, descriptor: TaskDescriptor) -> Result<(), PushError> {
        DispatcherRuntime::try_push(self, core, descriptor).map(|_| ())
    }
}

impl Drop for DispatcherRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
