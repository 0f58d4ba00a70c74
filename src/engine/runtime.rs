// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::dag::ComputeGraph;
use crate::errors::{Result, SmpdagError};
use crate::exec::{DispatchBackend, TaskDescriptor, TaskHandler};
use crate::types::Workload;

use super::core::{DispatchCore, TickReport};
use super::cycle::{CycleReport, GraphRun};
use super::{MIN_TICK, ProducerEvent, ProducerOptions};

/// The single producer: feeds ready descriptors into the per-core queues.
///
/// This is the async shell around [`DispatchCore`]. It wakes on two
/// sources only: producer events (cycle starts, ready nodes, submitted
/// handlers) and the fixed-interval ticker. Pushes never wait, so a slow
/// core can never stall the feed to the others.
pub struct Producer<B: DispatchBackend> {
    core: DispatchCore,
    backend: B,
    events_rx: mpsc::UnboundedReceiver<ProducerEvent>,
    options: ProducerOptions,
}

impl<B: DispatchBackend> fmt::Debug for Producer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<B: DispatchBackend + 'static> Producer<B> {
    pub fn new(backend: B, options: ProducerOptions) -> (Self, ProducerHandle) {
        Self::with_core(backend, options, DispatchCore::new(options.full_queue_behaviour))
    }

    /// Use a preconfigured core (for example one with a custom synthetic
    /// handler).
    pub fn with_core(
        backend: B,
        options: ProducerOptions,
        core: DispatchCore,
    ) -> (Self, ProducerHandle) {
        if options.tick < MIN_TICK {
            warn!(tick = ?options.tick, min = ?MIN_TICK, "producer tick too short; clamped");
        }
        let options = ProducerOptions {
            tick: options.tick.max(MIN_TICK),
            ..options
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let producer = Self {
            core,
            backend,
            events_rx: rx,
            options,
        };
        let handle = ProducerHandle {
            events: tx,
            cycles: Arc::new(AtomicU64::new(0)),
        };
        (producer, handle)
    }

    pub fn options(&self) -> ProducerOptions {
        self.options
    }

    /// Run the loop on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<TickReport> {
        tokio::spawn(self.run())
    }

    /// Main loop. Returns the totals once shutdown is requested or every
    /// handle is gone.
    pub async fn run(mut self) -> TickReport {
        info!(
            cores = self.backend.core_count(),
            tick_ms = self.options.tick.as_millis() as u64,
            workload = ?self.options.workload,
            behaviour = ?self.options.full_queue_behaviour,
            "producer started"
        );

        let mut ticker = time::interval(self.options.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        None => {
                            info!("producer event channel closed; exiting");
                            break;
                        }
                        Some(ProducerEvent::ShutdownRequested) => {
                            info!("producer shutdown requested");
                            break;
                        }
                        Some(event) => {
                            self.handle_event(event);
                            self.core.tick(&self.backend);
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.core.tick(&self.backend);
                    if self.options.workload == Workload::Synthetic {
                        self.core.synthetic_round(&self.backend);
                    }
                }
            }
        }

        let totals = self.core.totals();
        info!(
            dispatched = totals.dispatched,
            dropped = totals.dropped,
            abandoned_backlog = self.core.backlog_len(),
            "producer stopped"
        );
        totals
    }

    fn handle_event(&mut self, event: ProducerEvent) {
        match event {
            ProducerEvent::CycleStarted { run } => {
                debug!(cycle = run.cycle(), nodes = run.graph().node_count(), "cycle started");
                for descriptor in run.root_descriptors() {
                    self.core.enqueue(descriptor);
                }
            }
            ProducerEvent::NodeReady { run, node } => {
                self.core.enqueue(TaskDescriptor::node(run, node));
            }
            ProducerEvent::Submit { handler } => {
                self.core.enqueue(TaskDescriptor::Handler(handler));
            }
            ProducerEvent::ShutdownRequested => {}
        }
    }
}

/// Cheap, cloneable front door to a running [`Producer`].
#[derive(Debug, Clone)]
pub struct ProducerHandle {
    events: mpsc::UnboundedSender<ProducerEvent>,
    cycles: Arc<AtomicU64>,
}

impl ProducerHandle {
    /// Claim and reset `graph`, run one full cycle of it, and wait for the
    /// report.
    ///
    /// Fails with `CycleInProgress` while another cycle of the same graph is
    /// running or still has descriptors queued (see
    /// [`ComputeGraph::claim_cycle`]), and with `ProducerStopped` once the
    /// producer is gone.
    pub async fn run_cycle(&self, graph: &Arc<ComputeGraph>) -> Result<CycleReport> {
        let claim = graph.claim_cycle()?;
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let (run, done) = GraphRun::new(claim, cycle, self.events.clone());

        if graph.is_empty() {
            run.finish();
        } else {
            self.events
                .send(ProducerEvent::CycleStarted { run })
                .map_err(|_| SmpdagError::ProducerStopped)?;
        }

        done.await.map_err(|_| SmpdagError::ProducerStopped)
    }

    /// Fire-and-forget: queue `handler` for the next dispatch pass.
    pub fn submit(&self, handler: Arc<dyn TaskHandler>) -> Result<()> {
        self.events
            .send(ProducerEvent::Submit { handler })
            .map_err(|_| SmpdagError::ProducerStopped)
    }

    /// Ask the producer loop to exit. Descriptors already queued on a core
    /// still run; the backlog is discarded.
    pub fn shutdown(&self) {
        let _ = self.events.send(ProducerEvent::ShutdownRequested);
    }

    /// Cycles started through this handle (and its clones).
    pub fn cycles_started(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }
}
