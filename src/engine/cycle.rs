// src/engine/cycle.rs

//! One schedule cycle of a compute graph.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, trace, warn};

use crate::dag::{ComputeGraph, CycleClaim, NodeIndex};
use crate::exec::TaskDescriptor;

use super::ProducerEvent;

/// Summary of a finished (or abandoned) cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub nodes: usize,
    /// Nodes completed when the report was produced.
    pub completed: usize,
    /// Nodes whose body panicked. They still count as completed.
    pub faulted: usize,
    /// Node descriptors dropped on a full or closed queue.
    pub dropped: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    /// Every node ran (possibly faulting) and none was dropped.
    pub fn is_complete(&self) -> bool {
        self.dropped == 0 && self.completed == self.nodes
    }
}

/// A running cycle: the graph plus the plumbing workers need to hand
/// newly ready nodes back to the producer and to report the end of the
/// cycle.
///
/// Shared by every node descriptor of the cycle. The run owns the graph's
/// [`CycleClaim`]: a cycle that completes releases it before the report is
/// sent, an abandoned one only once the last descriptor or event holding
/// the run is gone.
pub struct GraphRun {
    graph: Arc<ComputeGraph>,
    claim: Mutex<Option<CycleClaim>>,
    cycle: u64,
    events: mpsc::UnboundedSender<ProducerEvent>,
    faulted: AtomicUsize,
    dropped: AtomicUsize,
    started: Instant,
    done: Mutex<Option<oneshot::Sender<CycleReport>>>,
}

impl fmt::Debug for GraphRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphRun")
            .field("cycle", &self.cycle)
            .field("nodes", &self.graph.node_count())
            .field("completed", &self.graph.completed_count())
            .finish_non_exhaustive()
    }
}

impl GraphRun {
    pub fn new(
        claim: CycleClaim,
        cycle: u64,
        events: mpsc::UnboundedSender<ProducerEvent>,
    ) -> (Arc<Self>, oneshot::Receiver<CycleReport>) {
        let (tx, rx) = oneshot::channel();
        let run = Arc::new(Self {
            graph: Arc::clone(claim.graph()),
            claim: Mutex::new(Some(claim)),
            cycle,
            events,
            faulted: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
            started: Instant::now(),
            done: Mutex::new(Some(tx)),
        });
        (run, rx)
    }

    pub fn graph(&self) -> &ComputeGraph {
        &self.graph
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn faulted(&self) -> usize {
        self.faulted.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Descriptors for the nodes that are ready at the start of the cycle.
    pub fn root_descriptors(self: &Arc<Self>) -> impl Iterator<Item = TaskDescriptor> + '_ {
        self.graph
            .ready_nodes()
            .map(move |node| TaskDescriptor::node(Arc::clone(self), node))
    }

    pub(crate) fn record_fault(&self) {
        self.faulted.fetch_add(1, Ordering::Relaxed);
    }

    /// Complete `node` after its body returned.
    ///
    /// Every dependent released by this completion is sent to the producer
    /// as a `NodeReady` event; the last completion of the cycle sends the
    /// report.
    pub(crate) fn complete(self: &Arc<Self>, node: NodeIndex) {
        let step = self.graph.on_task_complete(node, |ready| {
            let event = ProducerEvent::NodeReady {
                run: Arc::clone(self),
                node: ready,
            };
            if self.events.send(event).is_err() {
                warn!(cycle = self.cycle, node = %ready, "producer stopped; ready node not dispatched");
            }
        });

        match step {
            Ok(step) => {
                trace!(
                    cycle = self.cycle,
                    node = %node,
                    newly_ready = step.newly_ready,
                    "node completed"
                );
                if step.cycle_finished {
                    self.finish();
                }
            }
            Err(err) => {
                error!(cycle = self.cycle, node = %node, error = %err, "completion rejected");
            }
        }
    }

    /// Give up on the cycle because `node` could not be enqueued.
    ///
    /// The report is sent right away. The graph stays claimed until every
    /// stale descriptor of this run is gone, and partially executed after
    /// that; `ComputeGraph::reset_exclusive` recovers it.
    pub(crate) fn abandon(&self, node: NodeIndex) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(
            cycle = self.cycle,
            node = %node,
            label = self.graph.label_of(node).unwrap_or("?"),
            "node descriptor dropped; cycle abandoned"
        );
        self.finish();
    }

    /// Send the report if nobody has yet.
    pub(crate) fn finish(&self) {
        let Some(tx) = self
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let report = CycleReport {
            cycle: self.cycle,
            nodes: self.graph.node_count(),
            completed: self.graph.completed_count(),
            faulted: self.faulted(),
            dropped: self.dropped.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        };
        if report.completed == report.nodes {
            // Nothing of this cycle is left in flight; let the next one start.
            drop(
                self.claim
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take(),
            );
        }
        info!(
            cycle = report.cycle,
            nodes = report.nodes,
            faulted = report.faulted,
            dropped = report.dropped,
            elapsed_us = report.elapsed.as_micros() as u64,
            "cycle finished"
        );
        // The waiter may have given up; nothing else to do then.
        let _ = tx.send(report);
    }
}
