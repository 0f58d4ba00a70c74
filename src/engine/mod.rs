// src/engine/mod.rs

//! Producer engine.
//!
//! This module ties together:
//! - the pure dispatch core (round-robin placement, backlog, full-queue
//!   policy)
//! - graph cycles: one reset-and-replay of a compute graph, fed node by
//!   node as dependencies complete
//! - the async producer loop that reacts to:
//!   - cycle starts
//!   - nodes becoming ready on a worker
//!   - submitted handlers
//!   - its fixed-interval ticker
//!   - shutdown requests
//!
//! The pure core lives in [`core`]; the async/IO shell is implemented in
//! [`runtime`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::dag::NodeIndex;
use crate::exec::TaskHandler;
use crate::types::{FullQueueBehaviour, Workload};

/// Shortest tick the producer runs with.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Options of the producer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerOptions {
    /// Interval between dispatch passes. Raised to [`MIN_TICK`] when
    /// shorter.
    pub tick: Duration,
    pub full_queue_behaviour: FullQueueBehaviour,
    pub workload: Workload,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            full_queue_behaviour: FullQueueBehaviour::default(),
            workload: Workload::default(),
        }
    }
}

/// Events flowing into the producer from embedders and workers.
pub enum ProducerEvent {
    /// A graph was reset; its roots should be dispatched.
    CycleStarted { run: Arc<GraphRun> },
    /// A node's last dependency completed on some worker.
    NodeReady { run: Arc<GraphRun>, node: NodeIndex },
    /// Standalone handler to dispatch once.
    Submit { handler: Arc<dyn TaskHandler> },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

impl fmt::Debug for ProducerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerEvent::CycleStarted { run } => f
                .debug_struct("CycleStarted")
                .field("cycle", &run.cycle())
                .finish(),
            ProducerEvent::NodeReady { run, node } => f
                .debug_struct("NodeReady")
                .field("cycle", &run.cycle())
                .field("node", node)
                .finish(),
            ProducerEvent::Submit { handler } => f
                .debug_struct("Submit")
                .field("handler", &handler.name())
                .finish(),
            ProducerEvent::ShutdownRequested => f.write_str("ShutdownRequested"),
        }
    }
}

pub mod core;
pub mod cycle;
pub mod runtime;

pub use self::core::{DispatchCore, SyntheticTask, TickReport};
pub use self::cycle::{CycleReport, GraphRun};
pub use self::runtime::{Producer, ProducerHandle};
