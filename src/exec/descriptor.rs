// src/exec/descriptor.rs

//! What travels through a per-core queue.

use std::fmt;
use std::sync::Arc;

use crate::dag::NodeIndex;
use crate::engine::cycle::GraphRun;

/// A standalone unit of work pushed onto a core's queue.
///
/// Implemented for every `Fn()` closure. Handlers must return in bounded
/// time: a handler that never returns starves its core.
pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self);

    /// Short name used in logs.
    fn name(&self) -> &str {
        "handler"
    }
}

impl<F> TaskHandler for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn handle(&self) {
        self()
    }
}

/// One node of a running graph cycle.
#[derive(Clone)]
pub struct NodeJob {
    pub run: Arc<GraphRun>,
    pub node: NodeIndex,
}

impl fmt::Debug for NodeJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeJob")
            .field("cycle", &self.run.cycle())
            .field("node", &self.node)
            .finish()
    }
}

/// A queued unit of work.
///
/// Both variants are reference counted, so enqueueing moves an `Arc` and
/// never allocates.
#[derive(Clone)]
pub enum TaskDescriptor {
    /// A graph node, completed through its run once the body returns.
    Node(NodeJob),
    /// A fire-and-forget handler.
    Handler(Arc<dyn TaskHandler>),
}

impl TaskDescriptor {
    pub fn node(run: Arc<GraphRun>, node: NodeIndex) -> Self {
        TaskDescriptor::Node(NodeJob { run, node })
    }

    pub fn handler(handler: Arc<dyn TaskHandler>) -> Self {
        TaskDescriptor::Handler(handler)
    }

    /// Wrap a closure. Allocates once; clone the result to re-enqueue it.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        TaskDescriptor::Handler(Arc::new(f))
    }

    /// Run on the calling thread, without a panic boundary.
    ///
    /// A node job is dispatched, run and completed exactly like on a worker;
    /// a node that is not `Ready` is skipped.
    pub fn run_inline(&self) {
        match self {
            TaskDescriptor::Handler(handler) => handler.handle(),
            TaskDescriptor::Node(job) => {
                if job.run.graph().mark_dispatched(job.node).is_ok() {
                    job.run.graph().run_body(job.node);
                    job.run.complete(job.node);
                }
            }
        }
    }

    /// Label used in log lines.
    pub fn label(&self) -> &str {
        match self {
            TaskDescriptor::Node(job) => job.run.graph().label_of(job.node).unwrap_or("?"),
            TaskDescriptor::Handler(handler) => handler.name(),
        }
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskDescriptor::Node(job) => job.fmt(f),
            TaskDescriptor::Handler(handler) => f
                .debug_tuple("Handler")
                .field(&handler.name())
                .finish(),
        }
    }
}
