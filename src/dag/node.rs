// src/dag/node.rs

//! Graph nodes: task bodies, dependency counters and per-cycle run state.

use std::fmt;
use std::sync::Arc;

use crate::sync::{AtomicU8, AtomicU16, Ordering};

/// Index of a node inside its [`ComputeGraph`](super::ComputeGraph) arena.
///
/// Edges are stored as indices rather than references, so a graph can be
/// moved or shared behind an `Arc` without invalidating them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) u16);

impl NodeIndex {
    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The work a node performs once all of its dependencies have completed.
///
/// Implemented for every `Fn()` closure; [`ComputeGraph::init_node`]
/// additionally binds a plain `Fn(&A)` to an externally shared argument.
///
/// [`ComputeGraph::init_node`]: super::ComputeGraph::init_node
pub trait TaskBody: Send + Sync + 'static {
    fn run(&self);
}

impl<F> TaskBody for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn run(&self) {
        self()
    }
}

/// A task function bound to an argument that the embedder also holds.
pub(crate) struct BoundTask<F, A> {
    function: F,
    argument: Arc<A>,
}

impl<F, A> BoundTask<F, A> {
    pub(crate) fn new(function: F, argument: Arc<A>) -> Self {
        Self { function, argument }
    }
}

impl<F, A> TaskBody for BoundTask<F, A>
where
    F: Fn(&A) + Send + Sync + 'static,
    A: Send + Sync + 'static,
{
    fn run(&self) {
        (self.function)(&self.argument)
    }
}

/// Per-cycle state of a node.
///
/// `NotReady -> Ready` fires exactly once, when the last dependency
/// completes. `Ready -> Dispatched` when a worker starts the task body,
/// `Dispatched -> Completed` when it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    NotReady = 0,
    Ready = 1,
    Dispatched = 2,
    Completed = 3,
}

impl NodeState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => NodeState::NotReady,
            1 => NodeState::Ready,
            2 => NodeState::Dispatched,
            _ => NodeState::Completed,
        }
    }

    /// Initial state after a reset.
    pub(crate) fn initial(total_dependencies: u16) -> Self {
        if total_dependencies == 0 {
            NodeState::Ready
        } else {
            NodeState::NotReady
        }
    }
}

/// One schedulable unit of work.
pub(crate) struct GraphNode {
    pub(crate) label: String,
    pub(crate) body: Box<dyn TaskBody>,
    /// Nodes this node waits for. Never grows past `GraphLimits::max_deps`.
    pub(crate) deps: Vec<NodeIndex>,
    /// Nodes waiting for this one; walked on completion.
    pub(crate) dependents: Vec<NodeIndex>,
    pub(crate) total_dependencies: u16,
    pub(crate) remaining_dependencies: AtomicU16,
    state: AtomicU8,
}

impl GraphNode {
    pub(crate) fn new(label: String, body: Box<dyn TaskBody>, max_deps: usize) -> Self {
        Self {
            label,
            body,
            deps: Vec::with_capacity(max_deps),
            dependents: Vec::new(),
            total_dependencies: 0,
            remaining_dependencies: AtomicU16::new(0),
            state: AtomicU8::new(NodeState::Ready as u8),
        }
    }

    pub(crate) fn state(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Atomically move `from -> to`, returning the observed state on failure.
    pub(crate) fn transition(&self, from: NodeState, to: NodeState) -> Result<(), NodeState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(NodeState::from_u8)
    }
}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNode")
            .field("label", &self.label)
            .field("deps", &self.deps)
            .field("dependents", &self.dependents)
            .field("total_dependencies", &self.total_dependencies)
            .field(
                "remaining_dependencies",
                &self.remaining_dependencies.load(Ordering::Relaxed),
            )
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
