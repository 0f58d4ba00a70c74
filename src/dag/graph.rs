// src/dag/graph.rs

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use tracing::{debug, error, trace};

use crate::config::model::ConfigFile;
use crate::dag::error::{Capacity, GraphError};
use crate::dag::limits::GraphLimits;
use crate::dag::node::{BoundTask, GraphNode, NodeIndex, NodeState, TaskBody};
use crate::sync::{AtomicUsize, Ordering, fence};

/// Result of reporting one node as completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionStep {
    /// Dependents whose counter crossed zero during this call.
    pub newly_ready: usize,
    /// Whether this completion was the last one of the current cycle.
    pub cycle_finished: bool,
}

/// Fixed-capacity DAG of tasks with atomic readiness tracking.
///
/// Construction (`init_node`, `add_dependency`) needs `&mut self` and is
/// therefore single-threaded. Once built, the graph is shared (typically
/// behind an `Arc`) and only the per-node counters, states and the
/// completion counter change; topology is read-only.
///
/// A node becomes ready when its remaining-dependency counter is decremented
/// from 1 to 0. That transition is detected with a single `fetch_sub`, so of
/// several predecessors completing concurrently exactly one observes it and
/// hands the dependent on.
///
/// At most one cycle runs at a time: [`claim_cycle`](Self::claim_cycle)
/// hands out a [`CycleClaim`] and plain [`reset`](Self::reset) is refused
/// while one is alive.
#[derive(Debug)]
pub struct ComputeGraph {
    nodes: Vec<GraphNode>,
    limits: GraphLimits,
    completed: AtomicUsize,
    claimed: AtomicBool,
}

/// Exclusive right to run one cycle of a shared graph.
///
/// Dropping the claim lets the next cycle start. Whoever may still hand out
/// node references of the cycle (queued descriptors, pending events) must
/// keep the claim alive until they are gone.
#[must_use = "the cycle ends as soon as the claim is dropped"]
#[derive(Debug)]
pub struct CycleClaim {
    graph: Arc<ComputeGraph>,
}

impl CycleClaim {
    pub fn graph(&self) -> &Arc<ComputeGraph> {
        &self.graph
    }
}

impl Drop for CycleClaim {
    fn drop(&mut self) {
        self.graph.claimed.store(false, Ordering::Release);
        trace!("cycle claim released");
    }
}

impl Default for ComputeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeGraph {
    /// Empty graph with the default `MAX_TASKS` / `MAX_DEPS` limits.
    pub fn new() -> Self {
        Self::with_limits(GraphLimits::default())
    }

    pub fn with_limits(limits: GraphLimits) -> Self {
        let limits = GraphLimits::new(limits.max_tasks, limits.max_deps);
        Self {
            nodes: Vec::with_capacity(limits.max_tasks),
            limits,
            completed: AtomicUsize::new(0),
            claimed: AtomicBool::new(false),
        }
    }

    /// Add a node running `function(&argument)`.
    ///
    /// The argument stays shared with the caller; the node only keeps a
    /// reference-counted handle to it. The node starts with no dependencies
    /// and is therefore ready until an edge is added.
    pub fn init_node<F, A>(&mut self, function: F, argument: Arc<A>) -> Result<NodeIndex, GraphError>
    where
        F: Fn(&A) + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        self.push_node(None, Box::new(BoundTask::new(function, argument)))
    }

    /// Like [`init_node`](Self::init_node), with a label used in logs.
    pub fn init_labeled_node<F, A>(
        &mut self,
        label: impl Into<String>,
        function: F,
        argument: Arc<A>,
    ) -> Result<NodeIndex, GraphError>
    where
        F: Fn(&A) + Send + Sync + 'static,
        A: Send + Sync + 'static,
    {
        self.push_node(Some(label.into()), Box::new(BoundTask::new(function, argument)))
    }

    /// Add a node whose body is a closure or any other [`TaskBody`].
    pub fn init_node_fn(
        &mut self,
        label: impl Into<String>,
        body: impl TaskBody,
    ) -> Result<NodeIndex, GraphError> {
        self.push_node(Some(label.into()), Box::new(body))
    }

    fn push_node(
        &mut self,
        label: Option<String>,
        body: Box<dyn TaskBody>,
    ) -> Result<NodeIndex, GraphError> {
        self.ensure_not_started()?;
        if self.nodes.len() >= self.limits.max_tasks {
            return Err(GraphError::CapacityExceeded(Capacity::Tasks {
                limit: self.limits.max_tasks,
            }));
        }
        // max_tasks is clamped to the u16 range, so the cast cannot truncate.
        let index = NodeIndex(self.nodes.len() as u16);
        let label = label.unwrap_or_else(|| format!("node-{}", index.0));
        trace!(node = %index, label = %label, "node initialised");
        self.nodes
            .push(GraphNode::new(label, body, self.limits.max_deps));
        Ok(index)
    }

    /// Record that `node` depends on `dependency`.
    ///
    /// The edge is stored on the dependent side (and mirrored on the
    /// dependency for completion propagation); `node`'s total and remaining
    /// dependency counts both grow by one. On error nothing is modified.
    pub fn add_dependency(&mut self, node: NodeIndex, dependency: NodeIndex) -> Result<(), GraphError> {
        self.ensure_not_started()?;
        self.check_index(node)?;
        self.check_index(dependency)?;
        if node == dependency {
            return Err(GraphError::SelfDependency(node));
        }

        let target = &self.nodes[node.index()];
        if target.deps.contains(&dependency) {
            return Err(GraphError::DuplicateDependency { node, dependency });
        }
        if target.deps.len() >= self.limits.max_deps {
            return Err(GraphError::CapacityExceeded(Capacity::Dependencies {
                node,
                limit: self.limits.max_deps,
            }));
        }
        if self.reaches(dependency, node) {
            return Err(GraphError::WouldCreateCycle { node, dependency });
        }

        let target = &mut self.nodes[node.index()];
        target.deps.push(dependency);
        target.total_dependencies += 1;
        target
            .remaining_dependencies
            .fetch_add(1, Ordering::Relaxed);
        target.set_state(NodeState::NotReady);
        self.nodes[dependency.index()].dependents.push(node);

        trace!(node = %node, dependency = %dependency, "dependency added");
        Ok(())
    }

    /// Restore every counter to its total so the same schedule can run again.
    ///
    /// This is a barrier: it refuses to run while a cycle is partially
    /// executed or while a [`CycleClaim`] is alive, since in-flight work of
    /// the old cycle would corrupt the new one. Nodes with no dependencies
    /// start out ready.
    pub fn reset(&self) -> Result<(), GraphError> {
        if self.is_claimed() {
            return Err(self.in_progress());
        }
        self.ensure_quiescent()?;
        self.reset_counters();
        Ok(())
    }

    /// Take the graph for one cycle and reset it.
    ///
    /// Fails with `CycleInProgress` while another claim is alive or the
    /// previous cycle is only partially executed.
    pub fn claim_cycle(self: &Arc<Self>) -> Result<CycleClaim, GraphError> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(self.in_progress());
        }
        let claim = CycleClaim {
            graph: Arc::clone(self),
        };
        self.ensure_quiescent()?;
        self.reset_counters();
        Ok(claim)
    }

    /// Whether a [`CycleClaim`] is currently alive.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Reset regardless of cycle progress.
    ///
    /// Exclusive access guarantees that no worker still holds a node of the
    /// previous cycle, so an abandoned cycle (for example one whose node was
    /// dropped on a full queue) can be recovered.
    pub fn reset_exclusive(&mut self) {
        *self.claimed.get_mut() = false;
        self.reset_counters();
    }

    fn ensure_quiescent(&self) -> Result<(), GraphError> {
        let completed = self.completed.load(Ordering::Acquire);
        let total = self.nodes.len();
        let dispatched = self
            .nodes
            .iter()
            .any(|n| n.state() == NodeState::Dispatched);
        if dispatched || (completed != 0 && completed != total) {
            return Err(GraphError::CycleInProgress { completed, total });
        }
        Ok(())
    }

    fn in_progress(&self) -> GraphError {
        GraphError::CycleInProgress {
            completed: self.completed.load(Ordering::Acquire),
            total: self.nodes.len(),
        }
    }

    fn reset_counters(&self) {
        for node in &self.nodes {
            node.remaining_dependencies
                .store(node.total_dependencies, Ordering::Relaxed);
            node.set_state(NodeState::initial(node.total_dependencies));
        }
        self.completed.store(0, Ordering::Release);
        debug!(nodes = self.nodes.len(), "compute graph reset");
    }

    /// Claim a ready node for execution (`Ready -> Dispatched`).
    ///
    /// Fails for any other state, so a node can never be started twice in
    /// one cycle even if it was somehow handed out twice.
    pub fn mark_dispatched(&self, node: NodeIndex) -> Result<(), GraphError> {
        self.check_index(node)?;
        self.nodes[node.index()]
            .transition(NodeState::Ready, NodeState::Dispatched)
            .map_err(|actual| GraphError::InvalidTransition {
                node,
                actual,
                to: NodeState::Dispatched,
            })
    }

    /// Report that a dispatched node's task returned.
    ///
    /// Decrements every dependent's counter and calls `on_ready` exactly once
    /// for each dependent whose counter reached zero here. Writes made by the
    /// task body happen-before the dependent is observed as ready.
    pub fn on_task_complete(
        &self,
        node: NodeIndex,
        mut on_ready: impl FnMut(NodeIndex),
    ) -> Result<CompletionStep, GraphError> {
        self.check_index(node)?;
        let finished = &self.nodes[node.index()];
        finished
            .transition(NodeState::Dispatched, NodeState::Completed)
            .map_err(|actual| GraphError::InvalidTransition {
                node,
                actual,
                to: NodeState::Completed,
            })?;

        if !finished.dependents.is_empty() {
            fence(Ordering::Release);
        }

        let mut newly_ready = 0;
        for &dependent in &finished.dependents {
            if !self.decrement_and_check_zero(dependent) {
                continue;
            }
            if newly_ready == 0 {
                fence(Ordering::Acquire);
            }
            match self.nodes[dependent.index()].transition(NodeState::NotReady, NodeState::Ready) {
                Ok(()) => {
                    newly_ready += 1;
                    trace!(node = %dependent, completed_by = %node, "dependent became ready");
                    on_ready(dependent);
                }
                Err(actual) => {
                    error!(
                        node = %dependent,
                        state = ?actual,
                        "dependency counter reached zero twice in one cycle; not dispatching again"
                    );
                }
            }
        }

        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(CompletionStep {
            newly_ready,
            cycle_finished: completed == self.nodes.len(),
        })
    }

    /// Decrement a node's remaining-dependency counter.
    ///
    /// Returns `true` iff this call moved the counter from 1 to 0. The
    /// decision is taken on the value returned by the `fetch_sub` itself, not
    /// on a second read, so concurrent callers cannot both see zero.
    pub(crate) fn decrement_and_check_zero(&self, node: NodeIndex) -> bool {
        let previous = self.nodes[node.index()]
            .remaining_dependencies
            .fetch_sub(1, Ordering::Relaxed);
        debug_assert_ne!(previous, 0, "remaining dependency counter underflow on {node}");
        previous == 1
    }

    /// Dispatch, run and complete a ready node on the calling thread.
    pub fn execute_node(
        &self,
        node: NodeIndex,
        on_ready: impl FnMut(NodeIndex),
    ) -> Result<CompletionStep, GraphError> {
        self.mark_dispatched(node)?;
        self.nodes[node.index()].body.run();
        self.on_task_complete(node, on_ready)
    }

    /// Run a node's task body without touching its state.
    pub(crate) fn run_body(&self, node: NodeIndex) {
        self.nodes[node.index()].body.run();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.limits.max_tasks
    }

    pub fn limits(&self) -> GraphLimits {
        self.limits
    }

    /// All node indices in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).map(|i| NodeIndex(i as u16))
    }

    /// Nodes currently in the `Ready` state.
    pub fn ready_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes()
            .filter(|&idx| self.nodes[idx.index()].state() == NodeState::Ready)
    }

    pub fn state_of(&self, node: NodeIndex) -> Option<NodeState> {
        self.nodes.get(node.index()).map(GraphNode::state)
    }

    pub fn remaining_dependencies(&self, node: NodeIndex) -> Option<u16> {
        self.nodes
            .get(node.index())
            .map(|n| n.remaining_dependencies.load(Ordering::Acquire))
    }

    pub fn total_dependencies(&self, node: NodeIndex) -> Option<u16> {
        self.nodes.get(node.index()).map(|n| n.total_dependencies)
    }

    /// Immediate dependencies of a node (the nodes it waits for).
    pub fn dependencies_of(&self, node: NodeIndex) -> &[NodeIndex] {
        self.nodes
            .get(node.index())
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a node (the nodes waiting for it).
    pub fn dependents_of(&self, node: NodeIndex) -> &[NodeIndex] {
        self.nodes
            .get(node.index())
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    pub fn label_of(&self, node: NodeIndex) -> Option<&str> {
        self.nodes.get(node.index()).map(|n| n.label.as_str())
    }

    pub fn index_of(&self, label: &str) -> Option<NodeIndex> {
        self.nodes
            .iter()
            .position(|n| n.label == label)
            .map(|i| NodeIndex(i as u16))
    }

    /// Nodes completed in the current cycle.
    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn is_cycle_complete(&self) -> bool {
        self.completed_count() == self.nodes.len()
    }

    fn check_index(&self, node: NodeIndex) -> Result<(), GraphError> {
        if node.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(node))
        }
    }

    /// Construction is only allowed while no node of the current cycle has
    /// been dispatched or completed.
    fn ensure_not_started(&self) -> Result<(), GraphError> {
        let started = self.nodes.iter().any(|n| {
            matches!(n.state(), NodeState::Dispatched | NodeState::Completed)
        });
        if started {
            return Err(self.in_progress());
        }
        Ok(())
    }

    /// Whether `from` transitively depends on `to`.
    fn reaches(&self, from: NodeIndex, to: NodeIndex) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if std::mem::replace(&mut visited[current.index()], true) {
                continue;
            }
            stack.extend(self.nodes[current.index()].deps.iter().copied());
        }
        false
    }
}

/// Body of a node built from a `[task.<name>]` section: busy work for a
/// fixed duration on whichever core runs it.
struct ConfiguredTask {
    name: String,
    work: Duration,
}

impl TaskBody for ConfiguredTask {
    fn run(&self) {
        let start = Instant::now();
        while start.elapsed() < self.work {
            std::hint::spin_loop();
        }
        debug!(
            task = %self.name,
            work_us = self.work.as_micros() as u64,
            "configured task finished"
        );
    }
}

impl ComputeGraph {
    /// Build a graph from a validated [`ConfigFile`].
    ///
    /// Tasks are added in name order, then wired by their `after` lists.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self, GraphError> {
        let mut graph = Self::with_limits(cfg.limits);
        let mut indices = Vec::with_capacity(cfg.task.len());

        for (name, task) in cfg.task.iter() {
            let body = ConfiguredTask {
                name: name.clone(),
                work: Duration::from_micros(task.work_us),
            };
            let idx = graph.init_node_fn(name.clone(), body)?;
            indices.push((name.as_str(), idx));
        }

        for (name, task) in cfg.task.iter() {
            let Some(node) = graph.index_of(name) else {
                continue;
            };
            for dep in task.after.iter() {
                // Unknown names were rejected by config validation.
                if let Some(dependency) = graph.index_of(dep) {
                    graph.add_dependency(node, dependency)?;
                }
            }
        }

        debug!(tasks = ?indices, "compute graph built from config");
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize as StdAtomicUsize, Ordering as StdOrdering};

    fn noop() -> impl TaskBody {
        || {}
    }

    /// A (0 deps), B (0 deps), C after {A, B}, D after {C}.
    fn diamond() -> (ComputeGraph, [NodeIndex; 4]) {
        let mut g = ComputeGraph::new();
        let a = g.init_node_fn("A", noop()).unwrap();
        let b = g.init_node_fn("B", noop()).unwrap();
        let c = g.init_node_fn("C", noop()).unwrap();
        let d = g.init_node_fn("D", noop()).unwrap();
        g.add_dependency(c, a).unwrap();
        g.add_dependency(c, b).unwrap();
        g.add_dependency(d, c).unwrap();
        (g, [a, b, c, d])
    }

    #[test]
    fn init_node_starts_ready_with_zero_counts() {
        let mut g = ComputeGraph::new();
        let arg = Arc::new(StdAtomicUsize::new(0));
        let n = g
            .init_node(|hits: &StdAtomicUsize| {
                hits.fetch_add(1, StdOrdering::SeqCst);
            }, arg.clone())
            .unwrap();

        assert_eq!(g.total_dependencies(n), Some(0));
        assert_eq!(g.remaining_dependencies(n), Some(0));
        assert_eq!(g.state_of(n), Some(NodeState::Ready));
        assert_eq!(g.label_of(n), Some("node-0"));

        g.execute_node(n, |_| {}).unwrap();
        assert_eq!(arg.load(StdOrdering::SeqCst), 1);
    }

    #[test]
    fn add_dependency_counts_on_dependent_side() {
        let (g, [a, b, c, d]) = diamond();
        assert_eq!(g.total_dependencies(c), Some(2));
        assert_eq!(g.remaining_dependencies(c), Some(2));
        assert_eq!(g.dependencies_of(c), &[a, b]);
        assert_eq!(g.dependents_of(a), &[c]);
        assert_eq!(g.dependents_of(c), &[d]);
        assert_eq!(g.ready_nodes().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn dependent_becomes_ready_only_after_last_dependency() {
        let (g, [a, b, c, d]) = diamond();
        g.reset().unwrap();

        let mut ready = Vec::new();
        let step = g.execute_node(a, |n| ready.push(n)).unwrap();
        assert_eq!(step.newly_ready, 0);
        assert!(ready.is_empty());
        assert_eq!(g.state_of(c), Some(NodeState::NotReady));
        assert_eq!(g.remaining_dependencies(c), Some(1));

        g.execute_node(b, |n| ready.push(n)).unwrap();
        assert_eq!(ready, vec![c]);
        assert_eq!(g.state_of(c), Some(NodeState::Ready));

        ready.clear();
        let step = g.execute_node(c, |n| ready.push(n)).unwrap();
        assert_eq!(ready, vec![d]);
        assert!(!step.cycle_finished);

        let step = g.execute_node(d, |_| {}).unwrap();
        assert!(step.cycle_finished);
        assert!(g.is_cycle_complete());
    }

    #[test]
    fn fifth_dependency_is_rejected_without_touching_neighbours() {
        let mut g = ComputeGraph::new();
        let target = g.init_node_fn("target", noop()).unwrap();
        let sibling = g.init_node_fn("sibling", noop()).unwrap();
        let sources: Vec<_> = (0..5)
            .map(|i| g.init_node_fn(format!("src-{i}"), noop()).unwrap())
            .collect();
        g.add_dependency(sibling, sources[0]).unwrap();

        for &src in &sources[..4] {
            g.add_dependency(target, src).unwrap();
        }
        let err = g.add_dependency(target, sources[4]).unwrap_err();
        assert_eq!(
            err,
            GraphError::CapacityExceeded(Capacity::Dependencies { node: target, limit: 4 })
        );

        assert_eq!(g.dependencies_of(target), &sources[..4]);
        assert_eq!(g.total_dependencies(target), Some(4));
        assert_eq!(g.dependencies_of(sibling), &[sources[0]]);
        assert_eq!(g.total_dependencies(sibling), Some(1));
        assert!(g.dependents_of(sources[4]).is_empty());
    }

    #[test]
    fn node_capacity_is_enforced() {
        let mut g = ComputeGraph::with_limits(GraphLimits::new(2, 4));
        g.init_node_fn("a", noop()).unwrap();
        g.init_node_fn("b", noop()).unwrap();
        let err = g.init_node_fn("c", noop()).unwrap_err();
        assert_eq!(err, GraphError::CapacityExceeded(Capacity::Tasks { limit: 2 }));
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn malformed_edges_are_rejected() {
        let (mut g, [a, _b, c, d]) = diamond();
        assert_eq!(g.add_dependency(a, a), Err(GraphError::SelfDependency(a)));
        assert_eq!(
            g.add_dependency(c, a),
            Err(GraphError::DuplicateDependency { node: c, dependency: a })
        );
        assert_eq!(
            g.add_dependency(a, d),
            Err(GraphError::WouldCreateCycle { node: a, dependency: d })
        );
        let ghost = NodeIndex(42);
        assert_eq!(g.add_dependency(a, ghost), Err(GraphError::UnknownNode(ghost)));
        assert_eq!(g.total_dependencies(a), Some(0));
    }

    #[test]
    fn reset_is_refused_mid_cycle_and_replays_afterwards() {
        let (g, [a, b, c, d]) = diamond();
        g.execute_node(a, |_| {}).unwrap();
        assert!(matches!(
            g.reset(),
            Err(GraphError::CycleInProgress { completed: 1, total: 4 })
        ));

        for n in [b, c, d] {
            g.execute_node(n, |_| {}).unwrap();
        }
        g.reset().unwrap();
        assert_eq!(g.completed_count(), 0);
        assert_eq!(g.remaining_dependencies(c), Some(2));
        assert_eq!(g.state_of(a), Some(NodeState::Ready));
        assert_eq!(g.state_of(d), Some(NodeState::NotReady));
    }

    #[test]
    fn exclusive_reset_recovers_an_abandoned_cycle() {
        let (mut g, [a, ..]) = diamond();
        g.mark_dispatched(a).unwrap();
        assert!(g.reset().is_err());
        g.reset_exclusive();
        assert_eq!(g.state_of(a), Some(NodeState::Ready));
    }

    #[test]
    fn claim_blocks_reset_and_second_claim_until_dropped() {
        let (g, [a, b, c, d]) = diamond();
        let g = Arc::new(g);

        let claim = g.claim_cycle().unwrap();
        assert!(g.is_claimed());
        assert!(matches!(
            g.reset(),
            Err(GraphError::CycleInProgress { completed: 0, total: 4 })
        ));
        assert!(g.claim_cycle().is_err());

        for n in [a, b, c, d] {
            claim.graph().execute_node(n, |_| {}).unwrap();
        }
        // A finished cycle still blocks replay while its claim lives.
        assert!(g.reset().is_err());

        drop(claim);
        assert!(!g.is_claimed());
        let again = g.claim_cycle().unwrap();
        assert_eq!(g.completed_count(), 0);
        assert_eq!(g.state_of(a), Some(NodeState::Ready));
        drop(again);
        g.reset().unwrap();
    }

    #[test]
    fn failed_claim_on_a_partial_cycle_is_released() {
        let (g, [a, ..]) = diamond();
        let g = Arc::new(g);
        g.execute_node(a, |_| {}).unwrap();

        assert!(matches!(
            g.claim_cycle(),
            Err(GraphError::CycleInProgress { completed: 1, total: 4 })
        ));
        assert!(!g.is_claimed());
    }

    #[test]
    fn node_cannot_be_dispatched_or_completed_twice() {
        let (g, [a, ..]) = diamond();
        g.mark_dispatched(a).unwrap();
        assert!(matches!(
            g.mark_dispatched(a),
            Err(GraphError::InvalidTransition { actual: NodeState::Dispatched, .. })
        ));
        g.on_task_complete(a, |_| {}).unwrap();
        assert!(matches!(
            g.on_task_complete(a, |_| {}),
            Err(GraphError::InvalidTransition { actual: NodeState::Completed, .. })
        ));
    }

    #[test]
    fn not_ready_node_cannot_be_dispatched() {
        let (g, [_, _, c, _]) = diamond();
        assert!(matches!(
            g.mark_dispatched(c),
            Err(GraphError::InvalidTransition { actual: NodeState::NotReady, .. })
        ));
    }

    #[test]
    fn edges_cannot_be_added_mid_cycle() {
        let (mut g, [a, b, ..]) = diamond();
        g.mark_dispatched(a).unwrap();
        assert!(matches!(
            g.add_dependency(b, a),
            Err(GraphError::CycleInProgress { .. })
        ));
    }
}
