// src/dag/error.rs

use std::fmt;

use thiserror::Error;

use super::node::{NodeIndex, NodeState};

/// Which static capacity a construction call ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// `max_tasks` nodes already exist.
    Tasks { limit: usize },
    /// The node already has `max_deps` dependency edges.
    Dependencies { node: NodeIndex, limit: usize },
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Tasks { limit } => write!(f, "graph already holds {limit} nodes"),
            Capacity::Dependencies { node, limit } => {
                write!(f, "node {node} already has {limit} dependencies")
            }
        }
    }
}

/// Errors raised by graph construction and cycle bookkeeping.
///
/// Construction errors leave the graph exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(Capacity),

    #[error("node {0} does not exist in this graph")]
    UnknownNode(NodeIndex),

    #[error("node {0} cannot depend on itself")]
    SelfDependency(NodeIndex),

    #[error("node {node} already depends on {dependency}")]
    DuplicateDependency {
        node: NodeIndex,
        dependency: NodeIndex,
    },

    #[error("making {node} depend on {dependency} would create a dependency cycle")]
    WouldCreateCycle {
        node: NodeIndex,
        dependency: NodeIndex,
    },

    #[error("schedule cycle in progress ({completed}/{total} nodes completed)")]
    CycleInProgress { completed: usize, total: usize },

    #[error("node {node} cannot move to {to:?} from {actual:?}")]
    InvalidTransition {
        node: NodeIndex,
        actual: NodeState,
        to: NodeState,
    },
}
