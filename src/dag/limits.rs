// src/dag/limits.rs

//! Static capacities of a compute graph.

use serde::Deserialize;

/// Default maximum number of nodes per graph.
pub const MAX_TASKS: usize = 16;

/// Default maximum number of dependency edges per node.
pub const MAX_DEPS: usize = 4;

/// Hard ceiling imposed by the `u16` node index.
pub const MAX_TASKS_CEILING: usize = u16::MAX as usize;

/// Capacities fixed when a graph is created.
///
/// Both arenas (nodes and per-node dependency lists) are allocated up front
/// with these capacities and never grow past them; going over a limit is a
/// construction-time error rather than a reallocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GraphLimits {
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
    #[serde(default = "default_max_deps")]
    pub max_deps: usize,
}

fn default_max_tasks() -> usize {
    MAX_TASKS
}

fn default_max_deps() -> usize {
    MAX_DEPS
}

impl GraphLimits {
    pub fn new(max_tasks: usize, max_deps: usize) -> Self {
        Self {
            max_tasks: max_tasks.min(MAX_TASKS_CEILING),
            max_deps,
        }
    }
}

impl Default for GraphLimits {
    fn default() -> Self {
        Self::new(MAX_TASKS, MAX_DEPS)
    }
}
