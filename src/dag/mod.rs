// src/dag/mod.rs

//! DAG engine.
//!
//! - [`graph`] holds the fixed-capacity compute graph and its atomic
//!   readiness protocol (dependency counters, reset, completion).
//! - [`node`] defines node indices, task bodies and per-cycle node states.
//! - [`limits`] holds the static capacities (`MAX_TASKS`, `MAX_DEPS`).
//! - [`error`] lists construction and bookkeeping errors.

pub mod error;
pub mod graph;
pub mod limits;
pub mod node;

pub use error::{Capacity, GraphError};
pub use graph::{CompletionStep, ComputeGraph, CycleClaim};
pub use limits::{GraphLimits, MAX_DEPS, MAX_TASKS};
pub use node::{NodeIndex, NodeState, TaskBody};
