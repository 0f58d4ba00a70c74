use std::str::FromStr;
use serde::Deserialize;

/// What the producer does with a descriptor whose target queue is full.
///
/// - `Drop`: try the round-robin target core only; if its queue is full the
///   descriptor is dropped and a warning is logged. The producer never waits.
/// - `Defer`: try every core once, starting from the round-robin cursor; if
///   all of them are full, keep the descriptor at the head of the backlog and
///   retry on the next tick. The producer still never waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FullQueueBehaviour {
    Drop,
    Defer,
}

impl Default for FullQueueBehaviour {
    fn default() -> Self {
        FullQueueBehaviour::Defer
    }
}

impl FromStr for FullQueueBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(FullQueueBehaviour::Drop),
            "defer" => Ok(FullQueueBehaviour::Defer),
            other => Err(format!(
                "invalid full_queue_behaviour: {other} (expected \"drop\" or \"defer\")"
            )),
        }
    }
}

/// What a worker does when a handler panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanicPolicy {
    /// Log the panic, count it, and keep the worker loop running.
    Continue,
    /// Log the panic and abort the whole process.
    Abort,
}

impl Default for PanicPolicy {
    fn default() -> Self {
        PanicPolicy::Continue
    }
}

impl FromStr for PanicPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(PanicPolicy::Continue),
            "abort" => Ok(PanicPolicy::Abort),
            other => Err(format!(
                "invalid panic_policy: {other} (expected \"continue\" or \"abort\")"
            )),
        }
    }
}

/// Which work the producer feeds into the per-core queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    /// Nodes of the configured compute graph, as they become ready.
    Graph,
    /// One synthetic descriptor per core on every tick.
    Synthetic,
}

impl Default for Workload {
    fn default() -> Self {
        Workload::Graph
    }
}
