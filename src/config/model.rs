// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::GraphLimits;
use crate::exec::DispatchOptions;
use crate::types::{FullQueueBehaviour, PanicPolicy, Workload};

/// Configuration exactly as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// cores = 4
/// queue_depth = 10
/// tick_ms = 100
/// full_queue_behaviour = "defer"
///
/// [limits]
/// max_tasks = 16
/// max_deps = 4
///
/// [task.A]
/// work_us = 200
///
/// [task.B]
/// work_us = 50
/// after = ["A"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Dispatcher and producer settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Graph capacities from `[limits]`.
    #[serde(default)]
    pub limits: GraphLimits,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders can rely on the graph being acyclic and within its limits.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub limits: GraphLimits,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        limits: GraphLimits,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            limits,
            task,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Number of worker threads, one per core.
    ///
    /// Defaults to the number of cores the process may run on.
    #[serde(default = "default_cores")]
    pub cores: usize,

    /// Descriptor slots per core.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Interval between producer dispatch rounds, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Pin each worker to its core. Disable on hosts where affinity is not
    /// available (containers with restricted cpusets, some CI runners).
    #[serde(default = "default_pin_workers")]
    pub pin_workers: bool,

    /// `"drop"` or `"defer"`.
    #[serde(default)]
    pub full_queue_behaviour: FullQueueBehaviour,

    /// `"continue"` or `"abort"`.
    #[serde(default)]
    pub panic_policy: PanicPolicy,

    /// `"graph"` or `"synthetic"`.
    #[serde(default)]
    pub workload: Workload,

    /// How many times the graph is reset and replayed.
    #[serde(default = "default_cycles")]
    pub cycles: u64,

    /// Optional worker stack size in KiB; the platform default otherwise.
    #[serde(default)]
    pub worker_stack_kib: Option<usize>,
}

fn default_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_queue_depth() -> usize {
    10
}

fn default_tick_ms() -> u64 {
    100
}

fn default_pin_workers() -> bool {
    true
}

fn default_cycles() -> u64 {
    1
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            cores: default_cores(),
            queue_depth: default_queue_depth(),
            tick_ms: default_tick_ms(),
            pin_workers: default_pin_workers(),
            full_queue_behaviour: FullQueueBehaviour::default(),
            panic_policy: PanicPolicy::default(),
            workload: Workload::default(),
            cycles: default_cycles(),
            worker_stack_kib: None,
        }
    }
}

impl ConfigSection {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// `worker_stack_kib` in bytes; `None` when unset or too large for
    /// `usize` (validation rejects the latter).
    pub fn worker_stack_bytes(&self) -> Option<usize> {
        self.worker_stack_kib.and_then(|kib| kib.checked_mul(1024))
    }

    /// Worker-pool options derived from this section.
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            core_count: self.cores,
            queue_depth: self.queue_depth,
            pin_workers: self.pin_workers,
            stack_size: self.worker_stack_bytes(),
            panic_policy: self.panic_policy,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    /// Busy work performed by the task, in microseconds.
    #[serde(default)]
    pub work_us: u64,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,
}
