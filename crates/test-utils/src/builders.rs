use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use smpdag::config::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use smpdag::dag::{ComputeGraph, GraphLimits, NodeIndex};
use smpdag::types::{FullQueueBehaviour, Workload};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                limits: GraphLimits::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn cores(mut self, cores: usize) -> Self {
        self.config.config.cores = cores;
        self
    }

    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.config.config.queue_depth = depth;
        self
    }

    pub fn limits(mut self, max_tasks: usize, max_deps: usize) -> Self {
        self.config.limits = GraphLimits::new(max_tasks, max_deps);
        self
    }

    pub fn workload(mut self, workload: Workload) -> Self {
        self.config.config.workload = workload;
        self
    }

    pub fn full_queue_behaviour(mut self, behaviour: FullQueueBehaviour) -> Self {
        self.config.config.full_queue_behaviour = behaviour;
        self
    }

    /// The unvalidated file, for tests that exercise validation itself.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn work_us(mut self, us: u64) -> Self {
        self.task.work_us = us;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

impl Default for TaskConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-node invocation counters shared with every node body of a
/// [`GraphFixture`].
#[derive(Debug, Default)]
pub struct Invocations {
    counts: Vec<AtomicUsize>,
    order: Mutex<Vec<String>>,
}

impl Invocations {
    fn hit(&self, index: usize, label: &str) {
        self.counts[index].fetch_add(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(label.to_string());
    }

    pub fn count(&self, node: NodeIndex) -> usize {
        self.counts[node.index()].load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    /// Labels in the order their bodies ran.
    pub fn order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        for c in &self.counts {
            c.store(0, Ordering::SeqCst);
        }
        self.order.lock().unwrap().clear();
    }
}

/// A compute graph whose nodes only count their own invocations.
pub struct GraphFixture {
    pub graph: ComputeGraph,
    pub invocations: Arc<Invocations>,
}

impl GraphFixture {
    /// Build from `(label, dependencies)` pairs; dependencies must be
    /// listed before their dependents.
    pub fn build(limits: GraphLimits, nodes: &[(&str, &[&str])]) -> Self {
        let invocations = Arc::new(Invocations {
            counts: (0..nodes.len()).map(|_| AtomicUsize::new(0)).collect(),
            order: Mutex::new(Vec::new()),
        });
        let mut graph = ComputeGraph::with_limits(limits);

        for (i, (label, _)) in nodes.iter().enumerate() {
            let name = label.to_string();
            graph
                .init_labeled_node(
                    *label,
                    move |inv: &Invocations| inv.hit(i, &name),
                    Arc::clone(&invocations),
                )
                .expect("node within capacity");
        }
        for (label, deps) in nodes {
            let node = graph.index_of(label).expect("node exists");
            for dep in deps.iter() {
                let dependency = graph.index_of(dep).expect("dependency exists");
                graph.add_dependency(node, dependency).expect("valid edge");
            }
        }

        Self { graph, invocations }
    }

    /// A and B are roots, C waits for both, D waits for C.
    pub fn diamond() -> Self {
        let none: &[&str] = &[];
        Self::build(
            GraphLimits::default(),
            &[
                ("A", none),
                ("B", none),
                ("C", &["A", "B"][..]),
                ("D", &["C"][..]),
            ],
        )
    }

    /// One source, `width` middle nodes after it, one sink after all of
    /// them.
    pub fn wide_diamond(width: usize) -> Self {
        let middle: Vec<String> = (0..width).map(|i| format!("M{i}")).collect();
        let middle_refs: Vec<&str> = middle.iter().map(String::as_str).collect();

        let none: &[&str] = &[];
        let source: &[&str] = &["source"];
        let mut nodes: Vec<(&str, &[&str])> = vec![("source", none)];
        for m in &middle_refs {
            nodes.push((*m, source));
        }
        nodes.push(("sink", middle_refs.as_slice()));

        Self::build(GraphLimits::new(width + 2, width.max(1)), &nodes)
    }

    pub fn node(&self, label: &str) -> NodeIndex {
        self.graph.index_of(label).expect("unknown label")
    }

    pub fn count(&self, label: &str) -> usize {
        self.invocations.count(self.node(label))
    }
}
