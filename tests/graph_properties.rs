// tests/graph_properties.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use proptest::prelude::*;
use smpdag::dag::{ComputeGraph, NodeIndex};

/// What every node body writes to.
struct Recorder {
    counts: Vec<AtomicUsize>,
    order: Mutex<Vec<usize>>,
}

impl Recorder {
    fn new(nodes: usize) -> Self {
        Self {
            counts: (0..nodes).map(|_| AtomicUsize::new(0)).collect(),
            order: Mutex::new(Vec::new()),
        }
    }

    fn hit(&self, index: usize) {
        self.counts[index].fetch_add(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(index);
    }

    fn take_order(&self) -> Vec<usize> {
        std::mem::take(&mut *self.order.lock().unwrap())
    }
}

// Acyclic by construction: node `i` may only depend on nodes `0..i`.
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=16usize)
        .prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..=4), n)
        })
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, candidates)| {
                    if i == 0 {
                        return Vec::new();
                    }
                    let mut deps: Vec<usize> = candidates.into_iter().map(|c| c % i).collect();
                    deps.sort_unstable();
                    deps.dedup();
                    deps
                })
                .collect()
        })
}

fn build(deps: &[Vec<usize>]) -> (ComputeGraph, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::new(deps.len()));
    let mut graph = ComputeGraph::new();
    for i in 0..deps.len() {
        graph
            .init_labeled_node(format!("t{i}"), move |r: &Recorder| r.hit(i), Arc::clone(&recorder))
            .unwrap();
    }
    let nodes: Vec<NodeIndex> = graph.nodes().collect();
    for (i, list) in deps.iter().enumerate() {
        for &d in list {
            graph.add_dependency(nodes[i], nodes[d]).unwrap();
        }
    }
    (graph, recorder)
}

fn run_sequentially(graph: &ComputeGraph) {
    let mut ready: Vec<NodeIndex> = graph.ready_nodes().collect();
    while let Some(node) = ready.pop() {
        graph.execute_node(node, |d| ready.push(d)).unwrap();
    }
}

/// A tiny work-sharing pool: `threads` threads pull ready nodes from one
/// shared list until the cycle is complete.
fn run_concurrently(graph: &ComputeGraph, threads: usize) {
    let ready = Mutex::new(graph.ready_nodes().collect::<Vec<_>>());
    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                while !graph.is_cycle_complete() {
                    let next = ready.lock().unwrap().pop();
                    match next {
                        Some(node) => {
                            graph
                                .execute_node(node, |d| ready.lock().unwrap().push(d))
                                .unwrap();
                        }
                        None => thread::yield_now(),
                    }
                }
            });
        }
    });
}

fn dependencies_ran_first(deps: &[Vec<usize>], order: &[usize]) -> bool {
    let mut position = vec![usize::MAX; deps.len()];
    for (pos, &node) in order.iter().enumerate() {
        position[node] = pos;
    }
    deps.iter()
        .enumerate()
        .all(|(i, list)| list.iter().all(|&d| position[d] < position[i]))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_node_runs_once_per_cycle_after_its_dependencies(
        deps in dag_strategy(),
        cycles in 1..4usize,
    ) {
        let (graph, recorder) = build(&deps);

        for cycle in 1..=cycles {
            graph.reset().unwrap();
            run_sequentially(&graph);
            prop_assert!(graph.is_cycle_complete());

            let order = recorder.take_order();
            prop_assert_eq!(order.len(), deps.len());
            prop_assert!(dependencies_ran_first(&deps, &order), "order {:?}", order);
            for count in &recorder.counts {
                prop_assert_eq!(count.load(Ordering::SeqCst), cycle);
            }
        }

        for node in graph.nodes() {
            prop_assert_eq!(graph.remaining_dependencies(node), Some(0));
            prop_assert_eq!(
                graph.total_dependencies(node).map(usize::from),
                Some(deps[node.index()].len())
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_cycles_keep_exactly_once_and_ordering(
        deps in dag_strategy(),
        threads in 2..5usize,
    ) {
        let (graph, recorder) = build(&deps);

        for cycle in 1..=3 {
            graph.reset().unwrap();
            run_concurrently(&graph, threads);

            let order = recorder.take_order();
            prop_assert_eq!(order.len(), deps.len());
            prop_assert!(dependencies_ran_first(&deps, &order), "order {:?}", order);
            for count in &recorder.counts {
                prop_assert_eq!(count.load(Ordering::SeqCst), cycle);
            }
        }
    }
}
