// tests/dag_fan_in.rs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use smpdag::dag::{ComputeGraph, GraphLimits, NodeIndex, NodeState};
use smpdag_test_utils::builders::GraphFixture;
use smpdag_test_utils::init_tracing;

/// Complete every node in `nodes` from its own thread, all released at
/// once. Returns the dependents each thread saw become ready.
fn complete_concurrently(graph: &ComputeGraph, nodes: &[NodeIndex]) -> Vec<NodeIndex> {
    let barrier = Barrier::new(nodes.len());
    let ready = Mutex::new(Vec::new());
    thread::scope(|s| {
        for &node in nodes {
            let barrier = &barrier;
            let ready = &ready;
            s.spawn(move || {
                graph.mark_dispatched(node).unwrap();
                barrier.wait();
                graph
                    .on_task_complete(node, |d| ready.lock().unwrap().push(d))
                    .unwrap();
            });
        }
    });
    ready.into_inner().unwrap()
}

#[test]
fn fan_in_of_three_releases_dependent_exactly_once() {
    init_tracing();
    let none: &[&str] = &[];
    let fx = GraphFixture::build(
        GraphLimits::default(),
        &[("A", none), ("B", none), ("C", none), ("D", &["A", "B", "C"][..])],
    );
    let (a, b, c, d) = (fx.node("A"), fx.node("B"), fx.node("C"), fx.node("D"));

    for _ in 0..200 {
        fx.graph.reset().unwrap();
        let ready = complete_concurrently(&fx.graph, &[a, b, c]);
        assert_eq!(ready, vec![d]);
        fx.graph.execute_node(d, |_| {}).unwrap();
        assert!(fx.graph.is_cycle_complete());
    }
    assert_eq!(fx.count("D"), 200);
}

#[test]
fn concurrent_completion_of_a_and_b_runs_c_once_per_trial() {
    init_tracing();
    let fx = GraphFixture::diamond();
    let (a, b, c, d) = (fx.node("A"), fx.node("B"), fx.node("C"), fx.node("D"));

    for trial in 0..1000 {
        fx.graph.reset().unwrap();
        let ready = complete_concurrently(&fx.graph, &[a, b]);
        assert_eq!(ready, vec![c], "trial {trial}");

        for node in ready {
            fx.graph.execute_node(node, |_| {}).unwrap();
        }
        fx.graph.execute_node(d, |_| {}).unwrap();
    }

    assert_eq!(fx.count("C"), 1000);
    assert_eq!(fx.count("D"), 1000);
}

#[test]
fn remaining_counter_only_decreases_and_ready_implies_all_dependencies_done() {
    init_tracing();
    let none: &[&str] = &[];
    let fx = GraphFixture::build(
        GraphLimits::default(),
        &[("A", none), ("B", none), ("C", none), ("D", &["A", "B", "C"][..])],
    );
    let preds = [fx.node("A"), fx.node("B"), fx.node("C")];
    let d = fx.node("D");

    for _ in 0..100 {
        fx.graph.reset().unwrap();
        let done = AtomicBool::new(false);
        let observed = thread::scope(|s| {
            let watcher = s.spawn(|| {
                let mut seen = Vec::new();
                while !done.load(Ordering::Acquire) {
                    let remaining = fx.graph.remaining_dependencies(d).unwrap();
                    if fx.graph.state_of(d) == Some(NodeState::Ready) {
                        for p in preds {
                            assert_eq!(fx.graph.state_of(p), Some(NodeState::Completed));
                        }
                    }
                    seen.push(remaining);
                }
                seen
            });
            complete_concurrently(&fx.graph, &preds);
            done.store(true, Ordering::Release);
            watcher.join().unwrap()
        });

        assert!(observed.windows(2).all(|w| w[0] >= w[1]), "{observed:?}");
        assert!(observed.iter().all(|&r| r <= 3));
        assert_eq!(fx.graph.remaining_dependencies(d), Some(0));
        fx.graph.execute_node(d, |_| {}).unwrap();
    }
}

#[test]
fn replaying_the_graph_runs_every_node_once_per_cycle() {
    init_tracing();
    let fx = GraphFixture::wide_diamond(6);
    let cycles = 25;

    for _ in 0..cycles {
        fx.graph.reset().unwrap();
        let mut ready: Vec<NodeIndex> = fx.graph.ready_nodes().collect();
        let hits = AtomicUsize::new(0);
        while let Some(node) = ready.pop() {
            fx.graph
                .execute_node(node, |d| {
                    hits.fetch_add(1, Ordering::Relaxed);
                    ready.push(d);
                })
                .unwrap();
        }
        assert!(fx.graph.is_cycle_complete());
        // Everything except the source became ready through a completion.
        assert_eq!(hits.load(Ordering::Relaxed), fx.graph.node_count() - 1);
    }

    for node in fx.graph.nodes() {
        assert_eq!(fx.invocations.count(node), cycles);
    }
}

#[test]
fn graph_is_shareable_across_threads_behind_an_arc() {
    init_tracing();
    let fx = GraphFixture::diamond();
    let graph = Arc::new(fx.graph);
    graph.reset().unwrap();

    let handles: Vec<_> = ["A", "B"]
        .into_iter()
        .map(|label| {
            let graph = Arc::clone(&graph);
            thread::spawn(move || {
                let node = graph.index_of(label).unwrap();
                graph.execute_node(node, |_| {}).unwrap().newly_ready
            })
        })
        .collect();
    let released: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(released, 1);
    assert_eq!(graph.state_of(graph.index_of("C").unwrap()), Some(NodeState::Ready));
}
