// tests/loom.rs
//
// Model-checked readiness protocol. Run with:
//   cargo test --features loom --test loom --release

#![cfg(feature = "loom")]

use loom::sync::Arc;
use loom::sync::atomic::{AtomicUsize, Ordering};
use loom::thread;

use smpdag::dag::{ComputeGraph, NodeIndex, NodeState};

/// A and B are roots, D waits for both.
fn fan_in(
    a_body: impl Fn() + Send + Sync + 'static,
    b_body: impl Fn() + Send + Sync + 'static,
) -> (Arc<ComputeGraph>, [NodeIndex; 3]) {
    let mut graph = ComputeGraph::new();
    let a = graph.init_node_fn("A", a_body).unwrap();
    let b = graph.init_node_fn("B", b_body).unwrap();
    let d = graph.init_node_fn("D", || {}).unwrap();
    graph.add_dependency(d, a).unwrap();
    graph.add_dependency(d, b).unwrap();
    (Arc::new(graph), [a, b, d])
}

#[test]
fn concurrent_completions_release_the_dependent_exactly_once() {
    loom::model(|| {
        let (graph, [a, b, d]) = fan_in(|| {}, || {});
        graph.mark_dispatched(a).unwrap();
        graph.mark_dispatched(b).unwrap();

        let other = Arc::clone(&graph);
        let t = thread::spawn(move || other.on_task_complete(a, |_| {}).unwrap().newly_ready);
        let here = graph.on_task_complete(b, |_| {}).unwrap().newly_ready;
        let there = t.join().unwrap();

        assert_eq!(here + there, 1);
        assert_eq!(graph.state_of(d), Some(NodeState::Ready));
        assert_eq!(graph.remaining_dependencies(d), Some(0));
        assert_eq!(graph.completed_count(), 2);
    });
}

#[test]
fn writes_of_both_bodies_are_visible_to_whoever_releases_the_dependent() {
    loom::model(|| {
        let a_out = Arc::new(AtomicUsize::new(0));
        let b_out = Arc::new(AtomicUsize::new(0));
        let (graph, [a, b, _d]) = {
            let a_out = Arc::clone(&a_out);
            let b_out = Arc::clone(&b_out);
            fan_in(
                move || a_out.store(1, Ordering::Relaxed),
                move || b_out.store(2, Ordering::Relaxed),
            )
        };

        let check = {
            let a_out = Arc::clone(&a_out);
            let b_out = Arc::clone(&b_out);
            move |_: NodeIndex| {
                assert_eq!(a_out.load(Ordering::Relaxed), 1);
                assert_eq!(b_out.load(Ordering::Relaxed), 2);
            }
        };

        let other = Arc::clone(&graph);
        let other_check = check.clone();
        let t = thread::spawn(move || {
            other.execute_node(a, other_check).unwrap();
        });
        graph.execute_node(b, check).unwrap();
        t.join().unwrap();
    });
}
