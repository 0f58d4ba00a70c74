// tests/dispatcher_queues.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use smpdag::exec::{
    DispatchError, DispatchOptions, DispatcherRuntime, PushError, TaskDescriptor, affinity,
};
use smpdag_test_utils::{init_tracing, wait_until};

/// A gate handlers can block on until the test opens it.
#[derive(Default)]
struct Latch {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Latch {
    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

fn unpinned(cores: usize, depth: usize) -> DispatcherRuntime {
    DispatcherRuntime::start_with(DispatchOptions::new(cores, depth).pin_workers(false))
        .expect("dispatcher starts")
}

#[test]
fn third_push_to_a_depth_two_queue_reports_full_and_order_is_kept() {
    init_tracing();
    let rt = unpinned(4, 2);
    let latch = Arc::new(Latch::default());
    let order = Arc::new(Mutex::new(Vec::new()));

    let tagged = |tag: usize| {
        let latch = Arc::clone(&latch);
        let order = Arc::clone(&order);
        TaskDescriptor::from_fn(move || {
            latch.wait();
            order.lock().unwrap().push(tag);
        })
    };

    let results: Vec<_> = (1..=3).map(|tag| rt.try_push(0, tagged(tag))).collect();
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(matches!(results[2], Err(PushError::Full(_))));
    assert_eq!(rt.outstanding(0), 2);

    latch.open();
    wait_until("core 0 to drain", || rt.executed(0) == 2 && rt.outstanding(0) == 0);

    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    for core in 1..4 {
        assert_eq!(rt.executed(core), 0);
    }
    rt.shutdown();
}

#[test]
fn descriptors_on_one_core_run_in_push_order() {
    init_tracing();
    let rt = unpinned(2, 8);
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in 0..8 {
        let order = Arc::clone(&order);
        // A full queue here only means the worker is behind; retry.
        let mut descriptor = TaskDescriptor::from_fn(move || order.lock().unwrap().push(tag));
        loop {
            match rt.try_push(1, descriptor) {
                Ok(_) => break,
                Err(PushError::Full(back)) => {
                    descriptor = back;
                    thread::yield_now();
                }
                Err(err) => panic!("unexpected push error: {err}"),
            }
        }
    }

    wait_until("core 1 to drain", || rt.executed(1) == 8);
    assert_eq!(*order.lock().unwrap(), (0..8).collect::<Vec<_>>());
}

#[test]
fn panicking_handler_is_contained_and_the_worker_keeps_going() {
    init_tracing();
    let rt = unpinned(1, 4);
    let ran = Arc::new(AtomicUsize::new(0));

    rt.try_push(0, TaskDescriptor::from_fn(|| panic!("handler blew up")))
        .unwrap();
    let after = Arc::clone(&ran);
    rt.try_push(
        0,
        TaskDescriptor::from_fn(move || {
            after.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();

    wait_until("both handlers", || rt.executed(0) == 2);
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(rt.faults(), 1);
}

#[test]
fn shutdown_drains_queued_work_then_rejects_pushes() {
    init_tracing();
    let rt = unpinned(2, 4);
    let ran = Arc::new(AtomicUsize::new(0));
    for core in 0..2 {
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            rt.try_push(
                core,
                TaskDescriptor::from_fn(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        }
    }

    rt.shutdown();
    assert_eq!(ran.load(Ordering::SeqCst), 6);
    assert!(matches!(
        rt.try_push(0, TaskDescriptor::from_fn(|| {})),
        Err(PushError::Closed)
    ));
}

#[test]
fn pinned_workers_start_when_enough_cores_exist() {
    init_tracing();
    let Ok(cores) = affinity::available_cores() else {
        return;
    };
    let count = cores.len().min(4);
    let rt = DispatcherRuntime::start(count, 2).expect("pinned dispatcher starts");
    let ran = Arc::new(AtomicUsize::new(0));
    for core in 0..count {
        let ran = Arc::clone(&ran);
        rt.try_push(
            core,
            TaskDescriptor::from_fn(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();
    }
    wait_until("every pinned worker", || ran.load(Ordering::SeqCst) == count);
}

#[cfg(target_os = "linux")]
#[test]
fn refused_pin_fails_start_and_stops_the_other_workers() {
    use core_affinity::CoreId;

    init_tracing();
    let Ok(cores) = affinity::available_cores() else {
        return;
    };
    // Well inside the kernel's CPU mask, but not a CPU of this machine.
    let missing = CoreId { id: 1023 };
    if cores.iter().any(|c| c.id == missing.id) {
        return;
    }

    let err = DispatcherRuntime::start_on(&[cores[0], missing], DispatchOptions::new(2, 2))
        .unwrap_err();
    assert!(matches!(err, DispatchError::PinFailed { core: 1 }), "{err}");
}
