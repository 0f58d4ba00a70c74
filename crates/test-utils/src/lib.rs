//! Shared helpers for the smpdag test suites.

pub mod builders;
pub mod fake_backend;

use std::future::Future;
use std::sync::Once;
use std::thread;
use std::time::{Duration, Instant};

use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for anything a test waits on.
pub const TEST_DEADLINE: Duration = Duration::from_secs(10);

static INIT: Once = Once::new();

/// Install a test subscriber once per test binary.
///
/// Output goes through the test writer, so it only shows up for failing
/// tests (or with `--nocapture`). Worker threads are named, which makes the
/// per-core lines easy to tell apart:
/// `RUST_LOG=smpdag::exec=trace cargo test --test dispatcher_queues`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// Await `f`, failing the test after [`TEST_DEADLINE`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_DEADLINE, f)
        .await
        .unwrap_or_else(|_| panic!("test timed out after {TEST_DEADLINE:?}"))
}

/// Poll `done` from a plain thread until it holds.
pub fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + TEST_DEADLINE;
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Async flavour of [`wait_until`], for checks inside `#[tokio::test]`.
pub async fn eventually(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + TEST_DEADLINE;
    while !done() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
