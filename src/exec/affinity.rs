// src/exec/affinity.rs

//! Core discovery and thread pinning.

use core_affinity::CoreId;
use tracing::{debug, error};

use super::runtime::DispatchError;

/// Logical cores this process may run on.
pub fn available_cores() -> Result<Vec<CoreId>, DispatchError> {
    core_affinity::get_core_ids()
        .filter(|ids| !ids.is_empty())
        .ok_or(DispatchError::AffinityUnavailable)
}

/// The first `count` available cores, one per worker.
///
/// Asking for more workers than there are cores is a configuration error;
/// two pinned workers would otherwise share a core.
pub fn resolve_cores(count: usize) -> Result<Vec<CoreId>, DispatchError> {
    let ids = available_cores()?;
    if count > ids.len() {
        return Err(DispatchError::CoreOutOfRange {
            requested: count,
            available: ids.len(),
        });
    }
    Ok(ids.into_iter().take(count).collect())
}

/// Pin the calling thread to `core`. Returns whether the OS accepted it.
///
/// A refused pin is fatal for the dispatcher; the caller reports it instead
/// of running the worker unpinned.
pub fn pin_current_thread(worker: usize, core: CoreId) -> bool {
    let pinned = core_affinity::set_for_current(core);
    if pinned {
        debug!(core = worker, cpu = core.id, "worker pinned");
    } else {
        error!(core = worker, cpu = core.id, "failed to pin worker");
    }
    pinned
}
