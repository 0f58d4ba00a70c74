use std::collections::VecDeque;
use std::sync::Mutex;

use smpdag::exec::{DispatchBackend, PushError, TaskDescriptor};

/// A fake dispatch backend that:
/// - records which descriptors were pushed, and to which core
/// - enforces a per-core capacity like the real queues
/// - optionally runs every descriptor inline, on the pushing thread, so a
///   producer can drive a whole graph cycle without worker threads.
pub struct RecordingBackend {
    capacity: usize,
    inline: bool,
    state: Mutex<State>,
}

struct State {
    queued: Vec<VecDeque<TaskDescriptor>>,
    log: Vec<(usize, String)>,
    rejected: usize,
}

impl RecordingBackend {
    /// `cores` queues of `capacity` slots that are only drained by
    /// [`run_queued`](Self::run_queued).
    pub fn new(cores: usize, capacity: usize) -> Self {
        Self {
            capacity,
            inline: false,
            state: Mutex::new(State {
                queued: (0..cores).map(|_| VecDeque::new()).collect(),
                log: Vec::new(),
                rejected: 0,
            }),
        }
    }

    /// Runs each accepted descriptor immediately; queues never fill.
    pub fn inline(cores: usize) -> Self {
        Self {
            inline: true,
            ..Self::new(cores, usize::MAX)
        }
    }

    /// `(core, label)` for every accepted push, in push order.
    pub fn log(&self) -> Vec<(usize, String)> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.log().into_iter().map(|(_, label)| label).collect()
    }

    pub fn queued(&self, core: usize) -> usize {
        self.state.lock().unwrap().queued[core].len()
    }

    /// Pushes refused because the target core was full.
    pub fn rejected(&self) -> usize {
        self.state.lock().unwrap().rejected
    }

    /// Run everything queued on `core` in FIFO order; returns how many ran.
    pub fn run_queued(&self, core: usize) -> usize {
        let drained: Vec<_> = self.state.lock().unwrap().queued[core].drain(..).collect();
        for descriptor in &drained {
            descriptor.run_inline();
        }
        drained.len()
    }
}

impl DispatchBackend for RecordingBackend {
    fn core_count(&self) -> usize {
        self.state.lock().unwrap().queued.len()
    }

    fn try_push(&self, core: usize, descriptor: TaskDescriptor) -> Result<(), PushError> {
        {
            let mut state = self.state.lock().unwrap();
            let State {
                queued,
                log,
                rejected,
            } = &mut *state;
            let queue = queued.get_mut(core).ok_or(PushError::UnknownCore(core))?;
            if queue.len() >= self.capacity {
                *rejected += 1;
                return Err(PushError::Full(descriptor));
            }
            log.push((core, descriptor.label().to_string()));
            if !self.inline {
                queue.push_back(descriptor);
                return Ok(());
            }
        }
        // Outside the lock, so a body may inspect the backend.
        descriptor.run_inline();
        Ok(())
    }
}
