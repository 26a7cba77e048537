//! Pipeline context: state shared by every worker of one run, and the handles
//! the caller joins once the terminal queue has been drained.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use super::stage::StageSpec;

/// Shared failure state for one pipeline run. Cloned into every worker.
#[derive(Clone, Default)]
pub struct PipelineContext {
    /// First stage failure recorded by any worker (`"stage N: message"`).
    pub first_error: Arc<Mutex<Option<String>>>,
    /// Number of stage invocations that panicked.
    pub failed_invocations: Arc<AtomicUsize>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> usize {
        self.failed_invocations.load(Ordering::Acquire)
    }
}

/// What a stage's producers need to know about the queue they feed:
/// how many workers consume it and how large their input batches are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Downstream {
    pub consumers: usize,
    pub batch_size: usize,
}

impl Downstream {
    /// The caller reading the terminal queue: one consumer, items released one at a time.
    pub const CALLER: Downstream = Downstream {
        consumers: 1,
        batch_size: 1,
    };
}

impl From<StageSpec> for Downstream {
    fn from(spec: StageSpec) -> Self {
        Downstream {
            consumers: spec.workers,
            batch_size: spec.batch_size,
        }
    }
}

/// Accumulated while stages are launched head to tail.
pub struct LaunchState {
    pub ctx: PipelineContext,
    pub queue_capacity: usize,
    pub worker_handles: Vec<JoinHandle<()>>,
}

impl LaunchState {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            ctx: PipelineContext::new(),
            queue_capacity,
            worker_handles: Vec::new(),
        }
    }
}

/// Threads of a running pipeline. `driver_handle` returns the number of input items fed.
pub struct PipelineHandles {
    pub driver_handle: JoinHandle<usize>,
    pub worker_handles: Vec<JoinHandle<()>>,
    pub ctx: PipelineContext,
}

/// Totals reported by [`PipelineRun::finish`](super::PipelineRun::finish).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub items_in: usize,
    pub items_out: usize,
}
