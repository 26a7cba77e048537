//! Stage contract and per-stage pool settings.

/// One transformation step. Invoked by any worker of its pool, in any order,
/// once per input batch; may emit zero or more items.
///
/// Closures `Fn(Vec<I>) -> impl IntoIterator<Item = O>` implement this
/// directly, so configuration is captured by the closure rather than passed
/// as extra arguments.
pub trait Stage<I, O>: Send + Sync + 'static {
    fn process(&self, batch: Vec<I>) -> impl IntoIterator<Item = O>;
}

impl<I, O, F, R> Stage<I, O> for F
where
    F: Fn(Vec<I>) -> R + Send + Sync + 'static,
    R: IntoIterator<Item = O>,
{
    fn process(&self, batch: Vec<I>) -> impl IntoIterator<Item = O> {
        self(batch)
    }
}

/// Worker count and input batch size for one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageSpec {
    pub workers: usize,
    pub batch_size: usize,
}

impl StageSpec {
    pub fn new(workers: usize, batch_size: usize) -> Self {
        Self {
            workers: workers.max(1),
            batch_size: batch_size.max(1),
        }
    }

    /// `workers` threads, one item per invocation.
    pub fn workers(workers: usize) -> Self {
        Self::new(workers, 1)
    }

    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self::new(self.workers, batch_size)
    }
}

impl Default for StageSpec {
    fn default() -> Self {
        Self::new(rayon::current_num_threads(), 1)
    }
}
