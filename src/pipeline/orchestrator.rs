use anyhow::Result;
use log::debug;

use crate::pipeline::context::{
    Downstream, LaunchState, PipelineContext, PipelineHandles, PipelineSummary,
};
use crate::pipeline::driver::spawn_driver_thread;
use crate::pipeline::error_handler::check_for_stage_failures;
use crate::pipeline::queue::{QueueReceiver, StageQueue};
use crate::pipeline::stage::{Stage, StageSpec};
use crate::pipeline::task::Task;
use crate::pipeline::workers::spawn_stage_workers;
use crate::utils::config::DEFAULT_QUEUE_CAPACITY;

/// Launches every stage up to this point, given queue 0's receiver and the
/// queue's downstream consumers; returns the receiver of the last queue.
type Launch<In, Out> = Box<
    dyn FnOnce(QueueReceiver<Vec<In>>, Downstream, &mut LaunchState) -> QueueReceiver<Vec<Out>>
        + Send,
>;

/// A staged pipeline from `In` items to `Out` items.
///
/// Built with [`Pipeline::new`] and one [`Pipeline::stage`] call per step;
/// nothing runs until [`Pipeline::run`]. Queue *i* sits between stage *i-1*
/// and stage *i*: its producers are stage *i-1*'s workers (the driving loop for
/// queue 0) and its consumers are stage *i*'s workers (the caller for the last one).
pub struct Pipeline<In, Out> {
    launch: Launch<In, Out>,
    specs: Vec<StageSpec>,
    queue_capacity: usize,
}

impl<T: Send + 'static> Pipeline<T, T> {
    /// Empty pipeline: input goes straight to the caller.
    pub fn new() -> Self {
        Self {
            launch: Box::new(|rx, _, _| rx),
            specs: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl<T: Send + 'static> Default for Pipeline<T, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In, Out> Pipeline<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Capacity of every stage queue (in batches). Put blocks once it is reached.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Append a stage run by `spec.workers` threads on batches of `spec.batch_size` items.
    pub fn stage<Next, S>(self, stage: S, spec: StageSpec) -> Pipeline<In, Next>
    where
        Next: Send + 'static,
        S: Stage<Out, Next>,
    {
        let Pipeline {
            launch: upstream,
            mut specs,
            queue_capacity,
        } = self;
        let index = specs.len();
        specs.push(spec);

        let launch: Launch<In, Next> = Box::new(move |rx0, downstream, state| {
            let input = upstream(rx0, Downstream::from(spec), state);
            let queue = StageQueue::new(spec.workers, downstream.consumers, state.queue_capacity);
            let (tx, rx) = queue.split();
            let handles =
                spawn_stage_workers(index, stage, spec.workers, input, tx, downstream, &state.ctx);
            state.worker_handles.extend(handles);
            rx
        });

        Pipeline {
            launch,
            specs,
            queue_capacity,
        }
    }

    /// Start all worker pools and the driving loop; returns the lazy terminal output.
    pub fn run<I>(self, input: I) -> PipelineRun<Out>
    where
        I: IntoIterator<Item = In>,
        I::IntoIter: Send + 'static,
    {
        let head = self
            .specs
            .first()
            .map(|&spec| Downstream::from(spec))
            .unwrap_or(Downstream::CALLER);
        debug!(
            "pipeline: {} stages, workers {:?}, queue capacity {}",
            self.specs.len(),
            self.specs.iter().map(|s| s.workers).collect::<Vec<_>>(),
            self.queue_capacity
        );

        let queue0 = StageQueue::new(1, head.consumers, self.queue_capacity);
        let (tx0, rx0) = queue0.split();

        let mut state = LaunchState::new(self.queue_capacity);
        let terminal = (self.launch)(rx0, Downstream::CALLER, &mut state);
        let driver_handle = spawn_driver_thread(input.into_iter(), tx0, head.batch_size);

        PipelineRun {
            terminal,
            ready: Vec::new().into_iter(),
            handles: Some(PipelineHandles {
                driver_handle,
                worker_handles: state.worker_handles,
                ctx: state.ctx,
            }),
            finished: false,
            items_out: 0,
        }
    }
}

/// Lazy terminal output of a running pipeline.
///
/// Iterate until `None` (terminal EOS), then call [`Self::finish`] to join the
/// worker pools and surface any stage failure.
pub struct PipelineRun<T> {
    terminal: QueueReceiver<Vec<T>>,
    ready: std::vec::IntoIter<T>,
    handles: Option<PipelineHandles>,
    finished: bool,
    items_out: usize,
}

impl<T> Iterator for PipelineRun<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.ready.next() {
                self.items_out += 1;
                return Some(item);
            }
            if self.finished {
                return None;
            }
            match self.terminal.get() {
                Task::Payload(batch) => self.ready = batch.into_iter(),
                Task::Eos => {
                    debug!("pipeline: terminal EOS after {} items", self.items_out);
                    self.finished = true;
                }
            }
        }
    }
}

impl<T> PipelineRun<T> {
    /// True once the terminal EOS has been observed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn context(&self) -> Option<&PipelineContext> {
        self.handles.as_ref().map(|h| &h.ctx)
    }

    /// Drain whatever the caller did not consume, join all threads, and
    /// report the first stage failure if any invocation panicked.
    pub fn finish(mut self) -> Result<PipelineSummary> {
        let mut discarded = 0_usize;
        while self.next().is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("pipeline: discarded {} unread items at finish", discarded);
        }
        let items_out = self.items_out - discarded;
        let handles = self
            .handles
            .take()
            .ok_or_else(|| anyhow::anyhow!("pipeline already finished"))?;
        let items_in = shutdown_pipeline_handles(handles)?;
        Ok(PipelineSummary {
            items_in,
            items_out,
        })
    }

    /// Drain the run into a `Vec` and finish it.
    pub fn collect_all(mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for item in self.by_ref() {
            out.push(item);
        }
        self.finish()?;
        Ok(out)
    }
}

/// Join the driver and every worker (after the terminal EOS), then check for stage failures.
/// Returns the number of input items the driver fed.
pub fn shutdown_pipeline_handles(handles: PipelineHandles) -> Result<usize> {
    let PipelineHandles {
        driver_handle,
        worker_handles,
        ctx,
    } = handles;
    let items_in = driver_handle
        .join()
        .map_err(|_| anyhow::anyhow!("pipeline driver thread panicked (input iterator)"))?;
    let mut lost_workers = 0_usize;
    for h in worker_handles {
        if h.join().is_err() {
            lost_workers += 1;
        }
    }
    check_for_stage_failures(&ctx)?;
    if lost_workers > 0 {
        anyhow::bail!("{} pipeline worker threads panicked", lost_workers);
    }
    Ok(items_in)
}
