use log::debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::batcher::BatchingSender;
use super::context::{Downstream, PipelineContext};
use super::error_handler::{panic_message, record_stage_failure};
use super::queue::{QueueClosed, QueueReceiver, QueueSender};
use super::stage::Stage;
use super::task::Task;

/// Single stage worker: get a batch, run the stage, send every output item
/// (batched for the next stage), until EOS; then flush and forward EOS.
///
/// A panicking invocation is recorded and the worker stops processing, but it
/// keeps draining its input so upstream never blocks, and still forwards EOS.
fn stage_worker_loop<I, O, S>(
    stage_index: usize,
    stage: Arc<S>,
    input: QueueReceiver<Vec<I>>,
    mut output: BatchingSender<O>,
    ctx: PipelineContext,
) where
    S: Stage<I, O>,
{
    let mut healthy = true;
    let mut batches = 0_usize;
    while let Task::Payload(batch) = input.get() {
        if !healthy {
            continue;
        }
        batches += 1;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), QueueClosed> {
            for item in stage.process(batch) {
                output.send(item)?;
            }
            Ok(())
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(QueueClosed)) => {
                debug!("stage {}: downstream closed, worker exiting", stage_index);
                return;
            }
            Err(payload) => {
                record_stage_failure(&ctx, stage_index, panic_message(payload.as_ref()));
                healthy = false;
            }
        }
    }
    debug!(
        "stage {}: worker done after {} batches",
        stage_index, batches
    );
    if output.finish().is_err() {
        debug!("stage {}: downstream closed before EOS", stage_index);
    }
}

/// Spawn `workers` threads for one stage. Each gets a clone of the input
/// receiver and its own batching view of the output queue.
pub fn spawn_stage_workers<I, O, S>(
    stage_index: usize,
    stage: S,
    workers: usize,
    input: QueueReceiver<Vec<I>>,
    output: QueueSender<Vec<O>>,
    downstream: Downstream,
    ctx: &PipelineContext,
) -> Vec<JoinHandle<()>>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Stage<I, O>,
{
    let stage = Arc::new(stage);
    (0..workers)
        .map(|_| {
            let stage = Arc::clone(&stage);
            let input = input.clone();
            let output = BatchingSender::new(output.clone(), downstream.batch_size);
            let ctx = ctx.clone();
            thread::spawn(move || stage_worker_loop(stage_index, stage, input, output, ctx))
        })
        .collect()
}
