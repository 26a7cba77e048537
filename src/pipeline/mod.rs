//! Pipeline components: task envelope, stage queues, batching, worker pools, orchestration.

pub mod batcher;
pub mod context;
pub mod driver;
pub mod error_handler;
pub mod orchestrator;
pub mod queue;
pub mod stage;
pub mod task;
pub mod workers;

pub use batcher::{Batcher, BatchingSender};
pub use context::{Downstream, PipelineContext, PipelineHandles, PipelineSummary};
pub use error_handler::check_for_stage_failures;
pub use orchestrator::{Pipeline, PipelineRun, shutdown_pipeline_handles};
pub use queue::{EosQuorum, QueueClosed, QueueReceiver, QueueSender, StageQueue};
pub use stage::{Stage, StageSpec};
pub use task::Task;
