use anyhow::Result;
use std::any::Any;
use std::sync::atomic::Ordering;

use super::context::PipelineContext;

/// Best-effort message from a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Record a panicked stage invocation. Only the first message is kept.
pub fn record_stage_failure(ctx: &PipelineContext, stage_index: usize, msg: String) {
    ctx.failed_invocations.fetch_add(1, Ordering::AcqRel);
    log::error!("stage {} invocation failed: {}", stage_index, msg);
    let mut slot = ctx
        .first_error
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    slot.get_or_insert_with(|| format!("stage {}: {}", stage_index, msg));
}

/// Check pipeline result after joining: if any stage invocation failed, return the first failure.
pub fn check_for_stage_failures(ctx: &PipelineContext) -> Result<()> {
    let failures = ctx.failures();
    let first = ctx
        .first_error
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    match first {
        Some(msg) if failures > 1 => Err(anyhow::anyhow!(
            "{} (and {} more failed invocations)",
            msg,
            failures - 1
        )),
        Some(msg) => Err(anyhow::anyhow!("{}", msg)),
        None => Ok(()),
    }
}
