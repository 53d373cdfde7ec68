//! Stage timing hooks.
//!
//! Everything goes through `tracing`; the binary decides where it ends up.

use std::time::Instant;

use adpack_core::id::JobId;

/// Measures one stage of one job and reports it when finished.
pub struct StageTimer {
    stage: &'static str,
    job_id: JobId,
    started: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str, job_id: JobId) -> Self {
        tracing::debug!(stage, %job_id, "stage started");
        Self {
            stage,
            job_id,
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Emit the outcome; returns elapsed milliseconds.
    pub fn finish(self, ok: bool) -> u64 {
        let elapsed_ms = self.elapsed_ms();
        emit_stage(self.stage, self.job_id, elapsed_ms, ok);
        elapsed_ms
    }
}

pub fn emit_stage(stage: &'static str, job_id: JobId, elapsed_ms: u64, ok: bool) {
    if ok {
        tracing::info!(stage, %job_id, elapsed_ms, "stage finished");
    } else {
        tracing::warn!(stage, %job_id, elapsed_ms, "stage failed");
    }
}
