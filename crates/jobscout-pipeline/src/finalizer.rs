//! Run completion detection.
//!
//! Every worker that writes a terminal job status calls this hook.
//! Completion is decentralized: whichever worker drains the last
//! pending job wins the conditional promotion; everyone else's call is
//! a harmless no-op.

use std::sync::Arc;

use tracing::info;

use jobscout_core::{RunId, UserId};
use jobscout_db::{JobRepo, LogRepo, RunRepo};

use crate::PipelineResult;

pub struct Finalizer {
    runs: Arc<dyn RunRepo>,
    jobs: Arc<dyn JobRepo>,
    logs: Arc<dyn LogRepo>,
}

impl Finalizer {
    pub fn new(runs: Arc<dyn RunRepo>, jobs: Arc<dyn JobRepo>, logs: Arc<dyn LogRepo>) -> Self {
        Self { runs, jobs, logs }
    }

    /// Finish the run if no pending jobs remain. Returns true iff this
    /// call performed the promotion.
    pub async fn maybe_finish(&self, run_id: RunId, user_id: UserId) -> PipelineResult<bool> {
        let pending = self.jobs.count_pending(run_id).await?;
        if pending > 0 {
            return Ok(false);
        }

        // Only the first observer of zero-pending gets through the
        // status guard; a run that was aborted meanwhile fails it too.
        let promoted = self.runs.finalize(run_id).await?;
        if promoted {
            info!(run_id = %run_id, "run finished");
            self.logs
                .append(run_id, user_id, "ingestion finished")
                .await?;
        }
        Ok(promoted)
    }
}
