//! Extract worker: parse stored raw content into structured fields.

use std::sync::Arc;

use tracing::{debug, info, warn};

use jobscout_adapters::AdapterRegistry;
use jobscout_core::Error;
use jobscout_core::content::ContentStore;
use jobscout_core::message::ExtractMessage;
use jobscout_core::run::RunStatus;
use jobscout_db::{JobRepo, LogRepo, RunRepo};

use crate::PipelineResult;
use crate::finalizer::Finalizer;
use crate::queue::{Delivery, PgQueue};

pub struct Extractor {
    runs: Arc<dyn RunRepo>,
    jobs: Arc<dyn JobRepo>,
    logs: Arc<dyn LogRepo>,
    registry: Arc<AdapterRegistry>,
    content: Arc<dyn ContentStore>,
    extract_queue: Arc<PgQueue>,
    finalizer: Arc<Finalizer>,
}

impl Extractor {
    pub fn new(
        runs: Arc<dyn RunRepo>,
        jobs: Arc<dyn JobRepo>,
        logs: Arc<dyn LogRepo>,
        registry: Arc<AdapterRegistry>,
        content: Arc<dyn ContentStore>,
        extract_queue: Arc<PgQueue>,
        finalizer: Arc<Finalizer>,
    ) -> Self {
        Self {
            runs,
            jobs,
            logs,
            registry,
            content,
            extract_queue,
            finalizer,
        }
    }

    /// Process one extract delivery. Redelivery of a message for an
    /// already-ready job rewrites the same terminal state, which is
    /// how at-least-once stays safe here.
    pub async fn handle(&self, delivery: Delivery<ExtractMessage>) -> PipelineResult<()> {
        let msg = &delivery.message;
        let user_id = msg.user_context.user_id;

        let run = self.runs.get(msg.run_id).await?;
        if run.run_status()? != RunStatus::Ingesting {
            debug!(run_id = %msg.run_id, job_id = %msg.job_id, "run no longer ingesting, dropping extract");
            self.extract_queue.ack(delivery.id).await?;
            return Ok(());
        }

        let raw = match self.content.get(&msg.raw_content_path).await {
            Ok(raw) => raw,
            Err(Error::NotFound(_)) => {
                // Retention expired or the blob never landed; either
                // way there is nothing left to parse.
                self.fail_job(&delivery, "raw content missing from store")
                    .await?;
                return Ok(());
            }
            Err(e) if e.is_retryable() && !delivery.final_attempt() => {
                warn!(path = %msg.raw_content_path, error = %e, "content read failed, awaiting redelivery");
                return Ok(());
            }
            Err(e) => {
                self.fail_job(&delivery, &format!("content read failed: {e}"))
                    .await?;
                return Ok(());
            }
        };

        let Some(adapter) = self.registry.get(&msg.company) else {
            self.fail_job(&delivery, "no adapter registered for company")
                .await?;
            return Ok(());
        };

        let parsed = match adapter.parse_raw(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.fail_job(&delivery, &format!("parse failed: {e}"))
                    .await?;
                return Ok(());
            }
        };

        self.jobs
            .mark_ready(
                msg.job_id,
                msg.run_id,
                &parsed.description,
                &parsed.requirements,
            )
            .await?;
        self.finalizer.maybe_finish(msg.run_id, user_id).await?;
        self.extract_queue.ack(delivery.id).await?;
        info!(job_id = %msg.job_id, company = %msg.company, "job ready");
        Ok(())
    }

    async fn fail_job(
        &self,
        delivery: &Delivery<ExtractMessage>,
        reason: &str,
    ) -> PipelineResult<()> {
        let msg = &delivery.message;
        warn!(job_id = %msg.job_id, company = %msg.company, reason, "extract failed");
        self.jobs.mark_error(msg.job_id, msg.run_id, reason).await?;
        self.logs
            .append(
                msg.run_id,
                msg.user_context.user_id,
                &format!("extraction for job {} ({}) failed: {reason}", msg.job_id, msg.company),
            )
            .await?;
        self.finalizer
            .maybe_finish(msg.run_id, msg.user_context.user_id)
            .await?;
        self.extract_queue.ack(delivery.id).await?;
        Ok(())
    }
}
