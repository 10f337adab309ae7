//! Crawl worker: one message, one page fetch, one skip decision.

use std::sync::Arc;

use tracing::{debug, info, warn};

use jobscout_adapters::AdapterRegistry;
use jobscout_core::content::{ContentStore, content_path};
use jobscout_core::message::{CrawlMessage, ExtractMessage};
use jobscout_core::run::RunStatus;
use jobscout_core::simhash::{hamming_distance, is_near_duplicate, simhash64};
use jobscout_core::Error;
use jobscout_db::{JobRepo, LogRepo, RunRepo};

use crate::PipelineResult;
use crate::finalizer::Finalizer;
use crate::queue::{Delivery, PgQueue, RATE_LIMIT_BACKOFF};

pub struct Crawler {
    runs: Arc<dyn RunRepo>,
    jobs: Arc<dyn JobRepo>,
    logs: Arc<dyn LogRepo>,
    registry: Arc<AdapterRegistry>,
    content: Arc<dyn ContentStore>,
    crawl_queue: Arc<PgQueue>,
    extract_queue: Arc<PgQueue>,
    finalizer: Arc<Finalizer>,
}

impl Crawler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runs: Arc<dyn RunRepo>,
        jobs: Arc<dyn JobRepo>,
        logs: Arc<dyn LogRepo>,
        registry: Arc<AdapterRegistry>,
        content: Arc<dyn ContentStore>,
        crawl_queue: Arc<PgQueue>,
        extract_queue: Arc<PgQueue>,
        finalizer: Arc<Finalizer>,
    ) -> Self {
        Self {
            runs,
            jobs,
            logs,
            registry,
            content,
            crawl_queue,
            extract_queue,
            finalizer,
        }
    }

    /// Process one crawl delivery. Exactly one of: job skipped, raw
    /// stored + extract enqueued, job errored, or the message left on
    /// the queue for redelivery.
    pub async fn handle(&self, delivery: Delivery<CrawlMessage>) -> PipelineResult<()> {
        let msg = &delivery.message;
        let user_id = msg.user_context.user_id;

        // Aborted runs leave their remaining messages as no-ops; the
        // job rows stay as-is for the next run's expiry pass.
        let run = self.runs.get(msg.run_id).await?;
        if run.run_status()? != RunStatus::Ingesting {
            debug!(run_id = %msg.run_id, job_id = %msg.job_id, "run no longer ingesting, dropping crawl");
            self.crawl_queue.ack(delivery.id).await?;
            return Ok(());
        }

        let Some(adapter) = self.registry.get(&msg.company) else {
            self.fail_job(&delivery, "no adapter registered for company")
                .await?;
            return Ok(());
        };

        let raw = match adapter.fetch_raw(&msg.url).await {
            Ok(raw) => raw,
            Err(Error::RateLimited) => {
                warn!(company = %msg.company, url = %msg.url, "rate limited, delaying crawl");
                self.crawl_queue
                    .delay(delivery.id, RATE_LIMIT_BACKOFF)
                    .await?;
                return Ok(());
            }
            Err(e @ Error::Unavailable(_)) if !delivery.final_attempt() => {
                // Leave unacknowledged; the visibility timeout will
                // redeliver.
                warn!(company = %msg.company, url = %msg.url, error = %e, "fetch failed, awaiting redelivery");
                return Ok(());
            }
            Err(e) => {
                self.fail_job(&delivery, &format!("fetch failed: {e}"))
                    .await?;
                return Ok(());
            }
        };

        let fingerprint = simhash64(&raw);

        // Unchanged content short-circuits the extract stage entirely.
        if !msg.force {
            if let Some(prior) = msg.prior_simhash {
                if is_near_duplicate(prior, fingerprint) {
                    debug!(
                        job_id = %msg.job_id,
                        distance = hamming_distance(prior, fingerprint),
                        "content unchanged, skipping"
                    );
                    self.jobs
                        .mark_skipped(msg.job_id, msg.run_id, fingerprint)
                        .await?;
                    self.finalizer.maybe_finish(msg.run_id, user_id).await?;
                    self.crawl_queue.ack(delivery.id).await?;
                    return Ok(());
                }
            }
        }

        // Changed (or forced): make the raw bytes durable before the
        // extract message exists, refresh the fingerprint, and hand
        // off. The job stays pending, so no finalizer call here.
        let path = content_path(&msg.company, &msg.url);
        self.content.put(&path, raw).await?;
        self.jobs
            .update_simhash(msg.job_id, msg.run_id, fingerprint)
            .await?;
        self.extract_queue
            .enqueue(
                &msg.company,
                &ExtractMessage {
                    run_id: msg.run_id,
                    job_id: msg.job_id,
                    company: msg.company.clone(),
                    raw_content_path: path,
                    user_context: msg.user_context,
                },
            )
            .await?;
        self.crawl_queue.ack(delivery.id).await?;
        info!(job_id = %msg.job_id, company = %msg.company, "raw stored, extract enqueued");
        Ok(())
    }

    async fn fail_job(&self, delivery: &Delivery<CrawlMessage>, reason: &str) -> PipelineResult<()> {
        let msg = &delivery.message;
        warn!(job_id = %msg.job_id, company = %msg.company, reason, "crawl failed");
        self.jobs.mark_error(msg.job_id, msg.run_id, reason).await?;
        self.logs
            .append(
                msg.run_id,
                msg.user_context.user_id,
                &format!("crawl of {} ({}) failed: {reason}", msg.url, msg.company),
            )
            .await?;
        self.finalizer
            .maybe_finish(msg.run_id, msg.user_context.user_id)
            .await?;
        self.crawl_queue.ack(delivery.id).await?;
        Ok(())
    }
}
