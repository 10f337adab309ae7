//! Run initializer: source current posting URLs from every enabled
//! company, seed the job rows, mark vanished postings expired, and
//! enqueue the crawl fan-out.
//!
//! Runs to completion outside any request cycle; the controller fires
//! it and returns. After the enqueue step the initializer has no
//! further role; completion is decided by the workers.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tracing::{error, info, warn};

use jobscout_adapters::AdapterRegistry;
use jobscout_core::filters::TitleFilters;
use jobscout_core::job::ListedJob;
use jobscout_core::message::{CrawlMessage, UserContext};
use jobscout_core::run::RunStatus;
use jobscout_core::{Result as CoreResult, RunId, UserId};
use jobscout_db::repo::job::simhash_from_db;
use jobscout_db::{JobRepo, LogRepo, RunRepo, SettingsRepo};

use crate::PipelineResult;
use crate::finalizer::Finalizer;
use crate::queue::PgQueue;

/// Concurrent `list_jobs` calls across companies. Small enough that
/// external sites never see a burst of simultaneous list requests.
const LIST_CONCURRENCY: usize = 8;

/// Input to one initializer invocation.
#[derive(Debug, Clone, Copy)]
pub struct InitializeRun {
    pub run_id: RunId,
    pub user_id: UserId,
    pub force: bool,
}

pub struct Initializer {
    runs: Arc<dyn RunRepo>,
    jobs: Arc<dyn JobRepo>,
    settings: Arc<dyn SettingsRepo>,
    logs: Arc<dyn LogRepo>,
    registry: Arc<AdapterRegistry>,
    crawl_queue: Arc<PgQueue>,
    finalizer: Arc<Finalizer>,
}

impl Initializer {
    pub fn new(
        runs: Arc<dyn RunRepo>,
        jobs: Arc<dyn JobRepo>,
        settings: Arc<dyn SettingsRepo>,
        logs: Arc<dyn LogRepo>,
        registry: Arc<AdapterRegistry>,
        crawl_queue: Arc<PgQueue>,
        finalizer: Arc<Finalizer>,
    ) -> Self {
        Self {
            runs,
            jobs,
            settings,
            logs,
            registry,
            crawl_queue,
            finalizer,
        }
    }

    /// Drive a run from `pending` into `ingesting`. Fatal failures
    /// land on the run row instead of propagating.
    pub async fn run(&self, input: InitializeRun) {
        if let Err(e) = self.run_inner(input).await {
            error!(run_id = %input.run_id, error = %e, "initializer failed");
            let message = format!("initialization failed: {e}");
            if let Err(e) = self.runs.mark_error(input.run_id, &message).await {
                error!(run_id = %input.run_id, error = %e, "failed to record run error");
            }
            if let Err(e) = self
                .logs
                .append(input.run_id, input.user_id, &message)
                .await
            {
                error!(run_id = %input.run_id, error = %e, "failed to log run error");
            }
        }
    }

    async fn run_inner(&self, input: InitializeRun) -> PipelineResult<()> {
        let InitializeRun {
            run_id,
            user_id,
            force,
        } = input;

        // Abort races and redeliveries: a run that is already terminal
        // is not ours to touch.
        if self.run_is_terminal(run_id).await? {
            return Ok(());
        }
        self.runs
            .advance(run_id, RunStatus::Pending, RunStatus::Initializing)
            .await?;

        let settings = self.settings.enabled_for_user(user_id).await?;
        if settings.is_empty() {
            // A legal empty run: nothing to crawl, finish immediately.
            info!(run_id = %run_id, "no enabled companies, finishing empty run");
            self.logs
                .append(run_id, user_id, "no enabled companies configured")
                .await?;
            self.runs
                .advance(run_id, RunStatus::Initializing, RunStatus::Ingesting)
                .await?;
            self.finalizer.maybe_finish(run_id, user_id).await?;
            return Ok(());
        }

        // Fan out the listings, bounded. A company failure is recorded
        // and the company omitted; its jobs keep their prior state.
        let listings: Vec<(String, CoreResult<Vec<ListedJob>>)> =
            stream::iter(settings.into_iter().map(|setting| {
                let company = setting.company.clone();
                let filters = setting.filters();
                let registry = self.registry.clone();
                async move {
                    let result = list_company(&registry, &company, &filters).await;
                    (company, result)
                }
            }))
            .buffer_unordered(LIST_CONCURRENCY)
            .collect()
            .await;

        // The user may have aborted while we were listing; the work so
        // far is discarded by simply stopping here.
        if self.run_is_terminal(run_id).await? {
            info!(run_id = %run_id, "run aborted during initialization");
            return Ok(());
        }

        let mut enqueueable = Vec::new();
        let mut listed_companies = 0usize;
        for (company, result) in listings {
            match result {
                Ok(listed) => {
                    listed_companies += 1;
                    let mut listed_ids = Vec::with_capacity(listed.len());
                    for entry in &listed {
                        let record = self
                            .jobs
                            .upsert_pending(user_id, run_id, &company, entry)
                            .await?;
                        listed_ids.push(record.id);
                        enqueueable.push((company.clone(), record));
                    }
                    let expired = self
                        .jobs
                        .expire_missing(user_id, run_id, &company, &listed_ids)
                        .await?;
                    info!(run_id = %run_id, company = %company, listed = listed.len(), expired, "company listed");
                    self.logs
                        .append(
                            run_id,
                            user_id,
                            &format!("{company}: {} postings listed, {expired} expired", listed.len()),
                        )
                        .await?;
                }
                Err(e) => {
                    warn!(run_id = %run_id, company = %company, error = %e, "company listing failed");
                    self.logs
                        .append(run_id, user_id, &format!("{company}: listing failed: {e}"))
                        .await?;
                }
            }
        }

        if listed_companies == 0 {
            // Every configured company failed; surface it on the run.
            return Err(jobscout_core::Error::Unavailable(
                "all company listings failed".into(),
            )
            .into());
        }

        self.runs
            .advance(run_id, RunStatus::Initializing, RunStatus::Ingesting)
            .await?;
        if self.run_is_terminal(run_id).await? {
            info!(run_id = %run_id, "run aborted before enqueue");
            return Ok(());
        }

        let mut enqueued = 0usize;
        for (company, record) in enqueueable {
            let message = CrawlMessage {
                run_id,
                job_id: record.id.into(),
                url: record.url.clone(),
                prior_simhash: record.simhash.map(simhash_from_db),
                force,
                user_context: UserContext { user_id },
                company,
            };
            self.crawl_queue.enqueue(&message.company, &message).await?;
            enqueued += 1;
        }

        info!(run_id = %run_id, enqueued, "run ingesting");
        self.logs
            .append(run_id, user_id, &format!("{enqueued} crawl messages enqueued"))
            .await?;

        // Degenerate case: with nothing enqueued no worker will ever
        // call the finalizer, so the initializer does.
        if enqueued == 0 {
            self.finalizer.maybe_finish(run_id, user_id).await?;
        }
        Ok(())
    }

    async fn run_is_terminal(&self, run_id: RunId) -> PipelineResult<bool> {
        let record = self.runs.get(run_id).await?;
        Ok(record.run_status()?.is_terminal())
    }
}

async fn list_company(
    registry: &AdapterRegistry,
    company: &str,
    filters: &TitleFilters,
) -> CoreResult<Vec<ListedJob>> {
    let adapter = registry.get(company).ok_or_else(|| {
        jobscout_core::Error::Format(format!("no adapter registered for company {company}"))
    })?;
    adapter.list_jobs(filters).await
}
