//! Worker loops that drain the queues.
//!
//! One message per invocation keeps retry semantics simple: a handler
//! either finishes its delivery or leaves it for the visibility
//! timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

use jobscout_core::message::{CrawlMessage, ExtractMessage};

use crate::crawler::Crawler;
use crate::extractor::Extractor;
use crate::queue::PgQueue;

/// Idle sleep when the queue has nothing claimable.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Backoff after an infrastructure error (claim failed, store down).
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A worker that claims and processes crawl messages.
pub struct CrawlWorker {
    id: String,
    queue: Arc<PgQueue>,
    crawler: Arc<Crawler>,
}

impl CrawlWorker {
    pub fn new(id: impl Into<String>, queue: Arc<PgQueue>, crawler: Arc<Crawler>) -> Self {
        Self {
            id: id.into(),
            queue,
            crawler,
        }
    }

    /// Run the worker loop.
    pub async fn run(&self) {
        info!(worker_id = %self.id, "starting crawl worker");

        loop {
            match self.queue.claim::<CrawlMessage>().await {
                Ok(Some(delivery)) => {
                    if let Err(e) = self.crawler.handle(delivery).await {
                        // The message stays in flight and redelivers
                        // after the visibility timeout.
                        warn!(worker_id = %self.id, error = %e, "crawl handler failed");
                        sleep(ERROR_BACKOFF).await;
                    }
                }
                Ok(None) => sleep(IDLE_POLL).await,
                Err(e) => {
                    warn!(worker_id = %self.id, error = %e, "failed to claim crawl message");
                    sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }
}

/// A worker that claims and processes extract messages.
pub struct ExtractWorker {
    id: String,
    queue: Arc<PgQueue>,
    extractor: Arc<Extractor>,
}

impl ExtractWorker {
    pub fn new(id: impl Into<String>, queue: Arc<PgQueue>, extractor: Arc<Extractor>) -> Self {
        Self {
            id: id.into(),
            queue,
            extractor,
        }
    }

    pub async fn run(&self) {
        info!(worker_id = %self.id, "starting extract worker");

        loop {
            match self.queue.claim::<ExtractMessage>().await {
                Ok(Some(delivery)) => {
                    if let Err(e) = self.extractor.handle(delivery).await {
                        warn!(worker_id = %self.id, error = %e, "extract handler failed");
                        sleep(ERROR_BACKOFF).await;
                    }
                }
                Ok(None) => sleep(IDLE_POLL).await,
                Err(e) => {
                    warn!(worker_id = %self.id, error = %e, "failed to claim extract message");
                    sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }
}

/// Spawn the embedded worker pools. The extract pool is capped by the
/// caller to stay under the state store's connection budget.
pub fn spawn_workers(
    crawl_workers: usize,
    extract_workers: usize,
    crawl_queue: Arc<PgQueue>,
    extract_queue: Arc<PgQueue>,
    crawler: Arc<Crawler>,
    extractor: Arc<Extractor>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(crawl_workers + extract_workers);

    for i in 0..crawl_workers {
        let worker = CrawlWorker::new(format!("crawl-{i}"), crawl_queue.clone(), crawler.clone());
        handles.push(tokio::spawn(async move { worker.run().await }));
    }
    for i in 0..extract_workers {
        let worker = ExtractWorker::new(
            format!("extract-{i}"),
            extract_queue.clone(),
            extractor.clone(),
        );
        handles.push(tokio::spawn(async move { worker.run().await }));
    }

    handles
}
