//! Application state.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use jobscout_adapters::AdapterRegistry;
use jobscout_core::content::ContentStore;
use jobscout_db::{JobRepo, LogRepo, PgJobRepo, PgLogRepo, PgRunRepo, PgSettingsRepo, RunRepo, SettingsRepo};
use jobscout_pipeline::crawler::Crawler;
use jobscout_pipeline::extractor::Extractor;
use jobscout_pipeline::finalizer::Finalizer;
use jobscout_pipeline::initializer::Initializer;
use jobscout_pipeline::queue::{self, PgQueue};

use crate::auth::TokenVerifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub runs: Arc<dyn RunRepo>,
    pub jobs: Arc<dyn JobRepo>,
    pub settings: Arc<dyn SettingsRepo>,
    pub logs: Arc<dyn LogRepo>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub initializer: Arc<Initializer>,
    pub crawler: Arc<Crawler>,
    pub extractor: Arc<Extractor>,
    pub crawl_queue: Arc<PgQueue>,
    pub extract_queue: Arc<PgQueue>,
    pub progress_poll_interval: Duration,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        registry: Arc<AdapterRegistry>,
        content: Arc<dyn ContentStore>,
        verifier: Arc<dyn TokenVerifier>,
        progress_poll_interval: Duration,
    ) -> Self {
        let runs: Arc<dyn RunRepo> = Arc::new(PgRunRepo::new(pool.clone()));
        let jobs: Arc<dyn JobRepo> = Arc::new(PgJobRepo::new(pool.clone()));
        let settings: Arc<dyn SettingsRepo> = Arc::new(PgSettingsRepo::new(pool.clone()));
        let logs: Arc<dyn LogRepo> = Arc::new(PgLogRepo::new(pool.clone()));

        let crawl_queue = Arc::new(queue::crawl_queue(pool.clone()));
        let extract_queue = Arc::new(queue::extract_queue(pool.clone()));

        let finalizer = Arc::new(Finalizer::new(runs.clone(), jobs.clone(), logs.clone()));
        let initializer = Arc::new(Initializer::new(
            runs.clone(),
            jobs.clone(),
            settings.clone(),
            logs.clone(),
            registry.clone(),
            crawl_queue.clone(),
            finalizer.clone(),
        ));
        let crawler = Arc::new(Crawler::new(
            runs.clone(),
            jobs.clone(),
            logs.clone(),
            registry.clone(),
            content.clone(),
            crawl_queue.clone(),
            extract_queue.clone(),
            finalizer.clone(),
        ));
        let extractor = Arc::new(Extractor::new(
            runs.clone(),
            jobs.clone(),
            logs.clone(),
            registry,
            content,
            extract_queue.clone(),
            finalizer,
        ));

        Self {
            pool,
            runs,
            jobs,
            settings,
            logs,
            verifier,
            initializer,
            crawler,
            extractor,
            crawl_queue,
            extract_queue,
            progress_poll_interval,
        }
    }
}
