//! jobscout API server.

use std::sync::Arc;

use jobscout_adapters::AdapterRegistry;
use jobscout_api::auth::{HttpTokenVerifier, StaticTokenVerifier, TokenVerifier};
use jobscout_api::{AppState, Config, routes};
use jobscout_core::content::ContentStore;
use jobscout_db::{create_pool, run_migrations};
use jobscout_pipeline::content::FsContentStore;
use jobscout_pipeline::worker::spawn_workers;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    info!("Connecting to database...");
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    info!("Database connected");

    let registry = Arc::new(AdapterRegistry::from_board_specs(&config.boards)?);
    if registry.is_empty() {
        warn!("no boards configured (JOBSCOUT_BOARDS empty); runs will have nothing to crawl");
    }

    let content: Arc<dyn ContentStore> = Arc::new(FsContentStore::new(&config.content_dir));
    let verifier: Arc<dyn TokenVerifier> = match &config.identity_url {
        Some(url) => Arc::new(HttpTokenVerifier::new(url.clone())),
        None => {
            warn!("JOBSCOUT_IDENTITY_URL unset, using static dev tokens");
            Arc::new(StaticTokenVerifier::from_spec(&config.dev_tokens))
        }
    };

    let state = AppState::new(
        pool,
        registry,
        content,
        verifier,
        config.progress_poll_interval,
    );

    if config.embedded_workers {
        info!(
            crawl_workers = config.crawl_workers,
            extract_workers = config.extract_workers,
            "starting embedded worker pools"
        );
        spawn_workers(
            config.crawl_workers,
            config.extract_workers,
            state.crawl_queue.clone(),
            state.extract_queue.clone(),
            state.crawler.clone(),
            state.extractor.clone(),
        );
    }

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    info!("Starting server on {}", config.bind);
    let listener = TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
