//! API routes.

pub mod health;
pub mod ingestion;
pub mod progress;

use axum::Router;

use crate::AppState;

/// Build the main API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/ingestion", ingestion::router())
        .merge(health::router())
        .with_state(state)
}
