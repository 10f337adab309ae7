//! API server for jobscout.
//!
//! Thin request/response surface over the ingestion pipeline: start,
//! abort, current-run, a resumable SSE progress stream, and the run
//! log channel.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use state::AppState;
