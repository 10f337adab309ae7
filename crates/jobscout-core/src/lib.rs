//! Core domain types and traits for the jobscout ingestion pipeline.
//!
//! This crate contains:
//! - Run and job records with their status state machines
//! - The site adapter trait that per-company modules implement
//! - The content store trait for raw page blobs
//! - Queue message wire shapes
//! - Title filters and the SimHash change detector

pub mod adapter;
pub mod content;
pub mod error;
pub mod filters;
pub mod id;
pub mod job;
pub mod message;
pub mod run;
pub mod simhash;

pub use error::{Error, Result};
pub use id::{JobId, RunId, UserId};
