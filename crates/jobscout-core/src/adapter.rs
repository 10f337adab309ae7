//! The per-site extraction adapter contract.
//!
//! Adapters are the only code that knows site-specific quirks (dual
//! identifiers, nested location objects, framework-specific embedded
//! data). The pipeline is written against this trait alone.

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;
use crate::filters::TitleFilters;
use crate::job::{ListedJob, ParsedPosting};

/// One company career site.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// The company tag this adapter is registered under.
    fn company(&self) -> &str;

    /// Fetch the company's current job index and apply `filters`.
    ///
    /// Deduplicates by `external_id`, aggregating locations when the
    /// same posting appears at multiple offices. Retry-safe. Fails
    /// with [`crate::Error::Unavailable`] for transport problems and
    /// [`crate::Error::Format`] for unexpected response shapes.
    async fn list_jobs(&self, filters: &TitleFilters) -> Result<Vec<ListedJob>>;

    /// Retrieve the raw representation of a single posting. No
    /// parsing. Fails with `Unavailable`, `RateLimited`, or `Format`
    /// (for responses that are well-formed HTTP but don't look like a
    /// job page).
    async fn fetch_raw(&self, url: &str) -> Result<Bytes>;

    /// Extract the structured text fields from raw bytes.
    ///
    /// Pure: normalizes whitespace, converts block-level HTML to
    /// newlines, decodes entities, strips residual tags. Missing
    /// sections produce empty strings; `Format` is returned only when
    /// the input is unrecognizable as a job page.
    fn parse_raw(&self, raw: &[u8]) -> Result<ParsedPosting>;
}
