//! Adapter for Greenhouse-hosted boards.
//!
//! Listing comes from the public board API, one page at a time. A
//! posting that is open in several offices appears once per office in
//! the feed; it is collapsed to one job with the locations aggregated.
//! Raw content for a single posting is the posting-API JSON whose
//! `content` field carries entity-escaped HTML.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use jobscout_core::adapter::SiteAdapter;
use jobscout_core::filters::TitleFilters;
use jobscout_core::job::{ListedJob, ParsedPosting};
use jobscout_core::{Error, Result};

use crate::html::{html_to_text, split_sections};
use crate::http;

const DEFAULT_BASE_URL: &str = "https://boards-api.greenhouse.io";
const PAGE_SIZE: usize = 100;
const MAX_PAGES: usize = 50;

pub struct GreenhouseAdapter {
    company: String,
    board: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct BoardPage {
    jobs: Vec<BoardJob>,
}

#[derive(Debug, Deserialize)]
struct BoardJob {
    id: u64,
    title: String,
    #[serde(default)]
    location: Option<BoardLocation>,
    #[serde(default)]
    offices: Vec<BoardOffice>,
}

#[derive(Debug, Deserialize)]
struct BoardLocation {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BoardOffice {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostingBody {
    content: String,
}

impl GreenhouseAdapter {
    pub fn new(company: impl Into<String>, board: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            board: board.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: http::client(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn posting_url(&self, id: u64) -> String {
        format!(
            "{}/v1/boards/{}/jobs/{id}?content=true",
            self.base_url, self.board
        )
    }

    /// Collapse one page of feed entries into the accumulator,
    /// aggregating locations for postings repeated across offices.
    fn fold_page(&self, jobs: Vec<BoardJob>, filters: &TitleFilters, out: &mut Vec<ListedJob>) {
        for job in jobs {
            if !filters.accepts(&job.title) {
                continue;
            }

            let mut locations: Vec<String> = job
                .offices
                .iter()
                .filter_map(|o| o.name.clone())
                .collect();
            if locations.is_empty() {
                if let Some(loc) = &job.location {
                    locations.push(loc.name.clone());
                }
            }

            let external_id = job.id.to_string();
            match out.iter_mut().find(|j| j.external_id == external_id) {
                Some(existing) => {
                    for loc in locations {
                        if !existing.location.split("; ").any(|l| l == loc) {
                            if !existing.location.is_empty() {
                                existing.location.push_str("; ");
                            }
                            existing.location.push_str(&loc);
                        }
                    }
                }
                None => out.push(ListedJob {
                    url: self.posting_url(job.id),
                    external_id,
                    title: job.title,
                    location: locations.join("; "),
                }),
            }
        }
    }
}

#[async_trait]
impl SiteAdapter for GreenhouseAdapter {
    fn company(&self) -> &str {
        &self.company
    }

    async fn list_jobs(&self, filters: &TitleFilters) -> Result<Vec<ListedJob>> {
        let mut out = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = format!(
                "{}/v1/boards/{}/jobs?page={page}&per_page={PAGE_SIZE}",
                self.base_url, self.board
            );
            let body: BoardPage = http::get_json(&self.client, &url).await?;
            let fetched = body.jobs.len();
            tracing::debug!(company = %self.company, page, fetched, "board page listed");
            self.fold_page(body.jobs, filters, &mut out);
            if fetched < PAGE_SIZE {
                break;
            }
        }

        Ok(out)
    }

    async fn fetch_raw(&self, url: &str) -> Result<Bytes> {
        let body = http::get_bytes(&self.client, url).await?;
        // A well-formed response that isn't a posting document is a
        // content error, not a transport one.
        if serde_json::from_slice::<PostingBody>(&body).is_err() {
            return Err(Error::Format(format!("{url}: not a posting document")));
        }
        Ok(body)
    }

    fn parse_raw(&self, raw: &[u8]) -> Result<ParsedPosting> {
        let posting: PostingBody = serde_json::from_slice(raw)
            .map_err(|e| Error::Format(format!("posting JSON: {e}")))?;
        // The content field arrives entity-escaped; decode before
        // treating it as HTML.
        let content = html_escape::decode_html_entities(&posting.content);
        let (description, requirements) = split_sections(&html_to_text(&content));
        Ok(ParsedPosting {
            description,
            requirements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GreenhouseAdapter {
        GreenhouseAdapter::new("acme", "acmeco").with_base_url("https://gh.test")
    }

    const FEED: &str = r#"{
        "jobs": [
            {"id": 101, "title": "Senior Rust Engineer",
             "location": {"name": "Berlin"},
             "offices": [{"name": "Berlin"}, {"name": "Remote EU"}]},
            {"id": 101, "title": "Senior Rust Engineer",
             "location": {"name": "Amsterdam"},
             "offices": [{"name": "Amsterdam"}]},
            {"id": 102, "title": "Engineering Manager",
             "location": {"name": "NYC"}, "offices": []}
        ]
    }"#;

    #[test]
    fn test_fold_dedupes_and_aggregates_offices() {
        let page: BoardPage = serde_json::from_str(FEED).unwrap();
        let mut out = Vec::new();
        adapter().fold_page(page.jobs, &TitleFilters::accept_all(), &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].external_id, "101");
        assert_eq!(out[0].location, "Berlin; Remote EU; Amsterdam");
        assert_eq!(out[1].external_id, "102");
        assert_eq!(out[1].location, "NYC");
    }

    #[test]
    fn test_fold_applies_filters() {
        let page: BoardPage = serde_json::from_str(FEED).unwrap();
        let filters = TitleFilters::new(Some(vec!["engineer".into()]), Some(vec!["manager".into()]));
        let mut out = Vec::new();
        adapter().fold_page(page.jobs, &filters, &mut out);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Senior Rust Engineer");
    }

    #[test]
    fn test_listing_urls_point_at_posting_api() {
        let page: BoardPage = serde_json::from_str(FEED).unwrap();
        let mut out = Vec::new();
        adapter().fold_page(page.jobs, &TitleFilters::accept_all(), &mut out);
        assert_eq!(
            out[0].url,
            "https://gh.test/v1/boards/acmeco/jobs/101?content=true"
        );
    }

    #[test]
    fn test_parse_raw_decodes_escaped_content() {
        let raw = serde_json::json!({
            "id": 101,
            "content": "&lt;p&gt;Build the ingestion pipeline.&lt;/p&gt;\
                        &lt;h3&gt;Requirements&lt;/h3&gt;\
                        &lt;ul&gt;&lt;li&gt;Rust&lt;/li&gt;&lt;li&gt;Postgres&lt;/li&gt;&lt;/ul&gt;"
        });
        let parsed = adapter()
            .parse_raw(serde_json::to_vec(&raw).unwrap().as_slice())
            .unwrap();
        assert_eq!(parsed.description, "Build the ingestion pipeline.");
        assert_eq!(parsed.requirements, "Rust\nPostgres");
    }

    #[test]
    fn test_parse_raw_without_sections_keeps_empty_requirements() {
        let raw = serde_json::json!({"content": "&lt;p&gt;Only a blurb&lt;/p&gt;"});
        let parsed = adapter()
            .parse_raw(serde_json::to_vec(&raw).unwrap().as_slice())
            .unwrap();
        assert_eq!(parsed.description, "Only a blurb");
        assert_eq!(parsed.requirements, "");
    }

    #[test]
    fn test_parse_raw_rejects_non_posting_payload() {
        let err = adapter().parse_raw(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
