//! Adapter for Ashby-hosted boards.
//!
//! Ashby renders the board client-side and embeds the data the app
//! needs as `window.__appData = {...}` in the page HTML. Both listing
//! and parsing read that embedded blob; there is no separate JSON
//! endpoint to call.

use std::sync::LazyLock;

use async_trait::async_trait;
use bytes::Bytes;
use regex::Regex;
use serde::Deserialize;

use jobscout_core::adapter::SiteAdapter;
use jobscout_core::filters::TitleFilters;
use jobscout_core::job::{ListedJob, ParsedPosting};
use jobscout_core::{Error, Result};

use crate::html::{html_to_text, split_sections};
use crate::http;

const DEFAULT_BASE_URL: &str = "https://jobs.ashbyhq.com";

static APP_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)window\.__appData\s*=\s*(\{.*?\})\s*;?\s*</script>")
        .unwrap_or_else(|e| panic!("invalid app-data regex: {e}"))
});

pub struct AshbyAdapter {
    company: String,
    org: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct BoardData {
    #[serde(rename = "jobBoard")]
    job_board: JobBoard,
}

#[derive(Debug, Deserialize)]
struct JobBoard {
    #[serde(rename = "jobPostings", default)]
    job_postings: Vec<BoardPosting>,
}

#[derive(Debug, Deserialize)]
struct BoardPosting {
    id: String,
    title: String,
    #[serde(rename = "locationName", default)]
    location_name: Option<String>,
    #[serde(rename = "secondaryLocations", default)]
    secondary_locations: Vec<SecondaryLocation>,
}

#[derive(Debug, Deserialize)]
struct SecondaryLocation {
    #[serde(rename = "locationName", default)]
    location_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostingData {
    posting: PostingBody,
}

#[derive(Debug, Deserialize)]
struct PostingBody {
    #[serde(rename = "descriptionHtml", default)]
    description_html: String,
}

impl AshbyAdapter {
    pub fn new(company: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            org: org.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: http::client(),
        }
    }

    fn board_jobs(&self, html: &str, filters: &TitleFilters) -> Result<Vec<ListedJob>> {
        let data: BoardData = serde_json::from_str(extract_app_data(html)?)
            .map_err(|e| Error::Format(format!("board app data: {e}")))?;

        let mut out: Vec<ListedJob> = Vec::new();
        for posting in data.job_board.job_postings {
            if !filters.accepts(&posting.title) {
                continue;
            }

            let mut locations: Vec<String> = posting.location_name.into_iter().collect();
            locations.extend(
                posting
                    .secondary_locations
                    .into_iter()
                    .filter_map(|l| l.location_name),
            );

            if out.iter().any(|j| j.external_id == posting.id) {
                continue;
            }
            out.push(ListedJob {
                url: format!("{}/{}/{}", self.base_url, self.org, posting.id),
                external_id: posting.id,
                title: posting.title,
                location: locations.join("; "),
            });
        }
        Ok(out)
    }
}

/// Pull the embedded `window.__appData` JSON out of a page.
fn extract_app_data(html: &str) -> Result<&str> {
    APP_DATA
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| Error::Format("no embedded app data in page".into()))
}

#[async_trait]
impl SiteAdapter for AshbyAdapter {
    fn company(&self) -> &str {
        &self.company
    }

    async fn list_jobs(&self, filters: &TitleFilters) -> Result<Vec<ListedJob>> {
        let url = format!("{}/{}", self.base_url, self.org);
        let body = http::get_bytes(&self.client, &url).await?;
        self.board_jobs(&String::from_utf8_lossy(&body), filters)
    }

    async fn fetch_raw(&self, url: &str) -> Result<Bytes> {
        let body = http::get_bytes(&self.client, url).await?;
        if extract_app_data(&String::from_utf8_lossy(&body)).is_err() {
            return Err(Error::Format(format!("{url}: not a posting page")));
        }
        Ok(body)
    }

    fn parse_raw(&self, raw: &[u8]) -> Result<ParsedPosting> {
        let html = String::from_utf8_lossy(raw);
        let data: PostingData = serde_json::from_str(extract_app_data(&html)?)
            .map_err(|e| Error::Format(format!("posting app data: {e}")))?;

        let (description, requirements) =
            split_sections(&html_to_text(&data.posting.description_html));
        Ok(ParsedPosting {
            description,
            requirements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_page() -> String {
        let data = serde_json::json!({
            "jobBoard": {
                "jobPostings": [
                    {"id": "p-1", "title": "Platform Engineer",
                     "locationName": "SF",
                     "secondaryLocations": [{"locationName": "Remote US"}]},
                    {"id": "p-2", "title": "Recruiter", "locationName": "SF",
                     "secondaryLocations": []}
                ]
            }
        });
        format!(
            "<html><head><script>window.__appData = {data};</script></head><body></body></html>"
        )
    }

    #[test]
    fn test_board_jobs_from_embedded_data() {
        let adapter = AshbyAdapter::new("initech", "initech");
        let jobs = adapter
            .board_jobs(&board_page(), &TitleFilters::accept_all())
            .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].external_id, "p-1");
        assert_eq!(jobs[0].location, "SF; Remote US");
        assert_eq!(jobs[0].url, "https://jobs.ashbyhq.com/initech/p-1");
    }

    #[test]
    fn test_board_jobs_applies_filters() {
        let adapter = AshbyAdapter::new("initech", "initech");
        let filters = TitleFilters::new(None, Some(vec!["recruiter".into()]));
        let jobs = adapter.board_jobs(&board_page(), &filters).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Platform Engineer");
    }

    #[test]
    fn test_parse_raw_reads_embedded_posting() {
        let data = serde_json::json!({
            "posting": {
                "descriptionHtml": "<p>Run our data plane.</p><h2>Requirements</h2><ul><li>Go or Rust</li></ul>"
            }
        });
        let page = format!("<html><script>window.__appData = {data};</script></html>");
        let adapter = AshbyAdapter::new("initech", "initech");
        let parsed = adapter.parse_raw(page.as_bytes()).unwrap();
        assert_eq!(parsed.description, "Run our data plane.");
        assert_eq!(parsed.requirements, "Go or Rust");
    }

    #[test]
    fn test_missing_app_data_is_format_error() {
        let adapter = AshbyAdapter::new("initech", "initech");
        let err = adapter.parse_raw(b"<html><body>plain page</body></html>").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
