//! Adapter for Lever-hosted boards.
//!
//! Listing is the flat postings JSON feed. Postings carry two
//! identifiers, the API id and the hosted-URL slug; the API id is the
//! stable one and wins, with the slug as a fallback for feeds that
//! omit it. Raw content is the hosted posting page HTML.

use async_trait::async_trait;
use bytes::Bytes;
use scraper::{Html, Selector};
use serde::Deserialize;

use jobscout_core::adapter::SiteAdapter;
use jobscout_core::filters::TitleFilters;
use jobscout_core::job::{ListedJob, ParsedPosting};
use jobscout_core::{Error, Result};

use crate::html::{html_to_text, split_sections};
use crate::http;

const DEFAULT_BASE_URL: &str = "https://api.lever.co";

pub struct LeverAdapter {
    company: String,
    site: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Posting {
    #[serde(default)]
    id: Option<String>,
    text: String,
    #[serde(default)]
    categories: Categories,
    #[serde(rename = "hostedUrl")]
    hosted_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct Categories {
    #[serde(default)]
    location: Option<String>,
    #[serde(rename = "allLocations", default)]
    all_locations: Vec<String>,
}

impl LeverAdapter {
    pub fn new(company: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            site: site.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: http::client(),
        }
    }

    fn fold_postings(postings: Vec<Posting>, filters: &TitleFilters) -> Vec<ListedJob> {
        let mut out: Vec<ListedJob> = Vec::new();

        for posting in postings {
            if !filters.accepts(&posting.text) {
                continue;
            }

            let Some(external_id) = external_id(&posting) else {
                continue;
            };

            let mut locations = posting.categories.all_locations.clone();
            if locations.is_empty() {
                locations.extend(posting.categories.location.clone());
            }

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
                    external_id,
                    title: posting.text,
                    location: locations.join("; "),
                    url: posting.hosted_url,
                }),
            }
        }

        out
    }
}

/// The API id when present, otherwise the hosted-URL slug.
fn external_id(posting: &Posting) -> Option<String> {
    if let Some(id) = &posting.id {
        if !id.is_empty() {
            return Some(id.clone());
        }
    }
    posting
        .hosted_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl SiteAdapter for LeverAdapter {
    fn company(&self) -> &str {
        &self.company
    }

    async fn list_jobs(&self, filters: &TitleFilters) -> Result<Vec<ListedJob>> {
        let url = format!("{}/v0/postings/{}?mode=json", self.base_url, self.site);
        let postings: Vec<Posting> = http::get_json(&self.client, &url).await?;
        Ok(Self::fold_postings(postings, filters))
    }

    async fn fetch_raw(&self, url: &str) -> Result<Bytes> {
        let body = http::get_bytes(&self.client, url).await?;
        let text = String::from_utf8_lossy(&body);
        if !text.contains("posting") {
            return Err(Error::Format(format!("{url}: not a posting page")));
        }
        Ok(body)
    }

    fn parse_raw(&self, raw: &[u8]) -> Result<ParsedPosting> {
        let document = Html::parse_document(&String::from_utf8_lossy(raw));

        let description_sel = selector("div[data-qa=\"job-description\"]")?;
        let requirements_sel = selector("div.posting-requirements")?;
        let container_sel = selector("div.posting, div.content")?;

        let description: String = document
            .select(&description_sel)
            .map(|el| html_to_text(&el.inner_html()))
            .collect::<Vec<_>>()
            .join("\n");
        let requirements: String = document
            .select(&requirements_sel)
            .map(|el| html_to_text(&el.inner_html()))
            .collect::<Vec<_>>()
            .join("\n");

        if !description.is_empty() || !requirements.is_empty() {
            return Ok(ParsedPosting {
                description,
                requirements,
            });
        }

        // Older board themes don't carry the data-qa markers; fall
        // back to the posting container and split on headings.
        let container = document
            .select(&container_sel)
            .next()
            .ok_or_else(|| Error::Format("no posting container in page".into()))?;
        let (description, requirements) = split_sections(&html_to_text(&container.inner_html()));
        Ok(ParsedPosting {
            description,
            requirements,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Internal(format!("selector {css}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"[
        {"id": "a1b2", "text": "Backend Engineer",
         "categories": {"location": "Toronto", "allLocations": ["Toronto", "Remote"]},
         "hostedUrl": "https://jobs.lever.co/globex/a1b2"},
        {"text": "Backend Engineer",
         "categories": {"location": "Lisbon"},
         "hostedUrl": "https://jobs.lever.co/globex/c3d4"},
        {"id": "a1b2", "text": "Backend Engineer",
         "categories": {"location": "Berlin"},
         "hostedUrl": "https://jobs.lever.co/globex/a1b2"}
    ]"#;

    #[test]
    fn test_fold_dedupes_by_id_and_aggregates_locations() {
        let postings: Vec<Posting> = serde_json::from_str(FEED).unwrap();
        let jobs = LeverAdapter::fold_postings(postings, &TitleFilters::accept_all());

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].external_id, "a1b2");
        assert_eq!(jobs[0].location, "Toronto; Remote; Berlin");
        // No API id: the slug stands in.
        assert_eq!(jobs[1].external_id, "c3d4");
        assert_eq!(jobs[1].location, "Lisbon");
    }

    #[test]
    fn test_fold_applies_filters() {
        let postings: Vec<Posting> = serde_json::from_str(FEED).unwrap();
        let filters = TitleFilters::new(Some(vec!["designer".into()]), None);
        assert!(LeverAdapter::fold_postings(postings, &filters).is_empty());
    }

    const POSTING_PAGE: &str = r#"<html><body><div class="posting">
        <div data-qa="job-description"><p>Own the crawl tier.</p></div>
        <div class="posting-requirements"><ul><li>Rust</li><li>Tokio</li></ul></div>
    </div></body></html>"#;

    #[test]
    fn test_parse_raw_reads_marked_sections() {
        let adapter = LeverAdapter::new("globex", "globex");
        let parsed = adapter.parse_raw(POSTING_PAGE.as_bytes()).unwrap();
        assert_eq!(parsed.description, "Own the crawl tier.");
        assert_eq!(parsed.requirements, "Rust\nTokio");
    }

    #[test]
    fn test_parse_raw_falls_back_to_container_split() {
        let page = r#"<html><body><div class="posting">
            <p>We index career pages.</p>
            <h3>Requirements</h3>
            <ul><li>Postgres</li></ul>
        </div></body></html>"#;
        let adapter = LeverAdapter::new("globex", "globex");
        let parsed = adapter.parse_raw(page.as_bytes()).unwrap();
        assert_eq!(parsed.description, "We index career pages.");
        assert_eq!(parsed.requirements, "Postgres");
    }

    #[test]
    fn test_parse_raw_rejects_unrecognizable_page() {
        let adapter = LeverAdapter::new("globex", "globex");
        let err = adapter.parse_raw(b"<html><body>404</body></html>").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
