//! Queue message wire shapes.
//!
//! Messages are JSON on the bus, immutable once enqueued, and expected
//! to be delivered more than once; both workers' effects are
//! idempotent per job.

use serde::{Deserialize, Serialize};

use crate::{JobId, RunId, UserId};

/// Identity context carried through the async hops so every mutation
/// stays scoped to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: UserId,
}

/// One unit of crawl work: fetch a single posting page and decide
/// whether it changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlMessage {
    pub run_id: RunId,
    pub job_id: JobId,
    pub company: String,
    pub url: String,
    /// Fingerprint from the previous successful crawl, if any.
    pub prior_simhash: Option<u64>,
    /// Run-level flag disabling the skip decision.
    pub force: bool,
    pub user_context: UserContext,
}

/// One unit of extraction work: parse a stored raw page into
/// structured fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractMessage {
    pub run_id: RunId,
    pub job_id: JobId,
    pub company: String,
    pub raw_content_path: String,
    pub user_context: UserContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_message_round_trip() {
        let msg = CrawlMessage {
            run_id: RunId::new(9),
            job_id: JobId::new(101),
            company: "acme".into(),
            url: "https://boards.example.com/acme/jobs/101".into(),
            prior_simhash: Some(0xDEAD_BEEF),
            force: false,
            user_context: UserContext {
                user_id: UserId::new(42),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: CrawlMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_extract_message_round_trip() {
        let msg = ExtractMessage {
            run_id: RunId::new(9),
            job_id: JobId::new(101),
            company: "acme".into(),
            raw_content_path: "raw/acme/0a1b2c".into(),
            user_context: UserContext {
                user_id: UserId::new(42),
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ExtractMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_missing_prior_simhash_is_null() {
        let msg = CrawlMessage {
            run_id: RunId::new(1),
            job_id: JobId::new(2),
            company: "acme".into(),
            url: "https://example.com".into(),
            prior_simhash: None,
            force: true,
            user_context: UserContext {
                user_id: UserId::new(3),
            },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value["prior_simhash"].is_null());
        assert_eq!(value["force"], serde_json::json!(true));
    }
}
