//! Job records: one tracked posting per (user, company, external_id).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, RunId, UserId};

/// Status of a job within its owning run.
///
/// `Pending` means "still being processed in this run"; the rest are
/// terminal for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    /// Parsed into structured fields this run.
    Ready,
    /// Content unchanged since the previous crawl; extraction skipped.
    Skipped,
    /// Present in a prior run's listing but not the current one.
    Expired,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Ready => "ready",
            JobStatus::Skipped => "skipped",
            JobStatus::Expired => "expired",
            JobStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "ready" => Ok(JobStatus::Ready),
            "skipped" => Ok(JobStatus::Skipped),
            "expired" => Ok(JobStatus::Expired),
            "error" => Ok(JobStatus::Error),
            other => Err(crate::Error::Format(format!("unknown job status: {other}"))),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// The most recent run that touched this row.
    pub run_id: Option<RunId>,
    pub user_id: UserId,
    pub company: String,
    /// The posting's identifier in the source company's system.
    pub external_id: String,
    pub url: String,
    pub status: JobStatus,
    pub title: String,
    pub location: String,
    pub description: Option<String>,
    pub requirements: Option<String>,
    /// 64-bit fingerprint of the last successfully fetched raw content.
    pub simhash: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of an adapter's listing: enough to upsert a job row and
/// enqueue a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedJob {
    pub external_id: String,
    pub title: String,
    pub location: String,
    pub url: String,
}

/// The two structured text fields an adapter extracts from raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedPosting {
    pub description: String,
    pub requirements: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_set() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Ready.is_terminal());
        assert!(JobStatus::Skipped.is_terminal());
        assert!(JobStatus::Expired.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Ready,
            JobStatus::Skipped,
            JobStatus::Expired,
            JobStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
    }
}
