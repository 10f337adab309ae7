//! Run records and the run status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RunId, UserId};

/// Status of an ingestion run.
///
/// May only advance: `Pending → Initializing → Ingesting →
/// {Finished|Error|Aborted}`. `Aborted` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created by the controller, initializer not yet started.
    Pending,
    /// Initializer is sourcing URLs and seeding job rows.
    Initializing,
    /// Crawl messages enqueued; workers are draining them.
    Ingesting,
    /// All jobs reached terminal status.
    Finished,
    /// Fatal initializer failure.
    Error,
    /// Aborted by the owner.
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Finished | RunStatus::Error | RunStatus::Aborted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Initializing => "initializing",
            RunStatus::Ingesting => "ingesting",
            RunStatus::Finished => "finished",
            RunStatus::Error => "error",
            RunStatus::Aborted => "aborted",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "initializing" => Ok(RunStatus::Initializing),
            "ingesting" => Ok(RunStatus::Ingesting),
            "finished" => Ok(RunStatus::Finished),
            "error" => Ok(RunStatus::Error),
            "aborted" => Ok(RunStatus::Aborted),
            other => Err(crate::Error::Format(format!("unknown run status: {other}"))),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot counters written when a run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub total_jobs: i64,
    pub jobs_ready: i64,
    pub jobs_skipped: i64,
    pub jobs_expired: i64,
    pub jobs_failed: i64,
}

/// One user-initiated end-to-end ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub user_id: UserId,
    pub status: RunStatus,
    /// Present iff the run reached `Finished`.
    pub counters: Option<RunCounters>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Run-level flags, currently `{"force": bool}`.
    pub metadata: serde_json::Value,
}

impl Run {
    /// The `force` flag disables SimHash skipping for the whole run.
    pub fn force(&self) -> bool {
        self.metadata
            .get("force")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_set() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Initializing.is_terminal());
        assert!(!RunStatus::Ingesting.is_terminal());
        assert!(RunStatus::Finished.is_terminal());
        assert!(RunStatus::Error.is_terminal());
        assert!(RunStatus::Aborted.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            RunStatus::Pending,
            RunStatus::Initializing,
            RunStatus::Ingesting,
            RunStatus::Finished,
            RunStatus::Error,
            RunStatus::Aborted,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("running".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_force_flag() {
        let run = Run {
            id: RunId::new(1),
            user_id: UserId::new(42),
            status: RunStatus::Pending,
            counters: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error_message: None,
            metadata: serde_json::json!({"force": true}),
        };
        assert!(run.force());

        let run = Run {
            metadata: serde_json::json!({}),
            ..run
        };
        assert!(!run.force());
    }
}
