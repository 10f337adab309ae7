//! Run repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use jobscout_core::run::{Run, RunCounters, RunStatus};
use jobscout_core::{RunId, UserId};

use crate::{DbError, DbResult};

/// A run record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RunRecord {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub total_jobs: Option<i64>,
    pub jobs_ready: Option<i64>,
    pub jobs_skipped: Option<i64>,
    pub jobs_expired: Option<i64>,
    pub jobs_failed: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub run_metadata: serde_json::Value,
}

impl RunRecord {
    pub fn run_status(&self) -> DbResult<RunStatus> {
        self.status
            .parse()
            .map_err(|_| DbError::Corrupt(format!("run {} status `{}`", self.id, self.status)))
    }

    pub fn into_run(self) -> DbResult<Run> {
        let status = self.run_status()?;
        let counters = match (
            self.total_jobs,
            self.jobs_ready,
            self.jobs_skipped,
            self.jobs_expired,
            self.jobs_failed,
        ) {
            (Some(total_jobs), Some(jobs_ready), Some(jobs_skipped), Some(jobs_expired), Some(jobs_failed)) => {
                Some(RunCounters {
                    total_jobs,
                    jobs_ready,
                    jobs_skipped,
                    jobs_expired,
                    jobs_failed,
                })
            }
            _ => None,
        };
        Ok(Run {
            id: RunId::new(self.id),
            user_id: UserId::new(self.user_id),
            status,
            counters,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error_message: self.error_message,
            metadata: self.run_metadata,
        })
    }
}

#[async_trait]
pub trait RunRepo: Send + Sync {
    /// Create a pending run for a user. Fails with `Duplicate` if the
    /// user already has a non-terminal run (partial unique index).
    async fn create(&self, user_id: UserId, metadata: serde_json::Value) -> DbResult<RunRecord>;

    async fn get(&self, id: RunId) -> DbResult<RunRecord>;

    /// Ownership-scoped read: a run belonging to someone else is
    /// indistinguishable from a missing one.
    async fn get_owned(&self, id: RunId, user_id: UserId) -> DbResult<RunRecord>;

    /// The user's non-terminal run, if any.
    async fn current_for_user(&self, user_id: UserId) -> DbResult<Option<RunRecord>>;

    /// Conditionally advance `from → to`. Returns false if the run was
    /// not in `from` (raced with abort or a concurrent advance).
    async fn advance(&self, id: RunId, from: RunStatus, to: RunStatus) -> DbResult<bool>;

    /// Move a non-terminal run to `error` with a message.
    async fn mark_error(&self, id: RunId, message: &str) -> DbResult<bool>;

    /// Move a non-terminal run to `aborted`, scoped to its owner.
    async fn abort(&self, id: RunId, user_id: UserId) -> DbResult<bool>;

    /// Promote `ingesting → finished`, computing the snapshot counters
    /// from the job table in the same statement. The status guard makes
    /// concurrent finalizations harmless no-ops; returns true only for
    /// the winner.
    async fn finalize(&self, id: RunId) -> DbResult<bool>;
}

/// PostgreSQL implementation of RunRepo.
pub struct PgRunRepo {
    pool: PgPool,
}

impl PgRunRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRepo for PgRunRepo {
    async fn create(&self, user_id: UserId, metadata: serde_json::Value) -> DbResult<RunRecord> {
        let record = sqlx::query_as::<_, RunRecord>(
            r#"
            INSERT INTO run (user_id, status, run_metadata, created_at)
            VALUES ($1, 'pending', $2, NOW())
            RETURNING *
            "#,
        )
        .bind(user_id.as_i64())
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_sqlx(e, &format!("active run for user {user_id}")))?;
        Ok(record)
    }

    async fn get(&self, id: RunId) -> DbResult<RunRecord> {
        let record = sqlx::query_as::<_, RunRecord>("SELECT * FROM run WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("run {id}")))?;
        Ok(record)
    }

    async fn get_owned(&self, id: RunId, user_id: UserId) -> DbResult<RunRecord> {
        let record =
            sqlx::query_as::<_, RunRecord>("SELECT * FROM run WHERE id = $1 AND user_id = $2")
                .bind(id.as_i64())
                .bind(user_id.as_i64())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::NotFound(format!("run {id}")))?;
        Ok(record)
    }

    async fn current_for_user(&self, user_id: UserId) -> DbResult<Option<RunRecord>> {
        let record = sqlx::query_as::<_, RunRecord>(
            r#"
            SELECT * FROM run
            WHERE user_id = $1 AND status NOT IN ('finished', 'error', 'aborted')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn advance(&self, id: RunId, from: RunStatus, to: RunStatus) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE run
            SET status = $3,
                started_at = CASE WHEN $3 = 'initializing' THEN NOW() ELSE started_at END
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id.as_i64())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_error(&self, id: RunId, message: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE run
            SET status = 'error', error_message = $2, finished_at = NOW()
            WHERE id = $1 AND status NOT IN ('finished', 'error', 'aborted')
            "#,
        )
        .bind(id.as_i64())
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn abort(&self, id: RunId, user_id: UserId) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE run
            SET status = 'aborted', finished_at = NOW()
            WHERE id = $1 AND user_id = $2
              AND status NOT IN ('finished', 'error', 'aborted')
            "#,
        )
        .bind(id.as_i64())
        .bind(user_id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn finalize(&self, id: RunId) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE run
            SET status = 'finished',
                finished_at = NOW(),
                total_jobs = c.total,
                jobs_ready = c.ready,
                jobs_skipped = c.skipped,
                jobs_expired = c.expired,
                jobs_failed = c.failed
            FROM (
                SELECT
                    COUNT(*) FILTER (WHERE status IN ('ready', 'skipped', 'expired', 'error')) AS total,
                    COUNT(*) FILTER (WHERE status = 'ready') AS ready,
                    COUNT(*) FILTER (WHERE status = 'skipped') AS skipped,
                    COUNT(*) FILTER (WHERE status = 'expired') AS expired,
                    COUNT(*) FILTER (WHERE status = 'error') AS failed
                FROM job
                WHERE run_id = $1
            ) AS c
            WHERE run.id = $1 AND run.status = 'ingesting'
            "#,
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: &str) -> RunRecord {
        RunRecord {
            id: 1,
            user_id: 42,
            status: status.to_string(),
            total_jobs: None,
            jobs_ready: None,
            jobs_skipped: None,
            jobs_expired: None,
            jobs_failed: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error_message: None,
            run_metadata: serde_json::json!({"force": false}),
        }
    }

    #[test]
    fn test_into_run_without_counters() {
        let run = record("ingesting").into_run().unwrap();
        assert_eq!(run.status, RunStatus::Ingesting);
        assert!(run.counters.is_none());
        assert!(!run.force());
    }

    #[test]
    fn test_into_run_with_counters() {
        let mut rec = record("finished");
        rec.total_jobs = Some(4);
        rec.jobs_ready = Some(3);
        rec.jobs_skipped = Some(1);
        rec.jobs_expired = Some(0);
        rec.jobs_failed = Some(0);

        let run = rec.into_run().unwrap();
        let counters = run.counters.unwrap();
        assert_eq!(counters.total_jobs, 4);
        assert_eq!(counters.jobs_ready, 3);
        assert_eq!(counters.jobs_skipped, 1);
    }

    #[test]
    fn test_corrupt_status_is_an_error() {
        assert!(matches!(
            record("running").into_run(),
            Err(DbError::Corrupt(_))
        ));
    }
}
