//! Run log repository: the debugging channel of record for a run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use jobscout_core::{RunId, UserId};

use crate::DbResult;

/// A log entry record from the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LogRecord {
    pub id: i64,
    pub run_id: i64,
    pub user_id: i64,
    pub logged_at: DateTime<Utc>,
    pub message: String,
}

#[async_trait]
pub trait LogRepo: Send + Sync {
    /// Append a log line for a run. Lines carry a `[run_id=N]` prefix
    /// so a shared downstream stream can filter server-side.
    async fn append(&self, run_id: RunId, user_id: UserId, message: &str) -> DbResult<()>;

    /// Page through a run's logs: entries at or after `since`, strictly
    /// after `after_id` when resuming from a token, oldest first.
    async fn fetch(
        &self,
        run_id: RunId,
        user_id: UserId,
        since: Option<DateTime<Utc>>,
        after_id: Option<i64>,
        limit: i64,
    ) -> DbResult<Vec<LogRecord>>;
}

/// PostgreSQL implementation of LogRepo.
pub struct PgLogRepo {
    pool: PgPool,
}

impl PgLogRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogRepo for PgLogRepo {
    async fn append(&self, run_id: RunId, user_id: UserId, message: &str) -> DbResult<()> {
        let line = format!("[run_id={run_id}] {message}");
        sqlx::query(
            r#"
            INSERT INTO run_log (run_id, user_id, logged_at, message)
            VALUES ($1, $2, NOW(), $3)
            "#,
        )
        .bind(run_id.as_i64())
        .bind(user_id.as_i64())
        .bind(line)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch(
        &self,
        run_id: RunId,
        user_id: UserId,
        since: Option<DateTime<Utc>>,
        after_id: Option<i64>,
        limit: i64,
    ) -> DbResult<Vec<LogRecord>> {
        let records = sqlx::query_as::<_, LogRecord>(
            r#"
            SELECT id, run_id, user_id, logged_at, message
            FROM run_log
            WHERE run_id = $1 AND user_id = $2
              AND ($3::timestamptz IS NULL OR logged_at >= $3)
              AND ($4::bigint IS NULL OR id > $4)
            ORDER BY id ASC
            LIMIT $5
            "#,
        )
        .bind(run_id.as_i64())
        .bind(user_id.as_i64())
        .bind(since)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
