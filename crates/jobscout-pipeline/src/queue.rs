//! Message queues backed by PostgreSQL.
//!
//! At-least-once delivery: claiming a message pushes its `visible_at`
//! past the visibility timeout instead of removing it, so a worker
//! that crashes mid-message loses nothing: the message reappears when
//! the timeout lapses. Acknowledging deletes the row. A message whose
//! deliveries are exhausted is parked as `dead` rather than redelivered
//! forever.
//!
//! The crawl queue additionally serializes per company: a message is
//! only claimable while no other message for the same company is in
//! flight, which keeps a single site from being hit in parallel.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use sqlx::Row;
use tracing::warn;

use jobscout_db::DbResult;

use crate::PipelineResult;

/// Deliveries after which a message is dead-lettered.
pub const MAX_DELIVERIES: i32 = 3;

/// How long a claimed message stays invisible. Must exceed the longest
/// worker execution.
pub const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(120);

/// Redelivery delay applied when the upstream rate-limits us.
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// One claimed message. `delivery_count` includes this delivery.
#[derive(Debug, Clone)]
pub struct Delivery<T> {
    pub id: i64,
    pub delivery_count: i32,
    pub message: T,
}

impl<T> Delivery<T> {
    /// Whether this is the message's last chance before dead-letter.
    pub fn final_attempt(&self) -> bool {
        self.delivery_count >= MAX_DELIVERIES
    }
}

/// A PostgreSQL-backed queue over one of the two queue tables.
pub struct PgQueue {
    pool: PgPool,
    table: &'static str,
    per_company_ordering: bool,
}

/// The crawl queue: per-company serialization.
pub fn crawl_queue(pool: PgPool) -> PgQueue {
    PgQueue {
        pool,
        table: "crawl_queue",
        per_company_ordering: true,
    }
}

/// The extract queue: unordered, concurrency bounded by the worker
/// pool instead of the queue.
pub fn extract_queue(pool: PgPool) -> PgQueue {
    PgQueue {
        pool,
        table: "extract_queue",
        per_company_ordering: false,
    }
}

impl PgQueue {
    /// Enqueue a message, immediately visible.
    pub async fn enqueue<T: Serialize>(&self, company: &str, message: &T) -> PipelineResult<i64> {
        let payload = serde_json::to_value(message)?;
        let sql = format!(
            "INSERT INTO {} (company, payload, status, visible_at, created_at)
             VALUES ($1, $2, 'queued', NOW(), NOW())
             RETURNING id",
            self.table
        );
        let id: i64 = sqlx::query_scalar(&sql)
            .bind(company)
            .bind(payload)
            .fetch_one(&self.pool)
            .await
            .map_err(jobscout_db::DbError::from)?;
        Ok(id)
    }

    /// Claim the oldest visible message, if any.
    ///
    /// Uses SKIP LOCKED so concurrent workers never contend on the same
    /// row. Exhausted messages encountered on the way are buried first.
    pub async fn claim<T: DeserializeOwned>(&self) -> PipelineResult<Option<Delivery<T>>> {
        let buried = self.bury_exhausted().await?;
        if buried > 0 {
            warn!(queue = self.table, buried, "dead-lettered exhausted messages");
        }

        let ordering_guard = if self.per_company_ordering {
            format!(
                "AND NOT EXISTS (
                     SELECT 1 FROM {} f
                     WHERE f.company = q.company
                       AND f.status = 'queued'
                       AND f.visible_at > NOW()
                 )",
                self.table
            )
        } else {
            String::new()
        };
        let sql = format!(
            "UPDATE {table}
             SET visible_at = NOW() + ($1 * INTERVAL '1 second'),
                 delivery_count = delivery_count + 1
             WHERE id = (
                 SELECT q.id FROM {table} q
                 WHERE q.status = 'queued'
                   AND q.visible_at <= NOW()
                   {ordering_guard}
                 ORDER BY q.id
                 FOR UPDATE SKIP LOCKED
                 LIMIT 1
             )
             RETURNING id, payload, delivery_count",
            table = self.table,
        );

        let row = sqlx::query(&sql)
            .bind(VISIBILITY_TIMEOUT.as_secs() as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(jobscout_db::DbError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = row.try_get("id").map_err(jobscout_db::DbError::from)?;
        let payload: serde_json::Value = row
            .try_get("payload")
            .map_err(jobscout_db::DbError::from)?;
        let delivery_count: i32 = row
            .try_get("delivery_count")
            .map_err(jobscout_db::DbError::from)?;
        let message: T = serde_json::from_value(payload)?;

        Ok(Some(Delivery {
            id,
            delivery_count,
            message,
        }))
    }

    /// Acknowledge a delivery: the message is done and removed.
    pub async fn ack(&self, id: i64) -> DbResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Make an in-flight message visible again after `backoff`, without
    /// counting a failed delivery against it. Used for rate limits.
    pub async fn delay(&self, id: i64, backoff: Duration) -> DbResult<()> {
        let sql = format!(
            "UPDATE {}
             SET visible_at = NOW() + ($2 * INTERVAL '1 second'),
                 delivery_count = delivery_count - 1
             WHERE id = $1",
            self.table
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(backoff.as_secs() as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Park messages that came back after exhausting their deliveries.
    async fn bury_exhausted(&self) -> DbResult<u64> {
        let sql = format!(
            "UPDATE {}
             SET status = 'dead'
             WHERE status = 'queued' AND visible_at <= NOW() AND delivery_count >= $1",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(MAX_DELIVERIES)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_attempt_threshold() {
        let delivery = Delivery {
            id: 1,
            delivery_count: 1,
            message: (),
        };
        assert!(!delivery.final_attempt());

        let delivery = Delivery {
            delivery_count: MAX_DELIVERIES,
            ..delivery
        };
        assert!(delivery.final_attempt());
    }

    #[test]
    fn test_visibility_exceeds_backoff() {
        // Redelivery-after-backoff must not race the visibility window.
        assert!(VISIBILITY_TIMEOUT > RATE_LIMIT_BACKOFF);
    }
}
