//! Job repository.
//!
//! Job rows are keyed by `(user_id, company, external_id)` and never
//! deleted; runs mutate them in place so history survives across runs.
//! Terminal-status writes are guarded by `run_id` so a redelivered
//! message from an old run cannot clobber a row a newer run owns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use jobscout_core::job::{Job, JobStatus, ListedJob};
use jobscout_core::{JobId, RunId, UserId};

use crate::{DbError, DbResult};

/// A job record in the database. `simhash` is the 64-bit fingerprint
/// bit-cast into the signed column type.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRecord {
    pub id: i64,
    pub run_id: Option<i64>,
    pub user_id: i64,
    pub company: String,
    pub external_id: String,
    pub url: String,
    pub status: String,
    pub title: String,
    pub location: String,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub simhash: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn job_status(&self) -> DbResult<JobStatus> {
        self.status
            .parse()
            .map_err(|_| DbError::Corrupt(format!("job {} status `{}`", self.id, self.status)))
    }

    pub fn into_job(self) -> DbResult<Job> {
        let status = self.job_status()?;
        Ok(Job {
            id: JobId::new(self.id),
            run_id: self.run_id.map(RunId::new),
            user_id: UserId::new(self.user_id),
            company: self.company,
            external_id: self.external_id,
            url: self.url,
            status,
            title: self.title,
            location: self.location,
            description: self.description,
            requirements: self.requirements,
            simhash: self.simhash.map(simhash_from_db),
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Fingerprints are u64 in the domain and BIGINT in the store; the
/// cast is a bit-for-bit reinterpretation.
pub fn simhash_to_db(fingerprint: u64) -> i64 {
    fingerprint as i64
}

pub fn simhash_from_db(raw: i64) -> u64 {
    raw as u64
}

#[async_trait]
pub trait JobRepo: Send + Sync {
    /// Insert or refresh a job row from one listing entry: the row
    /// joins the current run as `pending` with title/location/url
    /// updated, while `simhash`, `description`, and `requirements`
    /// survive the conflict (they remain valid until overwritten).
    async fn upsert_pending(
        &self,
        user_id: UserId,
        run_id: RunId,
        company: &str,
        listed: &ListedJob,
    ) -> DbResult<JobRecord>;

    /// Expire this user+company's jobs that were not listed this run.
    /// Rows already expired keep their previous attachment; everything
    /// else joins the current run as `expired`. Returns the number of
    /// rows expired.
    async fn expire_missing(
        &self,
        user_id: UserId,
        run_id: RunId,
        company: &str,
        listed_ids: &[i64],
    ) -> DbResult<u64>;

    async fn get(&self, id: JobId) -> DbResult<JobRecord>;

    /// All jobs attached to a run, ordered by company then external id.
    async fn list_for_run(&self, run_id: RunId) -> DbResult<Vec<JobRecord>>;

    async fn count_pending(&self, run_id: RunId) -> DbResult<i64>;

    /// Crawl succeeded and content is unchanged: refresh the
    /// fingerprint, mark `skipped`, clear any stale error.
    async fn mark_skipped(&self, id: JobId, run_id: RunId, simhash: u64) -> DbResult<()>;

    /// Crawl succeeded and content changed: refresh the fingerprint,
    /// leave the status `pending` for the extractor.
    async fn update_simhash(&self, id: JobId, run_id: RunId, simhash: u64) -> DbResult<()>;

    /// Extraction succeeded: store the structured fields, mark `ready`.
    async fn mark_ready(
        &self,
        id: JobId,
        run_id: RunId,
        description: &str,
        requirements: &str,
    ) -> DbResult<()>;

    async fn mark_error(&self, id: JobId, run_id: RunId, message: &str) -> DbResult<()>;
}

/// PostgreSQL implementation of JobRepo.
pub struct PgJobRepo {
    pool: PgPool,
}

impl PgJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepo for PgJobRepo {
    async fn upsert_pending(
        &self,
        user_id: UserId,
        run_id: RunId,
        company: &str,
        listed: &ListedJob,
    ) -> DbResult<JobRecord> {
        let record = sqlx::query_as::<_, JobRecord>(
            r#"
            INSERT INTO job (user_id, run_id, company, external_id, url, status,
                             title, location, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, NOW(), NOW())
            ON CONFLICT (user_id, company, external_id) DO UPDATE SET
                run_id = EXCLUDED.run_id,
                status = 'pending',
                url = EXCLUDED.url,
                title = EXCLUDED.title,
                location = EXCLUDED.location,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id.as_i64())
        .bind(run_id.as_i64())
        .bind(company)
        .bind(&listed.external_id)
        .bind(&listed.url)
        .bind(&listed.title)
        .bind(&listed.location)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn expire_missing(
        &self,
        user_id: UserId,
        run_id: RunId,
        company: &str,
        listed_ids: &[i64],
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE job
            SET status = 'expired', run_id = $2, updated_at = NOW()
            WHERE user_id = $1 AND company = $3
              AND NOT (id = ANY($4))
              AND status <> 'expired'
            "#,
        )
        .bind(user_id.as_i64())
        .bind(run_id.as_i64())
        .bind(company)
        .bind(listed_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn get(&self, id: JobId) -> DbResult<JobRecord> {
        let record = sqlx::query_as::<_, JobRecord>("SELECT * FROM job WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))?;
        Ok(record)
    }

    async fn list_for_run(&self, run_id: RunId) -> DbResult<Vec<JobRecord>> {
        let records = sqlx::query_as::<_, JobRecord>(
            "SELECT * FROM job WHERE run_id = $1 ORDER BY company, external_id",
        )
        .bind(run_id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn count_pending(&self, run_id: RunId) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM job WHERE run_id = $1 AND status = 'pending'",
        )
        .bind(run_id.as_i64())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_skipped(&self, id: JobId, run_id: RunId, simhash: u64) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE job
            SET status = 'skipped', simhash = $3, error_message = NULL, updated_at = NOW()
            WHERE id = $1 AND run_id = $2
            "#,
        )
        .bind(id.as_i64())
        .bind(run_id.as_i64())
        .bind(simhash_to_db(simhash))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_simhash(&self, id: JobId, run_id: RunId, simhash: u64) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE job
            SET simhash = $3, updated_at = NOW()
            WHERE id = $1 AND run_id = $2
            "#,
        )
        .bind(id.as_i64())
        .bind(run_id.as_i64())
        .bind(simhash_to_db(simhash))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_ready(
        &self,
        id: JobId,
        run_id: RunId,
        description: &str,
        requirements: &str,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE job
            SET status = 'ready', description = $3, requirements = $4,
                error_message = NULL, updated_at = NOW()
            WHERE id = $1 AND run_id = $2
            "#,
        )
        .bind(id.as_i64())
        .bind(run_id.as_i64())
        .bind(description)
        .bind(requirements)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_error(&self, id: JobId, run_id: RunId, message: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE job
            SET status = 'error', error_message = $3, updated_at = NOW()
            WHERE id = $1 AND run_id = $2
            "#,
        )
        .bind(id.as_i64())
        .bind(run_id.as_i64())
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simhash_cast_round_trip() {
        for fingerprint in [0u64, 1, u64::MAX, 0x8000_0000_0000_0000, 0xDEAD_BEEF_CAFE_F00D] {
            assert_eq!(simhash_from_db(simhash_to_db(fingerprint)), fingerprint);
        }
    }

    #[test]
    fn test_high_bit_fingerprint_is_negative_in_store() {
        // The top bit lands in the sign; storage only needs the cast
        // to round-trip, which it does.
        assert!(simhash_to_db(u64::MAX) < 0);
    }

    #[test]
    fn test_record_status_parse() {
        let record = JobRecord {
            id: 1,
            run_id: Some(9),
            user_id: 42,
            company: "acme".into(),
            external_id: "A1".into(),
            url: "https://example.com".into(),
            status: "skipped".into(),
            title: "Engineer".into(),
            location: "Remote".into(),
            description: None,
            requirements: None,
            simhash: Some(simhash_to_db(7)),
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let job = record.into_job().unwrap();
        assert_eq!(job.status, JobStatus::Skipped);
        assert_eq!(job.simhash, Some(7));
    }
}
