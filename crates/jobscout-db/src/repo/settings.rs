//! Company settings repository.
//!
//! Settings are written by the (out-of-scope) settings surface; the
//! pipeline only reads the enabled rows for a user at run start.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use jobscout_core::UserId;
use jobscout_core::filters::TitleFilters;

use crate::DbResult;

/// One enabled company configuration for a user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanySettingRecord {
    pub user_id: i64,
    pub company: String,
    pub enabled: bool,
    pub include_titles: Vec<String>,
    pub exclude_titles: Vec<String>,
}

impl CompanySettingRecord {
    pub fn filters(&self) -> TitleFilters {
        TitleFilters::new(
            Some(self.include_titles.clone()),
            Some(self.exclude_titles.clone()),
        )
    }
}

#[async_trait]
pub trait SettingsRepo: Send + Sync {
    /// The user's enabled companies, in stable order.
    async fn enabled_for_user(&self, user_id: UserId) -> DbResult<Vec<CompanySettingRecord>>;
}

/// PostgreSQL implementation of SettingsRepo.
pub struct PgSettingsRepo {
    pool: PgPool,
}

impl PgSettingsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepo for PgSettingsRepo {
    async fn enabled_for_user(&self, user_id: UserId) -> DbResult<Vec<CompanySettingRecord>> {
        let records = sqlx::query_as::<_, CompanySettingRecord>(
            r#"
            SELECT user_id, company, enabled, include_titles, exclude_titles
            FROM company_setting
            WHERE user_id = $1 AND enabled
            ORDER BY company
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_normalize_at_the_boundary() {
        let record = CompanySettingRecord {
            user_id: 42,
            company: "acme".into(),
            enabled: true,
            include_titles: vec!["  Engineer ".into()],
            exclude_titles: vec![],
        };
        let filters = record.filters();
        assert!(filters.accepts("Senior engineer"));
        assert!(!filters.accepts("Product Manager"));
    }
}
