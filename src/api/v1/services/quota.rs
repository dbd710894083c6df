use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::errors::AppError;

/// Default daily allowance of a YouTube Data API project.
pub const DAILY_QUOTA_LIMIT: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaUsage {
    pub day: String,
    pub quota_used: i64,
    pub daily_limit: i64,
    pub remaining: i64,
}

impl QuotaUsage {
    fn new(day: NaiveDate, quota_used: i64) -> Self {
        Self {
            day: day_key(day),
            quota_used,
            daily_limit: DAILY_QUOTA_LIMIT,
            remaining: (DAILY_QUOTA_LIMIT - quota_used).max(0),
        }
    }
}

/// Per-day counter of YouTube API units spent, shared by every sync.
#[derive(Clone, Debug)]
pub struct QuotaTracker {
    db: SqlitePool,
}

impl QuotaTracker {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn track(&self, units: i64) -> Result<QuotaUsage, AppError> {
        self.track_on(Utc::now().date_naive(), units).await
    }

    #[tracing::instrument(name = "Track API quota", skip(self))]
    pub async fn track_on(&self, day: NaiveDate, units: i64) -> Result<QuotaUsage, AppError> {
        if units < 0 {
            return Err(AppError::Validation("Quota units must not be negative".to_string()));
        }

        let quota_used = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO api_quota_usage (day, quota_used)
               VALUES (?1, ?2)
               ON CONFLICT (day) DO UPDATE SET quota_used = api_quota_usage.quota_used + excluded.quota_used
               RETURNING quota_used"#,
        )
        .bind(day_key(day))
        .bind(units)
        .fetch_one(&self.db)
        .await?;

        if quota_used > DAILY_QUOTA_LIMIT {
            tracing::warn!("YouTube quota for {} exceeded: {} units used", day, quota_used);
        }

        Ok(QuotaUsage::new(day, quota_used))
    }

    pub async fn usage_for(&self, day: NaiveDate) -> Result<QuotaUsage, AppError> {
        let quota_used = sqlx::query_scalar::<_, i64>(
            "SELECT quota_used FROM api_quota_usage WHERE day = ?1",
        )
        .bind(day_key(day))
        .fetch_optional(&self.db)
        .await?
        .unwrap_or(0);

        Ok(QuotaUsage::new(day, quota_used))
    }

    pub async fn current_usage(&self) -> Result<QuotaUsage, AppError> {
        self.usage_for(Utc::now().date_naive()).await
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
