use chrono::{Local, NaiveDate};

use crate::{
    database::{
        queries::{QuotaQueries, UserQueries},
        Database,
    },
    errors::{AppError, Result},
    models::QuotaDecision,
};

/// Per-user, per-day call counter.
///
/// `check_and_admit` is a read-only check; the caller records usage with
/// `record` once the guarded operation has succeeded. Two concurrent requests
/// from one user can therefore both pass the check before either records,
/// which over-admits by at most the concurrency degree minus one.
#[derive(Clone)]
pub struct QuotaLedger {
    database: Database,
    default_limit: i64,
}

/// Server-local calendar day used as the quota bucket.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Unset and non-positive stored limits fall back to the default.
pub fn effective_limit(stored: Option<i64>, default_limit: i64) -> i64 {
    match stored {
        Some(limit) if limit > 0 => limit,
        _ => default_limit,
    }
}

impl QuotaLedger {
    pub fn new(database: Database, default_limit: i64) -> Self {
        Self {
            database,
            default_limit,
        }
    }

    pub fn default_limit(&self) -> i64 {
        self.default_limit
    }

    pub async fn daily_limit(&self, user_id: i64) -> Result<i64> {
        let stored = UserQueries::daily_limit(self.database.pool(), user_id).await?;

        Ok(effective_limit(stored.flatten(), self.default_limit))
    }

    pub async fn check_and_admit(&self, user_id: i64) -> Result<QuotaDecision> {
        self.check_and_admit_on(user_id, today()).await
    }

    pub async fn check_and_admit_on(&self, user_id: i64, day: NaiveDate) -> Result<QuotaDecision> {
        let limit = self.daily_limit(user_id).await?;
        let used = QuotaQueries::count_for_day(self.database.pool(), user_id, day).await?;

        Ok(QuotaDecision {
            admitted: used < limit,
            used,
            limit,
        })
    }

    pub async fn record(&self, user_id: i64, ip: &str) -> Result<()> {
        self.record_on(user_id, ip, today()).await
    }

    pub async fn record_on(&self, user_id: i64, ip: &str, day: NaiveDate) -> Result<()> {
        QuotaQueries::insert(self.database.pool(), user_id, ip, day).await
    }

    pub async fn usage_today(&self, user_id: i64) -> Result<i64> {
        QuotaQueries::count_for_day(self.database.pool(), user_id, today()).await
    }

    /// A non-positive limit resets the user to the default.
    pub async fn update_daily_limit(&self, user_id: i64, limit: i64) -> Result<()> {
        let limit = if limit <= 0 { self.default_limit } else { limit };

        if !UserQueries::update_daily_limit(self.database.pool(), user_id, limit).await? {
            return Err(AppError::NotFound);
        }

        tracing::info!(user_id, limit, "Daily limit updated");
        Ok(())
    }
}
