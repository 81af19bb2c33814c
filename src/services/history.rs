use crate::{
    database::{queries::HistoryQueries, Database},
    errors::Result,
    models::OcrRecord,
};

/// Bounded per-user log of recognised texts.
#[derive(Clone)]
pub struct HistoryStore {
    database: Database,
    limit: i64,
}

impl HistoryStore {
    pub fn new(database: Database, limit: i64) -> Self {
        Self {
            database,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Empty texts are skipped. Older rows beyond the cap are pruned.
    pub async fn append(&self, user_id: i64, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        let pool = self.database.pool();
        HistoryQueries::insert(pool, user_id, text).await?;
        let pruned = HistoryQueries::prune(pool, user_id, self.limit).await?;
        if pruned > 0 {
            tracing::debug!(user_id, pruned, "Pruned OCR history");
        }

        Ok(())
    }

    pub async fn recent(&self, user_id: i64, limit: i64) -> Result<Vec<OcrRecord>> {
        let limit = limit.clamp(1, self.limit);
        HistoryQueries::recent(self.database.pool(), user_id, limit).await
    }

    pub async fn clear(&self, user_id: i64) -> Result<u64> {
        HistoryQueries::clear(self.database.pool(), user_id).await
    }
}
