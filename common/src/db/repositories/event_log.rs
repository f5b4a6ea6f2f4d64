// Event log repository implementation
// Retention runs archive-then-purge inside one transaction

use super::queries::event_log_queries;
use crate::db::store::EventLogStore;
use crate::db::DbPool;
use crate::errors::StorageError;
use crate::models::{EventLog, SweepReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

/// Repository for event log database operations
#[derive(Clone)]
pub struct EventLogRepository {
    pool: DbPool,
}

impl EventLogRepository {
    /// Create a new EventLogRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLogStore for EventLogRepository {
    #[instrument(skip(self, log), fields(event_log_id = %log.id, trigger_id = %log.trigger_id))]
    async fn insert_log(&self, log: &EventLog) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO event_logs (id, trigger_id, status, payload, is_archived, executed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(log.id)
        .bind(log.trigger_id)
        .bind(&log.status)
        .bind(&log.payload)
        .bind(log.is_archived)
        .bind(log.executed_at)
        .execute(self.pool.pool())
        .await?;

        tracing::debug!(status = %log.status, "Event log written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_recent_logs(
        &self,
        trigger_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<EventLog>, StorageError> {
        let query = format!(
            r#"
            SELECT {}
            FROM event_logs
            WHERE trigger_id = $1 AND executed_at > $2 AND is_archived = FALSE
            ORDER BY executed_at ASC
            "#,
            event_log_queries::SELECT_ALL_COLUMNS
        );
        let logs = sqlx::query_as::<_, EventLog>(&query)
            .bind(trigger_id)
            .bind(since)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(logs)
    }

    #[instrument(skip(self))]
    async fn list_logs(&self, include_archived: bool) -> Result<Vec<EventLog>, StorageError> {
        let filter = if include_archived {
            ""
        } else {
            "WHERE is_archived = FALSE"
        };
        let query = format!(
            "SELECT {} FROM event_logs {} ORDER BY executed_at DESC",
            event_log_queries::SELECT_ALL_COLUMNS,
            filter
        );
        let logs = sqlx::query_as::<_, EventLog>(&query)
            .fetch_all(self.pool.pool())
            .await?;

        Ok(logs)
    }

    #[instrument(skip(self))]
    async fn apply_retention(
        &self,
        archive_before: DateTime<Utc>,
        purge_before: DateTime<Utc>,
    ) -> Result<SweepReport, StorageError> {
        let mut tx = self.pool.pool().begin().await?;

        let archived = sqlx::query(
            "UPDATE event_logs SET is_archived = TRUE WHERE executed_at < $1 AND is_archived = FALSE",
        )
        .bind(archive_before)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let purged = sqlx::query("DELETE FROM event_logs WHERE executed_at < $1")
            .bind(purge_before)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(SweepReport { archived, purged })
    }
}
