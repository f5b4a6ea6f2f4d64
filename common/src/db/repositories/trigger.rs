// Trigger repository implementation

use super::queries::trigger_queries;
use crate::db::store::TriggerStore;
use crate::db::DbPool;
use crate::errors::StorageError;
use crate::models::{Trigger, TriggerType};
use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

/// Repository for trigger-related database operations
#[derive(Clone)]
pub struct TriggerRepository {
    pool: DbPool,
}

impl TriggerRepository {
    /// Create a new TriggerRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TriggerStore for TriggerRepository {
    #[instrument(skip(self, trigger), fields(trigger_id = %trigger.id))]
    async fn create_trigger(&self, trigger: &Trigger) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO triggers (
                id, type, name, schedule, endpoint, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(trigger.id)
        .bind(trigger.trigger_type.to_string())
        .bind(&trigger.name)
        .bind(&trigger.schedule)
        .bind(&trigger.endpoint)
        .bind(trigger.is_active)
        .bind(trigger.created_at)
        .bind(trigger.updated_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(trigger_id = %trigger.id, trigger_name = %trigger.name, "Trigger created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_trigger(&self, id: Uuid) -> Result<Option<Trigger>, StorageError> {
        let query = format!(
            "SELECT {} FROM triggers WHERE id = $1",
            trigger_queries::SELECT_ALL_COLUMNS
        );
        let trigger = sqlx::query_as::<_, Trigger>(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(trigger)
    }

    #[instrument(skip(self))]
    async fn list_triggers(&self) -> Result<Vec<Trigger>, StorageError> {
        let query = format!(
            "SELECT {} FROM triggers ORDER BY created_at ASC",
            trigger_queries::SELECT_ALL_COLUMNS
        );
        let triggers = sqlx::query_as::<_, Trigger>(&query)
            .fetch_all(self.pool.pool())
            .await?;

        tracing::debug!(count = triggers.len(), "Listed triggers");
        Ok(triggers)
    }

    #[instrument(skip(self))]
    async fn list_active_scheduled(&self) -> Result<Vec<Trigger>, StorageError> {
        let query = format!(
            "SELECT {} FROM triggers WHERE type = $1 AND is_active = TRUE ORDER BY created_at ASC",
            trigger_queries::SELECT_ALL_COLUMNS
        );
        let triggers = sqlx::query_as::<_, Trigger>(&query)
            .bind(TriggerType::Scheduled.to_string())
            .fetch_all(self.pool.pool())
            .await?;

        Ok(triggers)
    }

    #[instrument(skip(self))]
    async fn delete_trigger(&self, id: Uuid) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM triggers WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(trigger_id = %id, "Trigger deleted");
        }
        Ok(deleted)
    }
}
