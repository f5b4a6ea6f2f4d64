// Durable store contracts
// `find_trigger` distinguishes absence (Ok(None)) from failure (Err)

use crate::errors::StorageError;
use crate::models::{EventLog, SweepReport, Trigger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Trigger persistence
#[async_trait]
pub trait TriggerStore: Send + Sync {
    /// Persist a new trigger
    async fn create_trigger(&self, trigger: &Trigger) -> Result<(), StorageError>;

    /// Look up a trigger by identity
    async fn find_trigger(&self, id: Uuid) -> Result<Option<Trigger>, StorageError>;

    /// All triggers, oldest first
    async fn list_triggers(&self) -> Result<Vec<Trigger>, StorageError>;

    /// Active triggers of type `scheduled`
    async fn list_active_scheduled(&self) -> Result<Vec<Trigger>, StorageError>;

    /// Remove a trigger; returns false when nothing was deleted
    async fn delete_trigger(&self, id: Uuid) -> Result<bool, StorageError>;
}

/// Event log persistence
#[async_trait]
pub trait EventLogStore: Send + Sync {
    /// Append one firing record
    async fn insert_log(&self, log: &EventLog) -> Result<(), StorageError>;

    /// Unarchived logs of a trigger executed strictly after `since`, oldest first
    async fn find_recent_logs(
        &self,
        trigger_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<EventLog>, StorageError>;

    /// All logs, newest first; archived rows only when `include_archived`
    async fn list_logs(&self, include_archived: bool) -> Result<Vec<EventLog>, StorageError>;

    /// Archive unarchived rows executed before `archive_before`, then delete
    /// every row executed before `purge_before`, as one atomic step.
    async fn apply_retention(
        &self,
        archive_before: DateTime<Utc>,
        purge_before: DateTime<Utc>,
    ) -> Result<SweepReport, StorageError>;
}
