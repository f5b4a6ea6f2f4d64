// In-memory durable store
// Backs the engine in tests; one lock guards both tables so retention is atomic

use crate::db::store::{EventLogStore, TriggerStore};
use crate::errors::StorageError;
use crate::models::{EventLog, SweepReport, Trigger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    triggers: Vec<Trigger>,
    event_logs: Vec<EventLog>,
}

/// Durable store kept in process memory
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    recent_queries: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `find_recent_logs` reached the store
    pub fn recent_query_count(&self) -> usize {
        self.recent_queries.load(Ordering::SeqCst)
    }

    /// Every stored event log regardless of archive state, in insertion order
    pub async fn all_logs(&self) -> Vec<EventLog> {
        self.tables.read().await.event_logs.clone()
    }

    pub async fn trigger_count(&self) -> usize {
        self.tables.read().await.triggers.len()
    }
}

#[async_trait]
impl TriggerStore for InMemoryStore {
    async fn create_trigger(&self, trigger: &Trigger) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if tables.triggers.iter().any(|t| t.id == trigger.id) {
            return Err(StorageError::QueryFailed(format!(
                "duplicate trigger id {}",
                trigger.id
            )));
        }
        tables.triggers.push(trigger.clone());
        Ok(())
    }

    async fn find_trigger(&self, id: Uuid) -> Result<Option<Trigger>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.triggers.iter().find(|t| t.id == id).cloned())
    }

    async fn list_triggers(&self) -> Result<Vec<Trigger>, StorageError> {
        Ok(self.tables.read().await.triggers.clone())
    }

    async fn list_active_scheduled(&self) -> Result<Vec<Trigger>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .triggers
            .iter()
            .filter(|t| t.is_scheduled() && t.is_active)
            .cloned()
            .collect())
    }

    async fn delete_trigger(&self, id: Uuid) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        let before = tables.triggers.len();
        tables.triggers.retain(|t| t.id != id);
        Ok(tables.triggers.len() != before)
    }
}

#[async_trait]
impl EventLogStore for InMemoryStore {
    async fn insert_log(&self, log: &EventLog) -> Result<(), StorageError> {
        self.tables.write().await.event_logs.push(log.clone());
        Ok(())
    }

    async fn find_recent_logs(
        &self,
        trigger_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<EventLog>, StorageError> {
        self.recent_queries.fetch_add(1, Ordering::SeqCst);

        let tables = self.tables.read().await;
        let mut logs: Vec<EventLog> = tables
            .event_logs
            .iter()
            .filter(|l| l.trigger_id == trigger_id && l.executed_at > since && !l.is_archived)
            .cloned()
            .collect();
        logs.sort_by_key(|l| l.executed_at);
        Ok(logs)
    }

    async fn list_logs(&self, include_archived: bool) -> Result<Vec<EventLog>, StorageError> {
        let tables = self.tables.read().await;
        let mut logs: Vec<EventLog> = tables
            .event_logs
            .iter()
            .filter(|l| include_archived || !l.is_archived)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        Ok(logs)
    }

    async fn apply_retention(
        &self,
        archive_before: DateTime<Utc>,
        purge_before: DateTime<Utc>,
    ) -> Result<SweepReport, StorageError> {
        let mut tables = self.tables.write().await;

        let mut archived = 0;
        for log in tables
            .event_logs
            .iter_mut()
            .filter(|l| l.executed_at < archive_before && !l.is_archived)
        {
            log.is_archived = true;
            archived += 1;
        }

        let before = tables.event_logs.len();
        tables.event_logs.retain(|l| l.executed_at >= purge_before);
        let purged = (before - tables.event_logs.len()) as u64;

        Ok(SweepReport { archived, purged })
    }
}
