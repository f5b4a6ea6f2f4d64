// Execution engine: turns a firing into a durable EventLog row

use crate::cache::{firing_mirror_key, set_json, FastCache, FIRING_MIRROR_TTL};
use crate::db::{EventLogStore, TriggerStore};
use crate::errors::{EngineError, ValidationError};
use crate::models::{EventLog, TriggerDraft, STATUS_EXECUTED, STATUS_TEST_EXECUTED};
use crate::scheduler::FireHandler;
use crate::telemetry::{self, FireSource};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Records firings of stored triggers and dry-run test firings
pub struct TriggerExecutor {
    triggers: Arc<dyn TriggerStore>,
    logs: Arc<dyn EventLogStore>,
    cache: Arc<dyn FastCache>,
}

impl TriggerExecutor {
    pub fn new(
        triggers: Arc<dyn TriggerStore>,
        logs: Arc<dyn EventLogStore>,
        cache: Arc<dyn FastCache>,
    ) -> Self {
        Self {
            triggers,
            logs,
            cache,
        }
    }

    /// Fire a stored trigger on demand
    pub async fn fire(&self, trigger_id: Uuid) -> Result<EventLog, EngineError> {
        self.fire_from(trigger_id, FireSource::Manual).await
    }

    #[instrument(skip(self), fields(trigger_id = %trigger_id, source = source.as_str()))]
    async fn fire_from(&self, trigger_id: Uuid, source: FireSource) -> Result<EventLog, EngineError> {
        let result = self.record_firing(trigger_id).await;
        telemetry::record_fire(source, result.is_ok());
        result
    }

    async fn record_firing(&self, trigger_id: Uuid) -> Result<EventLog, EngineError> {
        let trigger = self
            .triggers
            .find_trigger(trigger_id)
            .await?
            .ok_or_else(|| EngineError::trigger_not_found(trigger_id))?;

        if !trigger.is_active {
            return Err(ValidationError::InactiveTrigger(trigger_id).into());
        }

        let log = EventLog::new(trigger.id, STATUS_EXECUTED, Utc::now());

        // The durable row is the source of truth; the mirror is best effort
        self.logs.insert_log(&log).await?;
        self.mirror(&log).await;

        info!(event_log_id = %log.id, "Trigger fired");
        Ok(log)
    }

    async fn mirror(&self, log: &EventLog) {
        let key = firing_mirror_key(log.trigger_id, log.executed_at.date_naive());
        match set_json(self.cache.as_ref(), &key, log, FIRING_MIRROR_TTL).await {
            Ok(()) => debug!(key = %key, "Firing mirrored to cache"),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to mirror firing to cache");
                telemetry::record_cache_write_failure("firing_mirror");
            }
        }
    }

    /// Dry-run firing of an unsaved definition. Never touches the cache.
    #[instrument(skip(self, draft), fields(trigger_name = %draft.name))]
    pub async fn test(&self, draft: &TriggerDraft) -> Result<EventLog, EngineError> {
        let result = self.record_test(draft).await;
        telemetry::record_fire(FireSource::Test, result.is_ok());
        result
    }

    async fn record_test(&self, draft: &TriggerDraft) -> Result<EventLog, EngineError> {
        draft.validate()?;

        let trigger_id = draft.id.unwrap_or_else(Uuid::nil);
        let log = EventLog::new(trigger_id, STATUS_TEST_EXECUTED, Utc::now());
        self.logs.insert_log(&log).await?;

        info!(trigger_id = %trigger_id, event_log_id = %log.id, "Test firing recorded");
        Ok(log)
    }
}

#[async_trait]
impl FireHandler for TriggerExecutor {
    async fn fire_scheduled(&self, trigger_id: Uuid) -> Result<EventLog, EngineError> {
        self.fire_from(trigger_id, FireSource::Scheduled).await
    }
}
