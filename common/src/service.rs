// Trigger service: the operations exposed to adapters
//
// Wires the durable store, fast cache, scheduler and engines together. Every
// operation returns `EngineError` on failure; cache faults never surface here.

use crate::cache::FastCache;
use crate::db::{EventLogStore, TriggerStore};
use crate::engine::{LogQueryEngine, RetentionEngine, TriggerExecutor};
use crate::errors::EngineError;
use crate::models::{EventLog, SweepReport, Trigger, TriggerDraft};
use crate::scheduler::{FireFailure, TriggerScheduler};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub struct TriggerService {
    triggers: Arc<dyn TriggerStore>,
    logs: Arc<dyn EventLogStore>,
    executor: Arc<TriggerExecutor>,
    query: LogQueryEngine,
    retention: Arc<RetentionEngine>,
    scheduler: TriggerScheduler,
}

impl TriggerService {
    pub fn new(
        triggers: Arc<dyn TriggerStore>,
        logs: Arc<dyn EventLogStore>,
        cache: Arc<dyn FastCache>,
    ) -> Self {
        let executor = Arc::new(TriggerExecutor::new(
            Arc::clone(&triggers),
            Arc::clone(&logs),
            Arc::clone(&cache),
        ));
        let scheduler = TriggerScheduler::new(executor.clone());

        Self {
            query: LogQueryEngine::new(Arc::clone(&logs), cache),
            retention: Arc::new(RetentionEngine::new(Arc::clone(&logs))),
            triggers,
            logs,
            executor,
            scheduler,
        }
    }

    /// Validate and store a new trigger; active scheduled triggers start firing
    #[instrument(skip(self, draft), fields(trigger_name = %draft.name, trigger_type = %draft.trigger_type))]
    pub async fn create_trigger(&self, draft: TriggerDraft) -> Result<Trigger, EngineError> {
        draft.validate()?;

        let trigger = draft.into_trigger(Utc::now());
        self.triggers.create_trigger(&trigger).await?;
        info!(trigger_id = %trigger.id, "Trigger created");

        if trigger.is_scheduled() && trigger.is_active {
            if let Err(e) = self.scheduler.register(&trigger).await {
                // A rejected create leaves nothing behind
                self.triggers.delete_trigger(trigger.id).await?;
                return Err(e);
            }
        }

        Ok(trigger)
    }

    #[instrument(skip(self))]
    pub async fn get_trigger(&self, id: Uuid) -> Result<Trigger, EngineError> {
        self.triggers
            .find_trigger(id)
            .await?
            .ok_or_else(|| EngineError::trigger_not_found(id))
    }

    #[instrument(skip(self))]
    pub async fn list_triggers(&self) -> Result<Vec<Trigger>, EngineError> {
        Ok(self.triggers.list_triggers().await?)
    }

    /// Remove a trigger and stop its timer. Its event logs are left to age out.
    #[instrument(skip(self))]
    pub async fn delete_trigger(&self, id: Uuid) -> Result<(), EngineError> {
        if !self.triggers.delete_trigger(id).await? {
            return Err(EngineError::trigger_not_found(id));
        }

        let had_timer = self.scheduler.unregister(id).await;
        info!(trigger_id = %id, had_timer, "Trigger deleted");
        Ok(())
    }

    pub async fn test_trigger(&self, draft: &TriggerDraft) -> Result<EventLog, EngineError> {
        self.executor.test(draft).await
    }

    pub async fn execute_trigger(&self, id: Uuid) -> Result<EventLog, EngineError> {
        self.executor.fire(id).await
    }

    /// Start or replace the timer of a stored scheduled trigger
    #[instrument(skip(self))]
    pub async fn schedule_trigger(&self, id: Uuid) -> Result<Trigger, EngineError> {
        let trigger = self.get_trigger(id).await?;
        self.scheduler.register(&trigger).await?;

        // A delete that ran between the load and the insert has already
        // unregistered, so the timer must be dropped here
        if self.triggers.find_trigger(id).await?.is_none() {
            self.scheduler.unregister(id).await;
            return Err(EngineError::trigger_not_found(id));
        }

        Ok(trigger)
    }

    pub async fn recent_logs(&self, trigger_id: Uuid) -> Result<Vec<EventLog>, EngineError> {
        self.query.recent_logs(trigger_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_events(&self, include_archived: bool) -> Result<Vec<EventLog>, EngineError> {
        Ok(self.logs.list_logs(include_archived).await?)
    }

    pub async fn sweep(&self) -> Result<SweepReport, EngineError> {
        self.retention.sweep().await
    }

    /// Register timers for every stored active scheduled trigger.
    ///
    /// Triggers whose timer cannot be registered are logged and skipped.
    /// Returns how many timers were started.
    #[instrument(skip(self))]
    pub async fn restore_schedules(&self) -> Result<usize, EngineError> {
        let triggers = self.triggers.list_active_scheduled().await?;

        let mut restored = 0;
        for trigger in &triggers {
            match self.scheduler.register(trigger).await {
                Ok(()) if self.triggers.find_trigger(trigger.id).await?.is_none() => {
                    self.scheduler.unregister(trigger.id).await;
                    debug!(trigger_id = %trigger.id, "Trigger deleted during restore");
                }
                Ok(()) => restored += 1,
                Err(e) => warn!(trigger_id = %trigger.id, error = %e, "Skipping trigger with unusable schedule"),
            }
        }

        info!(restored, stored = triggers.len(), "Schedules restored");
        Ok(restored)
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<FireFailure> {
        self.scheduler.subscribe_failures()
    }

    pub fn scheduler(&self) -> &TriggerScheduler {
        &self.scheduler
    }

    /// Shared handle for running the periodic sweep loop
    pub fn retention(&self) -> Arc<RetentionEngine> {
        Arc::clone(&self.retention)
    }

    /// Stop every timer
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
