// Scheduler engine: one recurring in-process timer per scheduled trigger

use crate::errors::{EngineError, ScheduleError, ValidationError};
use crate::models::{EventLog, Trigger};
use crate::schedule::{parse_schedule, ScheduleSpec};
use crate::telemetry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Capacity of the fire failure channel before slow subscribers start lagging
const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// Invoked by a timer each time its trigger is due
#[async_trait]
pub trait FireHandler: Send + Sync {
    async fn fire_scheduled(&self, trigger_id: Uuid) -> Result<EventLog, EngineError>;
}

/// A timer-initiated firing that failed
#[derive(Debug, Clone, PartialEq)]
pub struct FireFailure {
    pub trigger_id: Uuid,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

struct ScheduledTimer {
    expression: String,
    generation: u64,
    handle: JoinHandle<()>,
}

type TimerMap = RwLock<HashMap<Uuid, ScheduledTimer>>;

/// Registry of live timers keyed by trigger id
///
/// At most one timer exists per trigger: registering again replaces the
/// previous timer. Timers live only in process memory. A timer whose trigger
/// no longer exists removes itself.
pub struct TriggerScheduler {
    handler: Arc<dyn FireHandler>,
    timers: Arc<TimerMap>,
    generations: AtomicU64,
    failures: broadcast::Sender<FireFailure>,
}

impl TriggerScheduler {
    pub fn new(handler: Arc<dyn FireHandler>) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            handler,
            timers: Arc::new(RwLock::new(HashMap::new())),
            generations: AtomicU64::new(0),
            failures,
        }
    }

    /// Stream of background firing failures
    pub fn subscribe_failures(&self) -> broadcast::Receiver<FireFailure> {
        self.failures.subscribe()
    }

    /// Start (or replace) the recurring timer for a trigger
    #[instrument(skip(self, trigger), fields(trigger_id = %trigger.id))]
    pub async fn register(&self, trigger: &Trigger) -> Result<(), EngineError> {
        if !trigger.is_scheduled() {
            return Err(ScheduleError::NotScheduled(trigger.id).into());
        }
        if !trigger.is_active {
            return Err(ScheduleError::Inactive(trigger.id).into());
        }

        let expression = trigger
            .schedule
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ValidationError::MissingField("schedule".to_string()))?;
        let spec = parse_schedule(expression)?;

        // Anchor before spawning so the first deadline does not depend on when
        // the task is first polled
        let wall_anchor = Utc::now();
        let instant_anchor = Instant::now();

        if spec.next_after(wall_anchor).is_none() {
            return Err(ScheduleError::NoNextExecution(expression.to_string()).into());
        }

        // Held across the spawn so a timer cannot retire itself before it is listed
        let mut timers = self.timers.write().await;
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(run_timer(
            TimerContext {
                trigger_id: trigger.id,
                generation,
                registry: Arc::downgrade(&self.timers),
                handler: Arc::clone(&self.handler),
                failures: self.failures.clone(),
            },
            spec,
            wall_anchor,
            instant_anchor,
        ));

        if let Some(previous) = timers.insert(
            trigger.id,
            ScheduledTimer {
                expression: expression.to_string(),
                generation,
                handle,
            },
        ) {
            previous.handle.abort();
            debug!(previous = %previous.expression, "Replaced existing timer");
        }
        telemetry::set_scheduled_timers(timers.len());

        info!(schedule = %expression, "Timer registered");
        Ok(())
    }

    /// Stop the timer for a trigger. Returns whether one was running.
    #[instrument(skip(self))]
    pub async fn unregister(&self, trigger_id: Uuid) -> bool {
        let mut timers = self.timers.write().await;
        let removed = timers.remove(&trigger_id);
        telemetry::set_scheduled_timers(timers.len());

        match removed {
            Some(timer) => {
                timer.handle.abort();
                info!("Timer stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_registered(&self, trigger_id: Uuid) -> bool {
        self.timers.read().await.contains_key(&trigger_id)
    }

    /// Expression the live timer for a trigger was registered with
    pub async fn expression(&self, trigger_id: Uuid) -> Option<String> {
        self.timers
            .read()
            .await
            .get(&trigger_id)
            .map(|timer| timer.expression.clone())
    }

    pub async fn len(&self) -> usize {
        self.timers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.timers.read().await.is_empty()
    }

    /// Abort every live timer
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let mut timers = self.timers.write().await;
        let count = timers.len();
        for (_, timer) in timers.drain() {
            timer.handle.abort();
        }
        telemetry::set_scheduled_timers(0);
        info!(stopped = count, "All timers stopped");
    }
}

impl Drop for TriggerScheduler {
    fn drop(&mut self) {
        if let Ok(timers) = self.timers.try_read() {
            for timer in timers.values() {
                timer.handle.abort();
            }
        }
    }
}

struct TimerContext {
    trigger_id: Uuid,
    generation: u64,
    registry: Weak<TimerMap>,
    handler: Arc<dyn FireHandler>,
    failures: broadcast::Sender<FireFailure>,
}

impl TimerContext {
    /// Drop this timer's registry entry unless a newer registration replaced it
    async fn retire(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut timers = registry.write().await;
        if timers
            .get(&self.trigger_id)
            .is_some_and(|timer| timer.generation == self.generation)
        {
            timers.remove(&self.trigger_id);
            telemetry::set_scheduled_timers(timers.len());
        }
    }
}

/// Timer loop for one trigger.
///
/// Wall-clock deadlines are mapped onto the tokio clock through the anchors
/// taken at registration. After each firing the cursor moves to the later of
/// the due time and now, so ticks missed during a slow firing are skipped
/// rather than replayed. The loop ends once the trigger is gone from the store.
async fn run_timer(
    ctx: TimerContext,
    spec: ScheduleSpec,
    wall_anchor: DateTime<Utc>,
    instant_anchor: Instant,
) {
    let trigger_id = ctx.trigger_id;
    let virtual_now = || {
        wall_anchor
            + chrono::Duration::from_std(instant_anchor.elapsed())
                .unwrap_or_else(|_| chrono::Duration::zero())
    };

    let mut cursor = wall_anchor;
    loop {
        let Some(next) = spec.next_after(cursor) else {
            warn!(trigger_id = %trigger_id, "Schedule has no further firing times, timer exiting");
            ctx.retire().await;
            return;
        };

        // Due times already in the past map to an immediate deadline
        let offset = (next - wall_anchor).to_std().unwrap_or_default();
        sleep_until(instant_anchor + offset).await;

        match ctx.handler.fire_scheduled(trigger_id).await {
            Ok(log) => {
                debug!(trigger_id = %trigger_id, event_log_id = %log.id, "Scheduled firing recorded");
            }
            Err(e) => {
                error!(trigger_id = %trigger_id, error = %e, "Scheduled firing failed");
                telemetry::record_fire_failure(&trigger_id);
                // No subscribers is fine
                let _ = ctx.failures.send(FireFailure {
                    trigger_id,
                    error: e.to_string(),
                    occurred_at: virtual_now(),
                });

                if e.is_not_found() {
                    warn!(trigger_id = %trigger_id, "Trigger no longer exists, timer exiting");
                    ctx.retire().await;
                    return;
                }
            }
        }

        cursor = next.max(virtual_now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;
    use crate::models::{TriggerDraft, STATUS_EXECUTED};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingHandler {
        fires: AtomicUsize,
        fail: bool,
        missing: bool,
    }

    impl CountingHandler {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn deleted() -> Self {
            Self {
                missing: true,
                ..Self::default()
            }
        }

        fn count(&self) -> usize {
            self.fires.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FireHandler for CountingHandler {
        async fn fire_scheduled(&self, trigger_id: Uuid) -> Result<EventLog, EngineError> {
            self.fires.fetch_add(1, Ordering::SeqCst);
            if self.missing {
                return Err(EngineError::trigger_not_found(trigger_id));
            }
            if self.fail {
                return Err(StorageError::ConnectionFailed("store offline".to_string()).into());
            }
            Ok(EventLog::new(trigger_id, STATUS_EXECUTED, Utc::now()))
        }
    }

    fn scheduled(expression: &str) -> Trigger {
        TriggerDraft::scheduled("t1", expression).into_trigger(Utc::now())
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance_minutes(minutes: u64) {
        for _ in 0..minutes {
            tokio::time::advance(Duration::from_secs(60)).await;
            settle().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_minute_fires_once_per_minute() {
        let handler = Arc::new(CountingHandler::default());
        let scheduler = TriggerScheduler::new(handler.clone());

        scheduler.register(&scheduled("@every 1m")).await.unwrap();
        settle().await;
        assert_eq!(handler.count(), 0);

        advance_minutes(3).await;
        assert_eq!(handler.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_field_cron_fires_once_per_minute() {
        let handler = Arc::new(CountingHandler::default());
        let scheduler = TriggerScheduler::new(handler.clone());

        scheduler.register(&scheduled("* * * * *")).await.unwrap();
        advance_minutes(3).await;

        assert_eq!(handler.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_replaces_existing_timer() {
        let handler = Arc::new(CountingHandler::default());
        let scheduler = TriggerScheduler::new(handler.clone());
        let trigger = scheduled("@every 1m");

        scheduler.register(&trigger).await.unwrap();
        scheduler.register(&trigger).await.unwrap();
        assert_eq!(scheduler.len().await, 1);

        advance_minutes(2).await;
        assert_eq!(handler.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_stops_firing() {
        let handler = Arc::new(CountingHandler::default());
        let scheduler = TriggerScheduler::new(handler.clone());
        let trigger = scheduled("@every 1m");

        scheduler.register(&trigger).await.unwrap();
        advance_minutes(1).await;
        assert_eq!(handler.count(), 1);

        assert!(scheduler.unregister(trigger.id).await);
        assert!(!scheduler.unregister(trigger.id).await);
        advance_minutes(3).await;

        assert_eq!(handler.count(), 1);
        assert!(scheduler.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_published_and_timer_keeps_running() {
        let handler = Arc::new(CountingHandler::failing());
        let scheduler = TriggerScheduler::new(handler.clone());
        let mut failures = scheduler.subscribe_failures();
        let trigger = scheduled("@every 1m");

        scheduler.register(&trigger).await.unwrap();
        advance_minutes(2).await;

        assert_eq!(handler.count(), 2);
        let first = failures.try_recv().unwrap();
        assert_eq!(first.trigger_id, trigger.id);
        assert!(first.error.contains("store offline"));
        assert!(failures.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_exits_when_trigger_is_gone() {
        let handler = Arc::new(CountingHandler::deleted());
        let scheduler = TriggerScheduler::new(handler.clone());
        let mut failures = scheduler.subscribe_failures();
        let trigger = scheduled("@every 1m");

        scheduler.register(&trigger).await.unwrap();
        advance_minutes(1).await;
        assert_eq!(handler.count(), 1);
        assert_eq!(failures.try_recv().unwrap().trigger_id, trigger.id);

        advance_minutes(3).await;
        assert_eq!(handler.count(), 1);
        assert!(failures.try_recv().is_err());
        assert!(!scheduler.is_registered(trigger.id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_again_after_timer_exits() {
        let handler = Arc::new(CountingHandler::deleted());
        let scheduler = TriggerScheduler::new(handler.clone());
        let trigger = scheduled("@every 1m");

        scheduler.register(&trigger).await.unwrap();
        advance_minutes(1).await;
        assert!(scheduler.is_empty().await);

        scheduler.register(&trigger).await.unwrap();
        assert!(scheduler.is_registered(trigger.id).await);
    }

    #[tokio::test]
    async fn test_register_rejects_inactive_and_api_triggers() {
        let scheduler = TriggerScheduler::new(Arc::new(CountingHandler::default()));

        let mut inactive = scheduled("* * * * *");
        inactive.is_active = false;
        let err = scheduler.register(&inactive).await.unwrap_err();
        assert!(matches!(err, EngineError::Schedule(ScheduleError::Inactive(id)) if id == inactive.id));

        let api = TriggerDraft::api("hook", None).into_trigger(Utc::now());
        let err = scheduler.register(&api).await.unwrap_err();
        assert!(matches!(err, EngineError::Schedule(ScheduleError::NotScheduled(_))));

        assert!(scheduler.is_empty().await);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_expression() {
        let scheduler = TriggerScheduler::new(Arc::new(CountingHandler::default()));
        let err = scheduler.register(&scheduled("61 * * * *")).await.unwrap_err();
        assert!(err.is_validation());
        assert!(scheduler.is_empty().await);
    }

    #[tokio::test]
    async fn test_shutdown_clears_registry() {
        let scheduler = TriggerScheduler::new(Arc::new(CountingHandler::default()));
        let a = scheduled("@every 1m");
        let b = scheduled("@hourly");
        scheduler.register(&a).await.unwrap();
        scheduler.register(&b).await.unwrap();
        assert_eq!(scheduler.expression(b.id).await.as_deref(), Some("@hourly"));

        scheduler.shutdown().await;
        assert!(scheduler.is_empty().await);
        assert!(!scheduler.is_registered(a.id).await);
    }
}
