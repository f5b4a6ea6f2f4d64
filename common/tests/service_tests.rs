// End-to-end trigger lifecycle tests against the in-memory store and cache

use common::cache::MemoryCache;
use common::db::{InMemoryStore, TriggerStore};
use common::models::{TriggerDraft, STATUS_EXECUTED};
use common::TriggerService;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn setup() -> (Arc<TriggerService>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let service = TriggerService::new(store.clone(), store.clone(), Arc::new(MemoryCache::new()));
    (Arc::new(service), store)
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_create_every_minute_trigger() {
    let (service, _) = setup();

    let trigger = service
        .create_trigger(TriggerDraft::scheduled("t1", "* * * * *"))
        .await
        .unwrap();

    assert_ne!(trigger.id, Uuid::nil());
    assert!(trigger.is_active);
    assert_eq!(trigger.name, "t1");
    assert_eq!(trigger.schedule.as_deref(), Some("* * * * *"));
}

#[tokio::test]
async fn test_create_with_empty_name_writes_nothing() {
    let (service, store) = setup();

    let err = service
        .create_trigger(TriggerDraft::scheduled("", "* * * * *"))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(store.trigger_count().await, 0);
    assert!(service.scheduler().is_empty().await);
}

#[tokio::test]
async fn test_delete_missing_trigger_leaves_store_unchanged() {
    let (service, store) = setup();
    let kept = service
        .create_trigger(TriggerDraft::api("hook", None))
        .await
        .unwrap();

    let err = service.delete_trigger(Uuid::new_v4()).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(store.list_triggers().await.unwrap(), vec![kept]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fires_each_produce_a_row() {
    let (service, store) = setup();
    let trigger = service
        .create_trigger(TriggerDraft::api("burst", None))
        .await
        .unwrap();

    let fires = (0..50).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.execute_trigger(trigger.id).await })
    });
    let results = join_all(fires).await;

    let mut ids = HashSet::new();
    for result in results {
        let log = result.unwrap().unwrap();
        assert_eq!(log.trigger_id, trigger.id);
        ids.insert(log.id);
    }
    assert_eq!(ids.len(), 50);

    let stored = store.all_logs().await;
    assert_eq!(stored.len(), 50);
    assert!(stored.iter().all(|l| ids.contains(&l.id) && l.status == STATUS_EXECUTED));
}

#[tokio::test]
async fn test_recent_logs_repopulates_cache_after_miss() {
    let (service, store) = setup();
    let trigger = service
        .create_trigger(TriggerDraft::api("hook", None))
        .await
        .unwrap();
    service.execute_trigger(trigger.id).await.unwrap();

    let first = service.recent_logs(trigger.id).await.unwrap();
    let second = service.recent_logs(trigger.id).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert_eq!(store.recent_query_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scheduled_trigger_fires_once_per_interval() {
    let (service, store) = setup();
    let trigger = service
        .create_trigger(TriggerDraft::scheduled("t1", "@every 1m"))
        .await
        .unwrap();

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
    }

    let logs = store.all_logs().await;
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|l| l.trigger_id == trigger.id));
    // Non-decreasing per trigger
    assert!(logs.windows(2).all(|w| w[0].executed_at <= w[1].executed_at));
}

#[tokio::test(start_paused = true)]
async fn test_deleted_trigger_stops_firing() {
    let (service, store) = setup();
    let trigger = service
        .create_trigger(TriggerDraft::scheduled("t1", "@every 1m"))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    service.delete_trigger(trigger.id).await.unwrap();

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
    }

    assert_eq!(store.all_logs().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_scheduled_fire_is_reported() {
    let store = Arc::new(InMemoryStore::new());
    let service = TriggerService::new(store.clone(), store.clone(), Arc::new(MemoryCache::new()));
    let mut failures = service.subscribe_failures();

    let trigger = service
        .create_trigger(TriggerDraft::scheduled("t1", "@every 1m"))
        .await
        .unwrap();
    // Removed behind the scheduler's back, so the next tick cannot find it
    store.delete_trigger(trigger.id).await.unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;

    let failure = failures.try_recv().unwrap();
    assert_eq!(failure.trigger_id, trigger.id);
    assert!(failure.error.contains("Not found"));
    assert!(store.all_logs().await.is_empty());

    // The timer exits instead of failing on every later tick
    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
    }
    assert!(failures.try_recv().is_err());
    assert!(!service.scheduler().is_registered(trigger.id).await);
}

#[tokio::test]
async fn test_schedule_after_delete_leaves_no_timer() {
    let (service, store) = setup();
    let trigger = service
        .create_trigger(TriggerDraft::scheduled("t1", "@every 1m"))
        .await
        .unwrap();
    service.scheduler().unregister(trigger.id).await;
    store.delete_trigger(trigger.id).await.unwrap();

    let err = service.schedule_trigger(trigger.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(service.scheduler().is_empty().await);
}
