use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use common::cache::RedisCache;
use common::config::Settings;
use common::db::DbPool;
use common::TriggerService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TriggerService>,
    pub config: Arc<Settings>,
    /// Probed by the health endpoint when present
    pub db_pool: Option<DbPool>,
    pub redis: Option<Arc<RedisCache>>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(service: Arc<TriggerService>, config: Settings) -> Self {
        Self {
            service,
            config: Arc::new(config),
            db_pool: None,
            redis: None,
            metrics_handle: None,
        }
    }

    pub fn with_backends(mut self, db_pool: DbPool, redis: Arc<RedisCache>) -> Self {
        self.db_pool = Some(db_pool);
        self.redis = Some(redis);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
