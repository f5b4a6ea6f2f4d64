// Log query engine: cache-aside reads of a trigger's active-window logs

use crate::cache::{get_json, recent_logs_key, set_json, FastCache, RECENT_LOGS_TTL};
use crate::db::EventLogStore;
use crate::engine::retention::archive_window;
use crate::errors::{CacheError, EngineError};
use crate::models::EventLog;
use crate::telemetry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub struct LogQueryEngine {
    logs: Arc<dyn EventLogStore>,
    cache: Arc<dyn FastCache>,
}

impl LogQueryEngine {
    pub fn new(logs: Arc<dyn EventLogStore>, cache: Arc<dyn FastCache>) -> Self {
        Self { logs, cache }
    }

    /// Unarchived logs of a trigger from the last two hours
    pub async fn recent_logs(&self, trigger_id: Uuid) -> Result<Vec<EventLog>, EngineError> {
        self.recent_logs_at(trigger_id, Utc::now()).await
    }

    /// Same as [`recent_logs`](Self::recent_logs) with an explicit clock.
    ///
    /// A cache hit is returned as stored, without re-checking the window, so it
    /// can lag the store by at most the cache TTL.
    #[instrument(skip(self), fields(trigger_id = %trigger_id))]
    pub async fn recent_logs_at(
        &self,
        trigger_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventLog>, EngineError> {
        let key = recent_logs_key(trigger_id);

        match get_json::<Vec<EventLog>>(self.cache.as_ref(), &key).await {
            Ok(logs) => {
                telemetry::record_cache_lookup(true);
                debug!(count = logs.len(), "Recent logs served from cache");
                return Ok(logs);
            }
            Err(CacheError::Miss(_)) => debug!("Recent logs cache miss"),
            Err(e) => warn!(error = %e, "Recent logs cache read failed, falling back to store"),
        }
        telemetry::record_cache_lookup(false);

        let since = now - archive_window();
        let logs = self.logs.find_recent_logs(trigger_id, since).await?;

        if let Err(e) = set_json(self.cache.as_ref(), &key, &logs, RECENT_LOGS_TTL).await {
            warn!(error = %e, "Failed to repopulate recent logs cache");
            telemetry::record_cache_write_failure("recent_logs");
        }

        debug!(count = logs.len(), "Recent logs loaded from store");
        Ok(logs)
    }
}
