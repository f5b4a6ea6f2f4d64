// Retention engine: ages event logs from active to archived to purged

use crate::db::EventLogStore;
use crate::errors::EngineError;
use crate::models::SweepReport;
use crate::telemetry;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

/// Age at which a log leaves the active window
pub const ARCHIVE_AFTER_SECS: i64 = 2 * 60 * 60;

/// Age at which a log is deleted
pub const PURGE_AFTER_SECS: i64 = 48 * 60 * 60;

pub fn archive_window() -> Duration {
    Duration::seconds(ARCHIVE_AFTER_SECS)
}

pub fn purge_window() -> Duration {
    Duration::seconds(PURGE_AFTER_SECS)
}

/// Lifecycle state of an event log, a pure function of its age
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RetentionState {
    Active,
    Archived,
    Purged,
}

impl RetentionState {
    pub fn classify(executed_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let age = now - executed_at;
        if age >= purge_window() {
            RetentionState::Purged
        } else if age >= archive_window() {
            RetentionState::Archived
        } else {
            RetentionState::Active
        }
    }
}

pub struct RetentionEngine {
    logs: Arc<dyn EventLogStore>,
}

impl RetentionEngine {
    pub fn new(logs: Arc<dyn EventLogStore>) -> Self {
        Self { logs }
    }

    /// One retention pass at the current time
    pub async fn sweep(&self) -> Result<SweepReport, EngineError> {
        self.sweep_at(Utc::now()).await
    }

    /// Archive logs older than two hours, then purge logs older than 48 hours.
    /// Idempotent for a fixed `now`.
    #[instrument(skip(self))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, EngineError> {
        let report = self
            .logs
            .apply_retention(now - archive_window(), now - purge_window())
            .await?;

        telemetry::record_sweep(&report);
        if report.archived > 0 || report.purged > 0 {
            info!(archived = report.archived, purged = report.purged, "Retention sweep applied");
        } else {
            debug!("Retention sweep found nothing to do");
        }

        Ok(report)
    }

    /// Sweep on a fixed cadence until shutdown is signalled
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(
        &self,
        every: std::time::Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!(interval_seconds = every.as_secs(), "Starting retention loop");

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Retention sweep failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping retention loop");
                    break;
                }
            }
        }
    }
}
