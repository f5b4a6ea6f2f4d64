// Bootstrap utilities for binary initialization
// Connects the durable store and fast cache and assembles the trigger service

use crate::cache::{FastCache, RedisCache};
use crate::config::Settings;
use crate::db::{DbPool, EventLogRepository, TriggerRepository};
use crate::service::TriggerService;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Everything a binary needs to serve trigger operations
pub struct Runtime {
    pub db_pool: DbPool,
    pub redis: Arc<RedisCache>,
    pub service: Arc<TriggerService>,
}

/// Initialize database pool and apply migrations when configured
///
/// # Errors
/// Returns error if the pool cannot connect or a migration fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    info!("Initializing database pool");

    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    if settings.database.run_migrations {
        db_pool
            .migrate()
            .await
            .context("Failed to apply database migrations")?;
    }

    info!("Database pool initialized");
    Ok(db_pool)
}

/// Initialize the Redis-backed fast cache
///
/// # Errors
/// Returns error if the Redis client cannot be created or connected
#[tracing::instrument(skip(settings))]
pub async fn init_redis_cache(settings: &Settings) -> Result<RedisCache> {
    info!("Initializing Redis cache");

    let cache = RedisCache::new(&settings.redis)
        .await
        .context("Failed to initialize Redis cache")?;

    info!("Redis cache initialized");
    Ok(cache)
}

/// Connect PostgreSQL and Redis and build the trigger service on top of them.
///
/// Timers for stored scheduled triggers are restored when
/// `scheduler.restore_on_startup` is set.
#[tracing::instrument(skip(settings))]
pub async fn init_runtime(settings: &Settings) -> Result<Runtime> {
    let db_pool = init_database_pool(settings).await?;
    let redis = Arc::new(init_redis_cache(settings).await?);

    let service = Arc::new(TriggerService::new(
        Arc::new(TriggerRepository::new(db_pool.clone())),
        Arc::new(EventLogRepository::new(db_pool.clone())),
        redis.clone() as Arc<dyn FastCache>,
    ));

    if settings.scheduler.restore_on_startup {
        let restored = service
            .restore_schedules()
            .await
            .context("Failed to restore trigger schedules")?;
        info!(restored, "Trigger timers restored");
    }

    Ok(Runtime {
        db_pool,
        redis,
        service,
    })
}
