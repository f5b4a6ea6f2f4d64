// Fast cache contract used as a read-through accelerator
// Absence and undecodable values are both reported as errors; callers treat any error as a miss.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

use crate::errors::CacheError;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

// Cache TTLs
/// Recent-logs entries; bounds how stale a cache hit can be
pub const RECENT_LOGS_TTL: Duration = Duration::from_secs(5 * 60);
/// Per-day firing mirror; matches the purge boundary
pub const FIRING_MIRROR_TTL: Duration = Duration::from_secs(48 * 60 * 60);

// Cache key prefixes
const RECENT_LOGS_PREFIX: &str = "trigger_logs:";
const FIRING_MIRROR_PREFIX: &str = "trigger_log:";

/// Key/value store with per-key expiration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FastCache: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch the value under `key`; a missing key is `CacheError::Miss`
    async fn get(&self, key: &str) -> Result<String, CacheError>;
}

/// Serialize `value` as JSON and store it
pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn FastCache,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let json = serde_json::to_string(value)?;
    cache.set(key, json, ttl).await
}

/// Fetch and decode a JSON value
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn FastCache,
    key: &str,
) -> Result<T, CacheError> {
    let raw = cache.get(key).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Key for the cached "recent logs" slice of a trigger
pub fn recent_logs_key(trigger_id: Uuid) -> String {
    format!("{}{}", RECENT_LOGS_PREFIX, trigger_id)
}

/// Key for the per-trigger, per-day firing mirror
pub fn firing_mirror_key(trigger_id: Uuid, day: NaiveDate) -> String {
    format!(
        "{}{}:{}",
        FIRING_MIRROR_PREFIX,
        trigger_id,
        day.format("%Y-%m-%d")
    )
}
