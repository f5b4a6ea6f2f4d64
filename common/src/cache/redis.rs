// Redis-backed fast cache
// Connection manager gives automatic reconnection; all faults surface as CacheError

use super::FastCache;
use crate::config::RedisConfig;
use crate::errors::CacheError;
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Redis cache wrapper
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis and build the connection manager
    #[instrument(skip(config), fields(redis_url = %config.url))]
    pub async fn new(config: &RedisConfig) -> Result<Self, CacheError> {
        info!("Initializing Redis cache");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            CacheError::ConnectionFailed(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::ConnectionFailed(format!("Failed to create connection manager: {}", e))
        })?;

        info!("Redis cache initialized successfully");
        Ok(Self { manager })
    }

    /// Health check - verify Redis answers PING
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();

        let response: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::RedisError(format!("Health check failed: {}", e)))?;

        if response != "PONG" {
            return Err(CacheError::RedisError(format!(
                "Unexpected PING response: {}",
                response
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl FastCache for RedisCache {
    #[instrument(skip(self, value), fields(size = value.len()))]
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();
        // Redis rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        debug!(key = %key, ttl_seconds = seconds, "Cache entry written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<String, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await?;
        value.ok_or_else(|| CacheError::Miss(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{get_json, set_json};

    fn test_config() -> RedisConfig {
        RedisConfig {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        }
    }

    #[tokio::test]
    async fn test_redis_cache_invalid_url() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
        };

        let result = RedisCache::new(&config).await;
        assert!(matches!(result, Err(CacheError::ConnectionFailed(_))));
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_redis_health_check() {
        let cache = RedisCache::new(&test_config()).await.unwrap();
        assert!(cache.health_check().await.is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_redis_missing_key_is_error() {
        let cache = RedisCache::new(&test_config()).await.unwrap();
        let key = format!("test:missing:{}", uuid::Uuid::new_v4());
        assert!(matches!(cache.get(&key).await, Err(CacheError::Miss(_))));
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_redis_json_round_trip() {
        let cache = RedisCache::new(&test_config()).await.unwrap();
        let key = format!("test:json:{}", uuid::Uuid::new_v4());
        set_json(&cache, &key, &vec!["a", "b"], Duration::from_secs(30))
            .await
            .unwrap();
        let value: Vec<String> = get_json(&cache, &key).await.unwrap();
        assert_eq!(value, vec!["a".to_string(), "b".to_string()]);
    }
}
