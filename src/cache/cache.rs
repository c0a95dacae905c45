//! Generic cache trait and Redis implementation
//!
//! Type-safe get/set over JSON serialization with TTL support. Redis
//! outages degrade to cache misses instead of failing the caller.

use super::{error::CacheResult, RedisPool};
use crate::cache::CacheError;
use async_trait::async_trait;
use bb8_redis::bb8::PooledConnection;
use bb8_redis::redis::AsyncCommands;
use bb8_redis::RedisConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

type RedisConnection<'a> = PooledConnection<'a, RedisConnectionManager>;

/// Cache operations over any serializable type
#[async_trait]
pub trait Cache<T: Serialize + DeserializeOwned + Send + Sync + 'static>: Send + Sync {
    /// Get a value from cache by key
    async fn get(&self, key: &str) -> CacheResult<Option<T>>;

    /// Set a value in cache with optional TTL
    async fn set(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Check if a key exists in cache
    async fn exists(&self, key: &str) -> CacheResult<bool>;
}

/// Redis implementation of the Cache trait
pub struct RedisCache {
    pool: RedisPool,
}

impl RedisCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    async fn get_connection(&self) -> CacheResult<RedisConnection<'_>> {
        self.pool.get().await.map_err(|e| {
            warn!("Failed to get Redis connection: {}", e);
            e.into()
        })
    }
}

#[async_trait]
impl<T: Serialize + DeserializeOwned + Send + Sync + 'static> Cache<T> for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<T>> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(None), // Graceful degradation
        };

        let result: Option<String> = conn.get(key).await.map_err(|e| {
            warn!("Redis GET failed for key '{}': {}", key, e);
            e
        })?;

        match result {
            Some(json_str) => match serde_json::from_str(&json_str) {
                Ok(value) => {
                    debug!("Cache hit for key: {}", key);
                    Ok(Some(value))
                }
                Err(e) => {
                    // A corrupt value is a miss, not a failure
                    warn!("Failed to deserialize cache value for key '{}': {}", key, e);
                    Ok(None)
                }
            },
            None => {
                debug!("Cache miss for key: {}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(()), // Graceful degradation - don't fail
        };

        let json_str = serde_json::to_string(value).map_err(|e| {
            warn!("Failed to serialize value for key '{}': {}", key, e);
            CacheError::from(e)
        })?;

        match ttl {
            Some(ttl_duration) => {
                let _: () = conn
                    .set_ex(key, json_str, ttl_duration.as_secs())
                    .await
                    .map_err(|e| {
                        warn!("Redis SET_EX failed for key '{}': {}", key, e);
                        e
                    })?;
            }
            None => {
                let _: () = conn.set(key, json_str).await.map_err(|e| {
                    warn!("Redis SET failed for key '{}': {}", key, e);
                    e
                })?;
            }
        }

        debug!("Cache set for key: {} (ttl: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(false),
        };

        let result: i32 = conn.del(key).await.map_err(|e| {
            warn!("Redis DEL failed for key '{}': {}", key, e);
            e
        })?;

        Ok(result > 0)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = match self.get_connection().await {
            Ok(conn) => conn,
            Err(_) => return Ok(false),
        };

        let result: bool = conn.exists(key).await.map_err(|e| {
            warn!("Redis EXISTS failed for key '{}': {}", key, e);
            e
        })?;

        Ok(result)
    }
}
