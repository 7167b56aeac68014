//! Backing stores behind the cache facade.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[from] ::redis::RedisError),
    #[error("cache store did not answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("cache payload could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Whether the store itself is unhealthy, as opposed to a bad payload.
    pub fn is_store_failure(&self) -> bool {
        !matches!(self, CacheError::Serialization(_))
    }
}

/// String-valued key-value store with per-key expiry. Values are JSON
/// documents produced by the facade.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` for `ttl_secs`. A TTL of zero or less leaves the key absent.
    async fn set(&self, key: &str, value: String, ttl_secs: i64) -> Result<(), CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    async fn flush(&self) -> Result<(), CacheError>;
}
