//! Networked store backed by a multiplexed Redis connection.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};

use super::{CacheError, CacheStore};

/// Upper bound on connecting and on each command round-trip.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Opens a connection and checks it with `PING`.
    pub async fn connect(connection_string: &str) -> Result<Self, CacheError> {
        let client = Client::open(connection_string)?;
        let mut connection =
            bounded(client.get_multiplexed_async_connection()).await?;
        bounded(redis::cmd("PING").query_async::<String>(&mut connection)).await?;
        Ok(Self { connection })
    }
}

async fn bounded<T, F>(fut: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match tokio::time::timeout(COMMAND_TIMEOUT, fut).await {
        Ok(result) => result.map_err(CacheError::from),
        Err(_) => Err(CacheError::Timeout(COMMAND_TIMEOUT)),
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: String, ttl_secs: i64) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        match u64::try_from(ttl_secs) {
            Ok(ttl) if ttl > 0 => bounded(conn.set_ex::<_, _, ()>(key, value, ttl)).await,
            // SET EX rejects non-positive expiries; an already-expired value is an absent one.
            _ => bounded(conn.del::<_, ()>(key)).await,
        }
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        bounded(conn.del::<_, ()>(key)).await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        bounded(conn.exists::<_, bool>(key)).await
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        bounded(redis::cmd("FLUSHALL").query_async::<()>(&mut conn)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".into())
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let result = RedisStore::connect("redis://127.0.0.1:1/").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_malformed_url_fails() {
        assert!(RedisStore::connect("not a url").await.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Redis at REDIS_URL
    async fn test_round_trip_against_live_redis() {
        let store = RedisStore::connect(&redis_url()).await.unwrap();
        store.set("gatehouse:test:k", "\"v\"".into(), 60).await.unwrap();
        assert_eq!(
            store.get("gatehouse:test:k").await.unwrap().as_deref(),
            Some("\"v\"")
        );
        assert!(store.exists("gatehouse:test:k").await.unwrap());

        store.set("gatehouse:test:k", "\"v\"".into(), 0).await.unwrap();
        assert_eq!(store.get("gatehouse:test:k").await.unwrap(), None);

        store.set("gatehouse:test:d", "1".into(), 60).await.unwrap();
        store.del("gatehouse:test:d").await.unwrap();
        assert!(!store.exists("gatehouse:test:d").await.unwrap());
    }
}
