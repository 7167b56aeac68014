//! Key-value cache that keeps answering when Redis does not.
//!
//! The facade starts `Connected` when a Redis URL is configured and reachable,
//! otherwise `Degraded` on an in-process map. Any store failure while connected
//! drops it to `Degraded` for good, unless a reconnection probe is running.
//! No method returns an error: failures are logged and turned into a miss or
//! `false`.

pub mod keys;
pub mod operations;
pub mod store;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::clock::{self, SharedClock};
use store::{CacheError, CacheStore, MemoryStore, RedisStore};

pub const DEFAULT_TTL_SECS: i64 = 3600;

pub type ConnectFuture =
    Pin<Box<dyn Future<Output = Result<Arc<dyn CacheStore>, CacheError>> + Send>>;

/// Opens a fresh remote store when a degraded cache tries to reconnect.
pub type Connector = Arc<dyn Fn() -> ConnectFuture + Send + Sync>;

fn redis_connector(url: String) -> Connector {
    Arc::new(move || -> ConnectFuture {
        let url = url.clone();
        Box::pin(async move {
            let store = RedisStore::connect(&url).await?;
            Ok::<_, CacheError>(Arc::new(store) as Arc<dyn CacheStore>)
        })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    Connected,
    Degraded,
}

pub struct Cache {
    remote: RwLock<Option<Arc<dyn CacheStore>>>,
    local: Arc<MemoryStore>,
    connector: Option<Connector>,
}

impl Cache {
    /// Connects to `redis_url` if given; a missing URL or a failed connection
    /// yields a degraded cache.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        Self::connect_with_clock(redis_url, clock::system()).await
    }

    pub async fn connect_with_clock(redis_url: Option<&str>, clock: SharedClock) -> Self {
        let remote: Option<Arc<dyn CacheStore>> = match redis_url {
            Some(url) => match RedisStore::connect(url).await {
                Ok(store) => {
                    tracing::info!("Cache connected to Redis");
                    Some(Arc::new(store))
                }
                Err(e) => {
                    tracing::warn!("Redis unavailable ({}), cache running in memory", e);
                    None
                }
            },
            None => {
                tracing::info!("No REDIS_URL configured, cache running in memory");
                None
            }
        };

        Self {
            remote: RwLock::new(remote),
            local: Arc::new(MemoryStore::new(clock)),
            connector: redis_url.map(|url| redis_connector(url.to_string())),
        }
    }

    /// Degraded from the start.
    pub fn in_memory(clock: SharedClock) -> Self {
        Self {
            remote: RwLock::new(None),
            local: Arc::new(MemoryStore::new(clock)),
            connector: None,
        }
    }

    /// Connected to an already-built store.
    pub fn with_store(remote: Arc<dyn CacheStore>, clock: SharedClock) -> Self {
        Self {
            remote: RwLock::new(Some(remote)),
            local: Arc::new(MemoryStore::new(clock)),
            connector: None,
        }
    }

    /// Replaces the way [`Cache::try_reconnect`] opens a remote store.
    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connector = Some(connector);
        self
    }

    pub async fn mode(&self) -> CacheMode {
        if self.remote.read().await.is_some() {
            CacheMode::Connected
        } else {
            CacheMode::Degraded
        }
    }

    async fn store(&self) -> Arc<dyn CacheStore> {
        match self.remote.read().await.as_ref() {
            Some(remote) => remote.clone(),
            None => self.local.clone() as Arc<dyn CacheStore>,
        }
    }

    /// Degrades only if `failed` is still the active remote store; a late error
    /// from a replaced connection leaves the current one alone.
    async fn fail(
        &self,
        op: &'static str,
        key: &str,
        err: CacheError,
        failed: &Arc<dyn CacheStore>,
    ) {
        if !err.is_store_failure() {
            tracing::warn!(op, key, "Cache payload rejected: {}", err);
            return;
        }
        let mut remote = self.remote.write().await;
        if remote.as_ref().is_some_and(|current| Arc::ptr_eq(current, failed)) {
            remote.take();
            tracing::warn!(op, key, "Cache store failed ({}), switching to in-memory mode", err);
        } else {
            tracing::warn!(op, key, "Cache operation failed: {}", err);
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let store = self.store().await;
        let raw = match store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                self.fail("get", key, e, &store).await;
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                self.fail("get", key, e.into(), &store).await;
                None
            }
        }
    }

    /// Stores `value` for `ttl_secs` seconds; zero or less stores nothing
    /// retrievable.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: i64) -> bool {
        let store = self.store().await;
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                self.fail("set", key, e.into(), &store).await;
                return false;
            }
        };
        match store.set(key, raw, ttl_secs).await {
            Ok(()) => true,
            Err(e) => {
                self.fail("set", key, e, &store).await;
                false
            }
        }
    }

    /// [`Cache::set`] with the one-hour default TTL.
    pub async fn set_default<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        self.set(key, value, DEFAULT_TTL_SECS).await
    }

    pub async fn del(&self, key: &str) -> bool {
        let store = self.store().await;
        match store.del(key).await {
            Ok(()) => true,
            Err(e) => {
                self.fail("del", key, e, &store).await;
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        let store = self.store().await;
        match store.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                self.fail("exists", key, e, &store).await;
                false
            }
        }
    }

    pub async fn flush(&self) -> bool {
        let store = self.store().await;
        match store.flush().await {
            Ok(()) => true,
            Err(e) => {
                self.fail("flush", "*", e, &store).await;
                false
            }
        }
    }

    /// Read-through: returns the cached value, or runs `load` and writes its
    /// result back for `ttl_secs`. Loader errors are passed through uncached.
    pub async fn remember<T, E, F, Fut>(&self, key: &str, ttl_secs: i64, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Ok(hit);
        }
        let value = load().await?;
        self.set(key, &value, ttl_secs).await;
        Ok(value)
    }

    /// Tries to bring a degraded cache back onto Redis. Entries held in memory
    /// are dropped on success. Returns whether the cache is connected afterwards.
    pub async fn try_reconnect(&self) -> bool {
        if self.mode().await == CacheMode::Connected {
            return true;
        }
        let Some(connector) = self.connector.as_ref() else {
            return false;
        };
        match connector().await {
            Ok(store) => {
                let mut remote = self.remote.write().await;
                if remote.is_none() {
                    *remote = Some(store);
                    self.local.clear();
                    tracing::info!("Cache reconnected to Redis");
                }
                true
            }
            Err(e) => {
                tracing::debug!("Redis still unavailable: {}", e);
                false
            }
        }
    }

    /// Periodically calls [`Cache::try_reconnect`] while degraded. Stops when
    /// the cache is dropped. Nothing is spawned without a way to reconnect.
    pub fn spawn_reconnect_probe(self: &Arc<Self>, every: Duration) -> Option<JoinHandle<()>> {
        self.connector.as_ref()?;
        let weak: Weak<Self> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                if cache.mode().await == CacheMode::Degraded {
                    cache.try_reconnect().await;
                }
            }
        }))
    }
}
