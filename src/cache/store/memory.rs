use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheError, CacheStore};
use crate::clock::SharedClock;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    /// Epoch milliseconds; the entry is absent from this instant on.
    expires_at: i64,
}

impl CacheEntry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// In-process fallback used while the networked store is unavailable.
/// Expired entries are removed the first time a read observes them.
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
    clock: SharedClock,
}

impl MemoryStore {
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of stored entries, expired ones included until observed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn live(&self, key: &str) -> Option<String> {
        let now = self.clock.now_millis();
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.live(key))
    }

    async fn set(&self, key: &str, value: String, ttl_secs: i64) -> Result<(), CacheError> {
        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(ttl_secs.saturating_mul(1000));
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.live(key).is_some())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        (MemoryStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let (store, _) = store();
        assert!(store.is_empty());
        assert_eq!(store.get("missing").await.unwrap(), None);
        assert!(!store.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (store, _) = store();
        store.set("k", "\"v\"".into(), 60).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("\"v\""));
        assert!(store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_expiry() {
        let (store, clock) = store();
        store.set("k", "1".into(), 1).await.unwrap();
        store.set("k", "2".into(), 60).await.unwrap();
        clock.advance_millis(5_000);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_expired_entry_is_deleted_on_read() {
        let (store, clock) = store();
        store.set("k", "1".into(), 2).await.unwrap();
        clock.advance_millis(1_999);
        assert!(store.exists("k").await.unwrap());

        clock.advance_millis(1);
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.len(), 0);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_positive_ttl_is_already_expired() {
        let (store, _) = store();
        store.set("zero", "1".into(), 0).await.unwrap();
        store.set("negative", "1".into(), -5).await.unwrap();
        assert_eq!(store.get("zero").await.unwrap(), None);
        assert!(!store.exists("negative").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_del_and_flush() {
        let (store, _) = store();
        store.set("a", "1".into(), 60).await.unwrap();
        store.set("b", "2".into(), 60).await.unwrap();

        store.del("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
        store.del("never-set").await.unwrap();

        store.flush().await.unwrap();
        assert_eq!(store.get("b").await.unwrap(), None);
        assert!(store.is_empty());
    }
}
