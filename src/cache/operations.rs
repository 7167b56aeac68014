//! Entity-scoped shortcuts over [`Cache`]: each entity gets its own key
//! namespace and default TTL.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Cache;
use super::keys::{self, ORG_TTL_SECS, PROPERTY_TTL_SECS, USER_TTL_SECS};

impl Cache {
    pub async fn get_user<T: DeserializeOwned>(&self, user_id: &str) -> Option<T> {
        self.get(&keys::user_key(user_id)).await
    }

    pub async fn set_user<T: Serialize + ?Sized>(&self, user_id: &str, user: &T) -> bool {
        self.set(&keys::user_key(user_id), user, USER_TTL_SECS).await
    }

    pub async fn invalidate_user(&self, user_id: &str) -> bool {
        self.del(&keys::user_key(user_id)).await
    }

    pub async fn get_property<T: DeserializeOwned>(&self, property_id: &str) -> Option<T> {
        self.get(&keys::property_key(property_id)).await
    }

    pub async fn set_property<T: Serialize + ?Sized>(&self, property_id: &str, property: &T) -> bool {
        self.set(&keys::property_key(property_id), property, PROPERTY_TTL_SECS)
            .await
    }

    pub async fn invalidate_property(&self, property_id: &str) -> bool {
        self.del(&keys::property_key(property_id)).await
    }

    pub async fn get_org<T: DeserializeOwned>(&self, org_id: &str) -> Option<T> {
        self.get(&keys::org_key(org_id)).await
    }

    pub async fn set_org<T: Serialize + ?Sized>(&self, org_id: &str, org: &T) -> bool {
        self.set(&keys::org_key(org_id), org, ORG_TTL_SECS).await
    }

    pub async fn invalidate_org(&self, org_id: &str) -> bool {
        self.del(&keys::org_key(org_id)).await
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::Cache;
    use crate::clock::ManualClock;
    use serde_json::{Value, json};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_entities_use_their_own_namespace() {
        let cache = Cache::in_memory(Arc::new(ManualClock::new(0)));
        assert!(cache.set_user("1", &json!({"name": "Ada"})).await);
        assert!(cache.set_property("1", &json!({"address": "1 Main St"})).await);

        assert_eq!(cache.get::<Value>("user:1").await, Some(json!({"name": "Ada"})));
        assert_eq!(
            cache.get_property::<Value>("1").await,
            Some(json!({"address": "1 Main St"}))
        );
        assert_eq!(cache.get_org::<Value>("1").await, None);
    }

    #[tokio::test]
    async fn test_entity_ttls_differ() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = Cache::in_memory(clock.clone());
        cache.set_user("u", "x").await;
        cache.set_property("p", "x").await;
        cache.set_org("o", "x").await;

        clock.advance_millis(1_800_000);
        assert_eq!(cache.get_user::<String>("u").await, None);
        assert!(cache.get_property::<String>("p").await.is_some());

        clock.advance_millis(1_800_000);
        assert_eq!(cache.get_property::<String>("p").await, None);
        assert!(cache.get_org::<String>("o").await.is_some());

        clock.advance_millis(3_600_000);
        assert_eq!(cache.get_org::<String>("o").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let cache = Cache::in_memory(Arc::new(ManualClock::new(0)));
        cache.set_org("acme", &json!({"plan": "pro"})).await;
        assert!(cache.invalidate_org("acme").await);
        assert_eq!(cache.get_org::<Value>("acme").await, None);

        cache.set_user("u", "x").await;
        cache.set_property("p", "x").await;
        assert!(cache.invalidate_user("u").await);
        assert!(cache.invalidate_property("p").await);
        assert!(!cache.exists("user:u").await);
        assert!(!cache.exists("property:p").await);
    }
}
