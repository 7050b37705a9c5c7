use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::service::user::{User, UserPatch};

use super::{MergeStrategy, StorageError, UserStore};

#[derive(Clone, Debug)]
pub struct MemoryCache<T: Clone> {
    cache: Arc<DashMap<String, T>>,
}

impl<T: Clone> MemoryCache<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Arc::new(DashMap::with_capacity(capacity)),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.cache.get(key).map(|value| value.value().clone())
    }

    pub fn set(&self, key: &str, value: T) {
        self.cache.insert(key.to_string(), value);
    }

    pub fn del(&self, key: &str) -> Option<T> {
        self.cache.remove(key).map(|(_, value)| value)
    }

    /// Keeps only the entries for which `keep` returns true, returns how many were dropped.
    pub fn retain(&self, mut keep: impl FnMut(&str, &T) -> bool) -> usize {
        let before = self.cache.len();
        self.cache.retain(|key, value| keep(key, value));
        before.saturating_sub(self.cache.len())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }
}

/// User documents kept in process memory.
///
/// DashMap shard locks make each document operation atomic.
#[derive(Clone, Debug)]
pub struct MemoryUserStore {
    documents: MemoryCache<User>,
}

impl MemoryUserStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            documents: MemoryCache::new(capacity),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert(&self, user_id: &str, patch: &UserPatch, strategy: MergeStrategy) -> Result<(), StorageError> {
        self.documents
            .cache
            .entry(user_id.to_string())
            .or_insert_with(|| User::new(user_id))
            .apply(patch, strategy);
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        Ok(self.documents.get(user_id))
    }

    async fn update(&self, user_id: &str, patch: &UserPatch) -> Result<(), StorageError> {
        match self.documents.cache.get_mut(user_id) {
            Some(mut document) => {
                document.apply(patch, MergeStrategy::Merge);
                Ok(())
            }
            None => Err(StorageError::NotFound(user_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::subscription::SubscriptionTier;

    fn profile(username: &str) -> UserPatch {
        UserPatch {
            username: Some(username.to_string()),
            subscription_tier: Some(SubscriptionTier::None),
            is_subscribed: Some(false),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_missing_user_returns_none() {
        let store = MemoryUserStore::new(4);
        assert!(store.get("42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let store = MemoryUserStore::new(4);
        let result = store.update("42", &UserPatch::subscription(SubscriptionTier::Free)).await;
        assert!(matches!(result, Err(StorageError::NotFound(id)) if id == "42"));
    }

    #[tokio::test]
    async fn test_merge_keeps_fields_missing_from_patch() {
        let store = MemoryUserStore::new(4);
        store.upsert("42", &profile("joe"), MergeStrategy::Merge).await.unwrap();

        let business = UserPatch {
            name: Some("Joe's Salon".to_string()),
            ..Default::default()
        };
        store.upsert("42", &business, MergeStrategy::Merge).await.unwrap();

        let user = store.get("42").await.unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("joe"));
        assert_eq!(user.name.as_deref(), Some("Joe's Salon"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_keep_existing_does_not_overwrite() {
        let store = MemoryUserStore::new(4);
        store.upsert("42", &profile("joe"), MergeStrategy::KeepExisting).await.unwrap();
        store
            .update("42", &UserPatch::subscription(SubscriptionTier::Premium))
            .await
            .unwrap();

        store
            .upsert("42", &profile("joe_renamed"), MergeStrategy::KeepExisting)
            .await
            .unwrap();

        let user = store.get("42").await.unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("joe"));
        assert_eq!(user.tier(), SubscriptionTier::Premium);
        assert!(user.is_subscribed());
    }

    #[test]
    fn test_memory_cache_retain() {
        let cache = MemoryCache::new(4);
        cache.set("a", 1);
        cache.set("b", 5);
        cache.set("c", 9);

        let dropped = cache.retain(|_, value| *value > 4);

        assert_eq!(dropped, 1);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c"), Some(9));
        assert_eq!(cache.del("b"), Some(5));
    }
}
