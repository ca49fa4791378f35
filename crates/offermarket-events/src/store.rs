//! Subscription persistence

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EventError, Result};
use crate::subscription::{Subscription, SubscriptionIndex, SubscriptionUpdate};

/// Storage of webhook subscriptions
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Store a subscription and return its new id
    async fn create(&self, subscription: Subscription) -> Result<String>;

    async fn get(&self, id: &str) -> Result<Option<Subscription>>;

    async fn update(&self, id: &str, update: SubscriptionUpdate) -> Result<Subscription>;

    /// Remove a subscription; fails for an unknown id
    async fn delete(&self, id: &str) -> Result<()>;

    /// Subscriptions registered for `event`
    async fn subscribers(&self, event: &str) -> Result<Vec<Subscription>>;
}

pub(crate) fn new_subscription_id() -> String {
    Uuid::new_v4().to_string()
}

/// Process-local subscription store
#[derive(Debug, Clone, Default)]
pub struct MemorySubscriptionStore {
    index: Arc<RwLock<SubscriptionIndex>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.subscriptions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn create(&self, subscription: Subscription) -> Result<String> {
        let id = new_subscription_id();
        self.index.write().await.insert(id.clone(), subscription);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Subscription>> {
        Ok(self.index.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, update: SubscriptionUpdate) -> Result<Subscription> {
        self.index.write().await.update(id, update)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.index
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| EventError::SubscriptionNotFound { id: id.to_string() })
    }

    async fn subscribers(&self, event: &str) -> Result<Vec<Subscription>> {
        Ok(self.index.read().await.subscribers(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemorySubscriptionStore::new();
        let id = store
            .create(Subscription {
                event: "RequestAdded".into(),
                url: "http://localhost/hook".into(),
            })
            .await
            .unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(store.subscribers("RequestAdded").await.unwrap().len(), 1);

        let updated = store
            .update(
                &id,
                SubscriptionUpdate {
                    event: Some("OfferAdded".into()),
                    url: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.event, "OfferAdded");
        assert_eq!(store.get(&id).await.unwrap(), Some(updated));

        store.delete(&id).await.unwrap();
        assert!(store.is_empty().await);
        assert!(matches!(
            store.delete(&id).await,
            Err(EventError::SubscriptionNotFound { .. })
        ));
    }
}
