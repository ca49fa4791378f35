//! Redis-backed subscription store
//!
//! The two halves of the index live under fixed keys as JSON blobs:
//! `subscriptions` (id -> record) and `event_subscriptions`
//! (event -> [id]). Writes within one process are serialized; concurrent
//! writers in other processes can still race.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_redis::{redis::AsyncCommands, Config as RedisConfig, Pool as RedisPool, Runtime};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{EventError, Result};
use crate::store::{new_subscription_id, SubscriptionStore};
use crate::subscription::{Subscription, SubscriptionIndex, SubscriptionUpdate};

pub mod keys {
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const EVENT_SUBSCRIPTIONS: &str = "event_subscriptions";
}

pub struct RedisSubscriptionStore {
    pool: RedisPool,
    write_lock: Mutex<()>,
}

impl RedisSubscriptionStore {
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    /// Connect to `redis_url` and verify the server answers
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let pool = RedisConfig::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| EventError::Store(e.to_string()))?;

        let mut conn = pool.get().await.map_err(|e| EventError::Store(e.to_string()))?;
        let _: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| EventError::Store(e.to_string()))?;

        debug!(redis_url, "Connected subscription store");
        Ok(Self::new(pool))
    }

    async fn get_json<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let mut conn = self.pool.get().await.map_err(|e| EventError::Store(e.to_string()))?;
        let raw: Option<String> = conn.get(key).await.map_err(|e| EventError::Store(e.to_string()))?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(T::default()),
        }
    }

    async fn load(&self) -> Result<SubscriptionIndex> {
        let subscriptions: HashMap<String, Subscription> = self.get_json(keys::SUBSCRIPTIONS).await?;
        let event_subscriptions: HashMap<String, Vec<String>> =
            self.get_json(keys::EVENT_SUBSCRIPTIONS).await?;
        Ok(SubscriptionIndex {
            subscriptions,
            event_subscriptions,
        })
    }

    async fn save(&self, index: &SubscriptionIndex) -> Result<()> {
        let subscriptions = serde_json::to_string(&index.subscriptions)?;
        let event_subscriptions = serde_json::to_string(&index.event_subscriptions)?;

        let mut conn = self.pool.get().await.map_err(|e| EventError::Store(e.to_string()))?;
        conn.set::<_, _, ()>(keys::SUBSCRIPTIONS, subscriptions)
            .await
            .map_err(|e| EventError::Store(e.to_string()))?;
        conn.set::<_, _, ()>(keys::EVENT_SUBSCRIPTIONS, event_subscriptions)
            .await
            .map_err(|e| EventError::Store(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for RedisSubscriptionStore {
    async fn create(&self, subscription: Subscription) -> Result<String> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load().await?;
        let id = new_subscription_id();
        index.insert(id.clone(), subscription);
        self.save(&index).await?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Subscription>> {
        Ok(self.load().await?.get(id).cloned())
    }

    async fn update(&self, id: &str, update: SubscriptionUpdate) -> Result<Subscription> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load().await?;
        let updated = index.update(id, update)?;
        self.save(&index).await?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.load().await?;
        index
            .remove(id)
            .ok_or_else(|| EventError::SubscriptionNotFound { id: id.to_string() })?;
        self.save(&index).await
    }

    async fn subscribers(&self, event: &str) -> Result<Vec<Subscription>> {
        Ok(self.load().await?.subscribers(event))
    }
}
