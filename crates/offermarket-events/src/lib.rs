//! Offermarket Events - webhook subscriptions on ledger events
//!
//! Clients subscribe a URL to an event name. A [`Dispatcher`] polls the
//! ledger's [`offermarket_core::EventSource`] and POSTs each new event to its
//! subscribers. There is no acknowledgement, retry or deduplication.

pub mod dispatcher;
pub mod error;
pub mod redis;
pub mod store;
pub mod subscription;

pub use dispatcher::{Delivery, Dispatcher, DispatcherConfig, PollReport};
pub use error::{EventError, Result};
pub use redis::RedisSubscriptionStore;
pub use store::{MemorySubscriptionStore, SubscriptionStore};
pub use subscription::{Subscription, SubscriptionIndex, SubscriptionUpdate};
