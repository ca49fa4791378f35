//! Application state shared across handlers

use std::sync::Arc;

use offermarket_core::{EventKind, MarketVariant, Marketplace};
use offermarket_events::SubscriptionStore;

/// Shared application state
pub struct AppState<V: MarketVariant> {
    /// Marketplace acting with the server's identity and roles
    pub market: Marketplace<V>,
    /// Webhook subscriptions
    pub subscriptions: Arc<dyn SubscriptionStore>,
    /// Event names clients may subscribe to
    pub event_kinds: Vec<EventKind>,
}

impl<V: MarketVariant> AppState<V> {
    pub fn new(market: Marketplace<V>, subscriptions: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            market,
            subscriptions,
            event_kinds: EventKind::ALL.to_vec(),
        }
    }

    pub fn with_event_kinds(mut self, event_kinds: Vec<EventKind>) -> Self {
        self.event_kinds = event_kinds;
        self
    }

    pub fn knows_event(&self, name: &str) -> bool {
        self.event_kinds.iter().any(|kind| kind.as_str() == name)
    }
}
