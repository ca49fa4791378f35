//! Subscription bodies

use serde::{Deserialize, Serialize};

pub use offermarket_events::{Subscription, SubscriptionUpdate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventList {
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCreated {
    pub id: String,
}
