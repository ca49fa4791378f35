//! Subscription records and the event index kept alongside them

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};

/// A webhook registered for one event name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub event: String,
    pub url: String,
}

/// Partial update of a subscription; at least one field must be set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl SubscriptionUpdate {
    pub fn is_empty(&self) -> bool {
        self.event.is_none() && self.url.is_none()
    }
}

/// Subscriptions keyed by id, plus the `event -> [id]` index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionIndex {
    pub subscriptions: HashMap<String, Subscription>,
    pub event_subscriptions: HashMap<String, Vec<String>>,
}

impl SubscriptionIndex {
    pub fn insert(&mut self, id: String, subscription: Subscription) {
        self.event_subscriptions
            .entry(subscription.event.clone())
            .or_default()
            .push(id.clone());
        self.subscriptions.insert(id, subscription);
    }

    pub fn get(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.get(id)
    }

    pub fn update(&mut self, id: &str, update: SubscriptionUpdate) -> Result<Subscription> {
        if update.is_empty() {
            return Err(EventError::EmptyUpdate);
        }
        let current = self
            .subscriptions
            .get(id)
            .cloned()
            .ok_or_else(|| EventError::SubscriptionNotFound { id: id.to_string() })?;

        let mut updated = current.clone();
        if let Some(event) = update.event {
            if event != current.event {
                self.unindex(&current.event, id);
                self.event_subscriptions
                    .entry(event.clone())
                    .or_default()
                    .push(id.to_string());
            }
            updated.event = event;
        }
        if let Some(url) = update.url {
            updated.url = url;
        }
        self.subscriptions.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    pub fn remove(&mut self, id: &str) -> Option<Subscription> {
        let removed = self.subscriptions.remove(id)?;
        self.unindex(&removed.event, id);
        Some(removed)
    }

    /// Subscriptions registered for `event`
    pub fn subscribers(&self, event: &str) -> Vec<Subscription> {
        self.event_subscriptions
            .get(event)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.subscriptions.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn unindex(&mut self, event: &str, id: &str) {
        if let Some(ids) = self.event_subscriptions.get_mut(event) {
            ids.retain(|existing| existing != id);
            if ids.is_empty() {
                self.event_subscriptions.remove(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(event: &str, url: &str) -> Subscription {
        Subscription {
            event: event.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_insert_indexes_by_event() {
        let mut index = SubscriptionIndex::default();
        index.insert("a".into(), sub("RequestAdded", "http://one"));
        index.insert("b".into(), sub("RequestAdded", "http://two"));
        index.insert("c".into(), sub("OfferAdded", "http://three"));

        assert_eq!(index.event_subscriptions["RequestAdded"], vec!["a", "b"]);
        assert_eq!(index.subscribers("RequestAdded").len(), 2);
        assert!(index.subscribers("RequestDecided").is_empty());
    }

    #[test]
    fn test_update_moves_index_entry() {
        let mut index = SubscriptionIndex::default();
        index.insert("a".into(), sub("RequestAdded", "http://one"));

        let updated = index
            .update(
                "a",
                SubscriptionUpdate {
                    event: Some("RequestExtraAdded".into()),
                    url: None,
                },
            )
            .unwrap();
        assert_eq!(updated, sub("RequestExtraAdded", "http://one"));
        assert!(index.subscribers("RequestAdded").is_empty());
        assert_eq!(index.subscribers("RequestExtraAdded"), vec![updated]);

        let updated = index
            .update(
                "a",
                SubscriptionUpdate {
                    event: None,
                    url: Some("http://new".into()),
                },
            )
            .unwrap();
        assert_eq!(updated.url, "http://new");
    }

    #[test]
    fn test_update_errors() {
        let mut index = SubscriptionIndex::default();
        assert!(matches!(
            index.update("x", SubscriptionUpdate { event: None, url: Some("u".into()) }),
            Err(EventError::SubscriptionNotFound { .. })
        ));
        index.insert("a".into(), sub("RequestAdded", "http://one"));
        assert!(matches!(
            index.update("a", SubscriptionUpdate::default()),
            Err(EventError::EmptyUpdate)
        ));
    }

    #[test]
    fn test_remove_clears_index() {
        let mut index = SubscriptionIndex::default();
        index.insert("a".into(), sub("RequestAdded", "http://one"));
        assert!(index.remove("a").is_some());
        assert!(index.remove("a").is_none());
        assert!(index.event_subscriptions.is_empty());
    }

    #[test]
    fn test_json_layout() {
        let mut index = SubscriptionIndex::default();
        index.insert("a".into(), sub("OfferAdded", "http://one"));
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["subscriptions"]["a"]["url"], "http://one");
        assert_eq!(json["event_subscriptions"]["OfferAdded"][0], "a");
    }
}
