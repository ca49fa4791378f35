//! Polling webhook dispatcher
//!
//! Every `poll_interval` the dispatcher reads the ledger events it has not
//! seen yet and POSTs `{event, payload}` to each subscriber of the event.
//! Delivery is at-least-attempted-once: failures are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use offermarket_core::{EventSource, LedgerEvent};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{EventError, Result};
use crate::store::SubscriptionStore;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,
    pub delivery_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            delivery_timeout: Duration::from_secs(10),
        }
    }
}

/// Body POSTed to a subscriber
#[derive(Debug, Clone, Serialize)]
pub struct Delivery<'a> {
    pub event: &'a str,
    pub payload: &'a serde_json::Value,
}

/// Outcome of one polling round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub events: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    source: Arc<dyn EventSource>,
    store: Arc<dyn SubscriptionStore>,
    client: reqwest::Client,
    config: DispatcherConfig,
    cursor: u64,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn EventSource>,
        store: Arc<dyn SubscriptionStore>,
        config: DispatcherConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.delivery_timeout)
            .build()
            .map_err(|e| EventError::Source(e.to_string()))?;
        Ok(Self {
            source,
            store,
            client,
            config,
            cursor: 0,
        })
    }

    /// Skip events emitted before now
    pub async fn from_latest(mut self) -> Result<Self> {
        let events = self
            .source
            .events_since(self.cursor)
            .await
            .map_err(|e| EventError::Source(e.to_string()))?;
        if let Some(last) = events.last() {
            self.cursor = last.sequence;
        }
        Ok(self)
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Deliver everything emitted since the last round
    pub async fn poll_once(&mut self) -> Result<PollReport> {
        let events = self
            .source
            .events_since(self.cursor)
            .await
            .map_err(|e| EventError::Source(e.to_string()))?;

        let mut report = PollReport {
            events: events.len(),
            ..Default::default()
        };
        for event in &events {
            let (delivered, failed) = self.dispatch(event).await?;
            report.delivered += delivered;
            report.failed += failed;
            self.cursor = self.cursor.max(event.sequence);
        }

        if report.events > 0 {
            debug!(
                events = report.events,
                delivered = report.delivered,
                failed = report.failed,
                cursor = self.cursor,
                "Dispatch round finished"
            );
        }
        Ok(report)
    }

    async fn dispatch(&self, event: &LedgerEvent) -> Result<(usize, usize)> {
        let name = event.kind.as_str();
        let subscribers = self.store.subscribers(name).await?;
        if subscribers.is_empty() {
            return Ok((0, 0));
        }

        let body = Delivery {
            event: name,
            payload: &event.payload,
        };
        let deliveries = subscribers.iter().map(|subscription| {
            let request = self.client.post(&subscription.url).json(&body);
            async move {
                match request.send().await {
                    Ok(response) if response.status().is_success() => true,
                    Ok(response) => {
                        warn!(url = %subscription.url, event = name, status = %response.status(), "Webhook refused");
                        false
                    }
                    Err(e) => {
                        warn!(url = %subscription.url, event = name, error = %e, "Webhook delivery failed");
                        false
                    }
                }
            }
        });

        let outcomes = join_all(deliveries).await;
        let delivered = outcomes.iter().filter(|ok| **ok).count();
        Ok((delivered, outcomes.len() - delivered))
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Event dispatcher started"
        );
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "Event polling failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Event dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySubscriptionStore;
    use crate::subscription::Subscription;
    use axum::{extract::State, routing::post, Json, Router};
    use offermarket_core::{Contract, Flower, MemoryContract};
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    type Received = Arc<Mutex<Vec<Value>>>;

    async fn hook(State(received): State<Received>, Json(body): Json<Value>) {
        received.lock().await.push(body);
    }

    async fn spawn_receiver() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/hook", post(hook))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/hook"), received)
    }

    #[tokio::test]
    async fn test_delivers_subscribed_events() {
        let (url, received) = spawn_receiver().await;
        let contract = MemoryContract::new::<Flower>("0xowner");
        let store = Arc::new(MemorySubscriptionStore::new());
        store
            .create(Subscription {
                event: "RequestAdded".into(),
                url,
            })
            .await
            .unwrap();

        let mut dispatcher = Dispatcher::new(
            Arc::new(contract.clone()),
            store,
            DispatcherConfig::default(),
        )
        .unwrap();

        let request_id = contract.add_request(2_000_000_000).await.unwrap();
        let report = dispatcher.poll_once().await.unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 0);

        let bodies = received.lock().await.clone();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["event"], "RequestAdded");
        assert_eq!(bodies[0]["payload"]["request_id"], json!(request_id));

        let report = dispatcher.poll_once().await.unwrap();
        assert_eq!(report, PollReport::default());
    }

    #[tokio::test]
    async fn test_unreachable_subscriber_is_logged_and_skipped() {
        let contract = MemoryContract::new::<Flower>("0xowner");
        let store = Arc::new(MemorySubscriptionStore::new());
        store
            .create(Subscription {
                event: "RequestAdded".into(),
                url: "http://127.0.0.1:9/unreachable".into(),
            })
            .await
            .unwrap();
        let mut dispatcher = Dispatcher::new(
            Arc::new(contract.clone()),
            store,
            DispatcherConfig {
                poll_interval: Duration::from_millis(10),
                delivery_timeout: Duration::from_secs(2),
            },
        )
        .unwrap();

        contract.add_request(2_000_000_000).await.unwrap();
        let report = dispatcher.poll_once().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(dispatcher.cursor(), 2);
    }

    #[tokio::test]
    async fn test_from_latest_skips_history() {
        let contract = MemoryContract::new::<Flower>("0xowner");
        contract.add_request(2_000_000_000).await.unwrap();
        let dispatcher = Dispatcher::new(
            Arc::new(contract.clone()),
            Arc::new(MemorySubscriptionStore::new()),
            DispatcherConfig::default(),
        )
        .unwrap()
        .from_latest()
        .await
        .unwrap();
        assert_eq!(dispatcher.cursor(), 2);
    }
}
