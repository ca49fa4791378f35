//! Webhook subscription handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use offermarket_core::MarketVariant;
use offermarket_events::EventError;
use tracing::info;

use crate::dto::{EventList, Subscription, SubscriptionCreated, SubscriptionUpdate};
use crate::error::ApiResult;
use crate::extractors::ApiJson;
use crate::state::AppState;

fn check_event<V: MarketVariant>(state: &AppState<V>, name: &str) -> Result<(), EventError> {
    if state.knows_event(name) {
        Ok(())
    } else {
        Err(EventError::UnknownEvent {
            name: name.to_string(),
        })
    }
}

/// GET /subscription/events
pub async fn list_events<V: MarketVariant>(State(state): State<Arc<AppState<V>>>) -> Json<EventList> {
    Json(EventList {
        events: state
            .event_kinds
            .iter()
            .map(|kind| kind.as_str().to_string())
            .collect(),
    })
}

/// POST /subscription
pub async fn subscribe<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    ApiJson(body): ApiJson<Subscription>,
) -> ApiResult<Json<SubscriptionCreated>> {
    check_event(&state, &body.event)?;
    let event = body.event.clone();
    let id = state.subscriptions.create(body).await?;
    info!(subscription_id = %id, event = %event, "Subscription created");
    Ok(Json(SubscriptionCreated { id }))
}

/// GET /subscription/:id
pub async fn get_subscription<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Subscription>> {
    let subscription = state
        .subscriptions
        .get(&id)
        .await?
        .ok_or(EventError::SubscriptionNotFound { id })?;
    Ok(Json(subscription))
}

/// PUT /subscription/:id
pub async fn update_subscription<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SubscriptionUpdate>,
) -> ApiResult<Json<Subscription>> {
    if let Some(event) = &body.event {
        check_event(&state, event)?;
    }
    let updated = state.subscriptions.update(&id, body).await?;
    info!(subscription_id = %id, "Subscription updated");
    Ok(Json(updated))
}

/// DELETE /subscription/:id
pub async fn unsubscribe<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.subscriptions.delete(&id).await?;
    info!(subscription_id = %id, "Subscription deleted");
    Ok(StatusCode::NO_CONTENT)
}
