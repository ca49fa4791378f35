//! Marketplace information and role management handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use offermarket_core::MarketVariant;

use crate::dto::{AccountBody, InfoView, OutcomeResponse};
use crate::error::{ApiError, ApiResult};
use crate::extractors::ApiJson;
use crate::state::AppState;

/// GET /info
pub async fn get_info<V: MarketVariant>(State(state): State<Arc<AppState<V>>>) -> ApiResult<Json<InfoView>> {
    Ok(Json(state.market.info().await?.into()))
}

fn outcome(ok: bool, failure: &str) -> ApiResult<Json<OutcomeResponse>> {
    if ok {
        Ok(Json(OutcomeResponse { ok }))
    } else {
        Err(ApiError::bad_request(failure.to_string()))
    }
}

/// POST /manager
pub async fn add_manager<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    ApiJson(body): ApiJson<AccountBody>,
) -> ApiResult<Json<OutcomeResponse>> {
    outcome(
        state.market.add_manager(&body.account).await?,
        "account is already a manager",
    )
}

/// DELETE /manager/:account
pub async fn remove_manager<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    Path(account): Path<String>,
) -> ApiResult<Json<OutcomeResponse>> {
    outcome(
        state.market.remove_manager(&account).await?,
        "account is not a manager",
    )
}

/// PUT /owner
pub async fn change_owner<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    ApiJson(body): ApiJson<AccountBody>,
) -> ApiResult<Json<OutcomeResponse>> {
    outcome(
        state.market.change_owner(&body.account).await?,
        "ownership could not be transferred",
    )
}
