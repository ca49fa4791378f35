//! Offer handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use offermarket_core::{ContractStatus, MarketError, MarketVariant, OfferId};

use crate::dto::{CreateOfferBody, CreatedOffer, OfferList, OfferView, RegisterOfferExtra};
use crate::error::{ApiError, ApiResult};
use crate::extractors::ApiJson;
use crate::state::AppState;

/// GET /offer
pub async fn list_offers<V: MarketVariant>(State(state): State<Arc<AppState<V>>>) -> ApiResult<Json<OfferList>> {
    let offers = state
        .market
        .get_all_offers()
        .await?
        .iter()
        .filter_map(OfferView::from_offer)
        .collect();
    Ok(Json(OfferList { offers }))
}

/// POST /offer
pub async fn create_offer<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    ApiJson(body): ApiJson<CreateOfferBody>,
) -> ApiResult<Json<CreatedOffer>> {
    if let Some(request) = state.market.get_request(body.request_id).await? {
        if request.is_decided {
            return Err(MarketError::Rejected {
                operation: "add_offer",
                status: Some(ContractStatus::RequestNotOpen),
            }
            .into());
        }
    }
    let offer_id = state.market.create_offer(body.request_id).await?;
    Ok(Json(CreatedOffer { offer_id }))
}

/// GET /offer/:id
pub async fn get_offer<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    Path(id): Path<OfferId>,
) -> ApiResult<Json<OfferView>> {
    state
        .market
        .get_offer(id)
        .await?
        .as_ref()
        .and_then(OfferView::from_offer)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("offer {id}")))
}

/// POST /offer/register, attaching the extra payload
pub async fn register_offer_extra<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    ApiJson(body): ApiJson<RegisterOfferExtra>,
) -> ApiResult<Json<CreatedOffer>> {
    let offer_id = body.offer_id;
    if state.market.get_offer(offer_id).await?.is_none() {
        return Err(ApiError::bad_request(format!("offer {offer_id} is not defined")));
    }

    if state.market.add_offer_extra(offer_id, &body.extra).await? {
        Ok(Json(CreatedOffer { offer_id }))
    } else {
        Err(ApiError::bad_request(format!("extra rejected for offer {offer_id}")))
    }
}
