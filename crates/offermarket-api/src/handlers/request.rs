//! Request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use offermarket_core::{MarketVariant, Request, RequestId};
use tracing::info;

use crate::dto::{
    CreateRequestBody, CreatedRequest, RegisterRequestExtra, RegisteredRequest, RequestList,
    RequestListQuery, RequestView, StateResponse, UpdateRequestBody,
};
use crate::error::{ApiError, ApiResult};
use crate::extractors::ApiJson;
use crate::state::AppState;

/// Listing filter of `GET /request`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFilter {
    Pending,
    Open,
    Closed,
    Decided,
    All,
}

impl RequestFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "decided" => Some(Self::Decided),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Closed includes decided requests, a decision always closes
    pub fn matches<V: MarketVariant>(&self, request: &Request<V>) -> bool {
        match self {
            Self::Pending => request.is_pending(),
            Self::Open => request.is_open() && !request.is_decided,
            Self::Closed => request.is_closed(),
            Self::Decided => request.is_decided,
            Self::All => true,
        }
    }
}

/// GET /request?state=open|closed|decided|pending|all
pub async fn list_requests<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    Query(query): Query<RequestListQuery>,
) -> ApiResult<Json<RequestList>> {
    let name = query.state.as_deref().unwrap_or("open");
    let filter = RequestFilter::parse(name)
        .ok_or_else(|| ApiError::bad_request(format!("unknown state filter '{name}'")))?;

    let requests = state
        .market
        .get_requests()
        .await?
        .iter()
        .filter(|r| filter.matches(r))
        .filter_map(RequestView::from_request)
        .collect();
    Ok(Json(RequestList { requests }))
}

/// POST /request
pub async fn create_request<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    ApiJson(body): ApiJson<CreateRequestBody>,
) -> ApiResult<Json<CreatedRequest>> {
    let id = state.market.create_request(body.deadline).await?;
    Ok(Json(CreatedRequest { id }))
}

/// GET /request/:id
pub async fn get_request<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    Path(id): Path<RequestId>,
) -> ApiResult<Json<RequestView>> {
    state
        .market
        .get_request(id)
        .await?
        .as_ref()
        .and_then(RequestView::from_request)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("request {id}")))
}

/// PUT /request/:id, closing or deciding a request
pub async fn update_request<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    Path(id): Path<RequestId>,
    ApiJson(body): ApiJson<UpdateRequestBody>,
) -> ApiResult<Json<StateResponse>> {
    let request = state
        .market
        .get_request(id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("request {id} is not defined")))?;
    if request.is_decided {
        return Err(ApiError::bad_request("the decision has been made"));
    }

    match body.state.as_str() {
        "closed" => {
            if !state.market.close_request(id).await? {
                return Err(ApiError::bad_request(format!("request {id} could not be closed")));
            }
        }
        "decided" => {
            let selected: Vec<_> = body
                .decision
                .ok_or_else(|| ApiError::bad_request("'decision' is required"))?
                .into_iter()
                .map(|item| item.id)
                .collect();
            if !state.market.decide_request_by_id(id, &selected).await? {
                return Err(ApiError::bad_request(format!("request {id} could not be decided")));
            }
        }
        other => {
            return Err(ApiError::bad_request(format!(
                "state must be 'closed' or 'decided', got '{other}'"
            )))
        }
    }

    info!(request_id = id, state = %body.state, "Request updated");
    Ok(Json(StateResponse { state: body.state }))
}

/// DELETE /request/:id
pub async fn delete_request<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    Path(id): Path<RequestId>,
) -> ApiResult<StatusCode> {
    if state.market.delete_request(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::bad_request(format!("request {id} could not be deleted")))
    }
}

/// POST /request/register, attaching the extra payload
pub async fn register_request_extra<V: MarketVariant>(
    State(state): State<Arc<AppState<V>>>,
    ApiJson(body): ApiJson<RegisterRequestExtra>,
) -> ApiResult<Json<RegisteredRequest>> {
    let request_id = body.request_id;
    if let Some(request) = state.market.get_request(request_id).await? {
        if request.is_decided {
            return Err(ApiError::bad_request("the decision has been made"));
        }
    }

    if state.market.add_request_extra(request_id, &body.extra).await? {
        Ok(Json(RegisteredRequest { request_id }))
    } else {
        Err(ApiError::bad_request(format!(
            "extra rejected for request {request_id}"
        )))
    }
}
