//! HTTP ledger binding
//!
//! [`HttpContract`] implements [`Contract`] against the REST API served by
//! `offermarket-api`, so a [`offermarket_core::Marketplace`] can drive a
//! remote marketplace exactly as it drives a local ledger.
//!
//! Response mapping:
//! - `404` on a read is `None`
//! - `400` on a mutation is `false`; for calls that return a new id it is
//!   [`ContractError::Rejected`] when the body carries a ledger status and
//!   [`ContractError::Refused`] otherwise
//! - `401` is [`ContractError::AccessDenied`]
//! - anything else is [`ContractError::Upstream`]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use offermarket_api::dto::{
    parse_timestamp, AccountBody, CreateOfferBody, CreateRequestBody, CreatedOffer, CreatedRequest,
    DecisionItem, InfoView, OfferView, RegisterOfferExtra, RegisterRequestExtra, RequestList, RequestView,
    UpdateRequestBody,
};
use offermarket_api::error::ErrorResponse;
use offermarket_core::{
    Contract, ContractError, ContractResult, ContractStatus, Extra, MarketInfo, OfferCommon, OfferId,
    RequestCommon, RequestId, Stage,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the marketplace server
    pub endpoint: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// What a call produced, before it is shaped into a [`Contract`] result
enum Outcome {
    Done(Response),
    NotFound,
    Refused(Option<ErrorResponse>),
}

/// Marketplace ledger reached through the REST API
#[derive(Clone)]
pub struct HttpContract {
    config: Arc<ClientConfig>,
    client: Client,
}

impl HttpContract {
    /// Connect to a server with default settings
    pub fn connect(endpoint: &str) -> ContractResult<Self> {
        Self::with_config(ClientConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        })
    }

    pub fn with_config(config: ClientConfig) -> ContractResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ContractError::upstream(e.to_string()))?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn call(&self, request: RequestBuilder) -> ContractResult<Outcome> {
        let response = request
            .send()
            .await
            .map_err(|e| ContractError::upstream(e.to_string()))?;
        let status = response.status();
        debug!(url = %response.url(), status = %status, "Marketplace call");

        if status.is_success() {
            return Ok(Outcome::Done(response));
        }
        match status {
            StatusCode::NOT_FOUND => Ok(Outcome::NotFound),
            StatusCode::UNAUTHORIZED => Err(ContractError::AccessDenied),
            StatusCode::BAD_REQUEST => Ok(Outcome::Refused(response.json::<ErrorResponse>().await.ok())),
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(ContractError::upstream(format!("{status}: {text}")))
            }
        }
    }

    /// A read: `404` is `None`
    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> ContractResult<Option<T>> {
        match self.call(self.client.get(self.url(path))).await? {
            Outcome::Done(response) => decode(response).await.map(Some),
            Outcome::NotFound => Ok(None),
            Outcome::Refused(body) => Err(refused_read(path, body)),
        }
    }

    /// A mutation reporting success as a flag: `400` is `false`
    async fn mutate(&self, request: RequestBuilder) -> ContractResult<bool> {
        match self.call(request).await? {
            Outcome::Done(_) => Ok(true),
            Outcome::Refused(body) => {
                if let Some(body) = body {
                    debug!(code = %body.code, message = %body.message, "Marketplace refused the call");
                }
                Ok(false)
            }
            Outcome::NotFound => Ok(false),
        }
    }

    /// A mutation returning a new entity: `400` is a rejection
    async fn create<T: DeserializeOwned>(&self, request: RequestBuilder) -> ContractResult<T> {
        match self.call(request).await? {
            Outcome::Done(response) => decode(response).await,
            Outcome::Refused(Some(body)) => match body.ledger_status.and_then(ContractStatus::from_code) {
                Some(status) => Err(ContractError::Rejected { status }),
                None => Err(ContractError::Refused { message: body.message }),
            },
            Outcome::Refused(None) => Err(ContractError::Refused {
                message: "creation refused without a reason".to_string(),
            }),
            Outcome::NotFound => Err(ContractError::upstream("creation endpoint not found")),
        }
    }

    async fn request_view(&self, request_id: RequestId) -> ContractResult<Option<RequestView>> {
        self.fetch(&format!("/request/{request_id}")).await
    }

    async fn offer_view(&self, offer_id: OfferId) -> ContractResult<Option<OfferView>> {
        self.fetch(&format!("/offer/{offer_id}")).await
    }

    async fn update_request(&self, request_id: RequestId, body: &UpdateRequestBody) -> ContractResult<bool> {
        self.mutate(self.client.put(self.url(&format!("/request/{request_id}"))).json(body))
            .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ContractResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ContractError::upstream(format!("malformed response: {e}")))
}

fn refused_read(path: &str, body: Option<ErrorResponse>) -> ContractError {
    let reason = body.map(|b| b.message).unwrap_or_default();
    ContractError::upstream(format!("read of {path} refused: {reason}"))
}

/// Recover the raw ledger fields from a rendered request
fn request_common(view: &RequestView) -> ContractResult<RequestCommon> {
    let deadline = parse_timestamp(&view.deadline)
        .ok_or_else(|| ContractError::upstream(format!("unreadable deadline '{}'", view.deadline)))?;
    let (stage, is_decided) = match view.state.as_str() {
        "decided" => (Stage::Closed, true),
        other => (
            Stage::parse(other).ok_or_else(|| ContractError::upstream(format!("unknown state '{other}'")))?,
            false,
        ),
    };

    Ok(RequestCommon {
        deadline,
        stage,
        is_decided,
        maker: view.from.clone(),
        offer_ids: view.offers.clone(),
        decided_offer_ids: view.decision.clone(),
        decided_at: view.decided.as_deref().and_then(parse_timestamp),
    })
}

fn offer_common(view: &OfferView) -> ContractResult<OfferCommon> {
    let stage = Stage::parse(&view.state)
        .ok_or_else(|| ContractError::upstream(format!("unknown state '{}'", view.state)))?;
    Ok(OfferCommon {
        request_id: view.request_id,
        author: view.author.clone().unwrap_or_default(),
        stage,
    })
}

#[async_trait]
impl Contract for HttpContract {
    async fn get_request_ids(&self) -> ContractResult<Vec<RequestId>> {
        let list: Option<RequestList> = self.fetch("/request?state=all").await?;
        Ok(list
            .map(|l| l.requests.into_iter().map(|r| r.id).collect())
            .unwrap_or_default())
    }

    async fn get_request(&self, request_id: RequestId) -> ContractResult<Option<RequestCommon>> {
        self.request_view(request_id)
            .await?
            .as_ref()
            .map(request_common)
            .transpose()
    }

    async fn get_request_extra(&self, request_id: RequestId) -> ContractResult<Option<Extra>> {
        Ok(self.request_view(request_id).await?.map(|v| v.extra))
    }

    async fn add_request(&self, deadline: i64) -> ContractResult<RequestId> {
        let created: CreatedRequest = self
            .create(self.client.post(self.url("/request")).json(&CreateRequestBody { deadline }))
            .await?;
        Ok(created.id)
    }

    async fn add_request_extra(&self, request_id: RequestId, extra: &[Value]) -> ContractResult<bool> {
        let body = RegisterRequestExtra {
            request_id,
            extra: extra.to_vec(),
        };
        self.mutate(self.client.post(self.url("/request/register")).json(&body))
            .await
    }

    async fn decide_request(
        &self,
        request_id: RequestId,
        selected_offer_ids: &[OfferId],
    ) -> ContractResult<bool> {
        let body = UpdateRequestBody {
            state: "decided".to_string(),
            decision: Some(selected_offer_ids.iter().map(|&id| DecisionItem { id }).collect()),
        };
        self.update_request(request_id, &body).await
    }

    async fn get_offer(&self, offer_id: OfferId) -> ContractResult<Option<OfferCommon>> {
        self.offer_view(offer_id).await?.as_ref().map(offer_common).transpose()
    }

    async fn get_offer_extra(&self, offer_id: OfferId) -> ContractResult<Option<Extra>> {
        Ok(self
            .offer_view(offer_id)
            .await?
            .map(|v| v.extra.unwrap_or_default()))
    }

    async fn add_offer(&self, request_id: RequestId) -> ContractResult<OfferId> {
        let created: CreatedOffer = self
            .create(self.client.post(self.url("/offer")).json(&CreateOfferBody { request_id }))
            .await?;
        Ok(created.offer_id)
    }

    async fn add_offer_extra(&self, offer_id: OfferId, extra: &[Value]) -> ContractResult<bool> {
        let body = RegisterOfferExtra {
            offer_id,
            extra: extra.to_vec(),
        };
        self.mutate(self.client.post(self.url("/offer/register")).json(&body))
            .await
    }

    async fn close_request(&self, request_id: RequestId) -> ContractResult<bool> {
        let body = UpdateRequestBody {
            state: "closed".to_string(),
            decision: None,
        };
        self.update_request(request_id, &body).await
    }

    async fn delete_request(&self, request_id: RequestId) -> ContractResult<bool> {
        self.mutate(self.client.delete(self.url(&format!("/request/{request_id}"))))
            .await
    }

    async fn add_manager(&self, account: &str) -> ContractResult<bool> {
        let body = AccountBody {
            account: account.to_string(),
        };
        self.mutate(self.client.post(self.url("/manager")).json(&body)).await
    }

    async fn remove_manager(&self, account: &str) -> ContractResult<bool> {
        self.mutate(self.client.delete(self.url(&format!("/manager/{account}"))))
            .await
    }

    async fn change_owner(&self, account: &str) -> ContractResult<bool> {
        let body = AccountBody {
            account: account.to_string(),
        };
        self.mutate(self.client.put(self.url("/owner")).json(&body)).await
    }

    async fn info(&self) -> ContractResult<MarketInfo> {
        let view: Option<InfoView> = self.fetch("/info").await?;
        view.map(MarketInfo::from)
            .ok_or_else(|| ContractError::upstream("server does not expose /info"))
    }
}
