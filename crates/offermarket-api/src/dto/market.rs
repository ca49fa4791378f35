//! Request, offer and marketplace information bodies

use chrono::{DateTime, Utc};
use offermarket_core::{Extra, MarketInfo, MarketVariant, Offer, OfferId, Request, RequestId};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Render a Unix timestamp as RFC 3339
pub fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

/// Parse an RFC 3339 date/time or a plain Unix timestamp
pub fn parse_timestamp(value: &str) -> Option<i64> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.timestamp());
    }
    value.trim().parse().ok()
}

/// Accept a deadline as Unix seconds or as a string [`parse_timestamp`] reads
fn deserialize_deadline<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Deadline {
        Secs(i64),
        Text(String),
    }

    match Deadline::deserialize(deserializer)? {
        Deadline::Secs(secs) => Ok(secs),
        Deadline::Text(text) => {
            parse_timestamp(&text).ok_or_else(|| de::Error::custom(format!("invalid deadline '{text}'")))
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestView {
    pub id: RequestId,
    /// Account that created the request
    pub from: Option<String>,
    pub deadline: String,
    pub extra: Extra,
    /// `pending`, `open`, `closed` or `decided`
    pub state: String,
    pub offers: Vec<OfferId>,
    pub decision: Vec<OfferId>,
    /// Decision time, once decided
    pub decided: Option<String>,
}

impl RequestView {
    pub fn from_request<V: MarketVariant>(request: &Request<V>) -> Option<Self> {
        Some(Self {
            id: request.request_id?,
            from: request.maker.clone(),
            deadline: format_timestamp(request.deadline),
            extra: request.marshal_extra(),
            state: request.state_str().to_string(),
            offers: request.offer_ids(),
            decision: request.decided_offer_ids(),
            decided: request.decided_at.map(format_timestamp),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestList {
    pub requests: Vec<RequestView>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestListQuery {
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequestBody {
    /// Deadline in seconds since the Unix epoch; RFC 3339 accepted on input
    #[serde(deserialize_with = "deserialize_deadline")]
    pub deadline: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedRequest {
    pub id: RequestId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionItem {
    pub id: OfferId,
}

/// Body of `PUT /request/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequestBody {
    /// `closed` or `decided`
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Vec<DecisionItem>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequestExtra {
    pub request_id: RequestId,
    pub extra: Extra,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredRequest {
    pub request_id: RequestId,
}

// =============================================================================
// Offers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferView {
    pub id: OfferId,
    pub request_id: RequestId,
    pub author: Option<String>,
    /// Absent while the offer is pending
    pub extra: Option<Extra>,
    /// `pending`, `open` or `closed`
    pub state: String,
}

impl OfferView {
    pub fn from_offer<V: MarketVariant>(offer: &Offer<V>) -> Option<Self> {
        Some(Self {
            id: offer.offer_id?,
            request_id: offer.request_id,
            author: offer.author.clone(),
            extra: (!offer.is_pending()).then(|| offer.marshal_extra()),
            state: offer.stage.as_str().to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferList {
    pub offers: Vec<OfferView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOfferBody {
    pub request_id: RequestId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedOffer {
    pub offer_id: OfferId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterOfferExtra {
    pub offer_id: OfferId,
    pub extra: Extra,
}

// =============================================================================
// Marketplace
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractLocation {
    pub address: String,
    pub network: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoView {
    #[serde(rename = "type")]
    pub type_name: String,
    pub contract: ContractLocation,
    pub owner: String,
}

impl From<MarketInfo> for InfoView {
    fn from(info: MarketInfo) -> Self {
        Self {
            type_name: info.type_name,
            contract: ContractLocation {
                address: info.address,
                network: info.network,
            },
            owner: info.owner,
        }
    }
}

impl From<InfoView> for MarketInfo {
    fn from(view: InfoView) -> Self {
        Self {
            type_name: view.type_name,
            owner: view.owner,
            address: view.contract.address,
            network: view.contract.network,
        }
    }
}

/// Body of the manager and owner endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBody {
    pub account: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub ok: bool,
}
