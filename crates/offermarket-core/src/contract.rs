//! The capability boundary between the marketplace and its backing ledger

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ContractResult;
use crate::types::{EventKind, Extra, LedgerEvent, MarketInfo, OfferCommon, OfferId, RequestCommon, RequestId};

/// Raw request and offer primitives exposed by a ledger binding.
///
/// Not-found is signalled by `None`, never by an error. Business-rule
/// failures of mutating calls come back as `Ok(false)`; only the distinct
/// access-denied condition and transport failures are errors. Calls complete
/// before returning: a binding that waits for ledger finality does so inside
/// the call.
#[async_trait]
pub trait Contract: Send + Sync {
    /// All known request identifiers, in no guaranteed order
    async fn get_request_ids(&self) -> ContractResult<Vec<RequestId>>;

    /// Common request fields, or `None` for an unknown id
    async fn get_request(&self, request_id: RequestId) -> ContractResult<Option<RequestCommon>>;

    /// Marketplace-specific payload of a request.
    ///
    /// `None` for an unknown id, an empty list while no payload is attached.
    async fn get_request_extra(&self, request_id: RequestId) -> ContractResult<Option<Extra>>;

    /// Create a pending request and return its id
    async fn add_request(&self, deadline: i64) -> ContractResult<RequestId>;

    /// Attach or replace the payload of a request
    async fn add_request_extra(&self, request_id: RequestId, extra: &[Value]) -> ContractResult<bool>;

    /// Decide a request with an optional (sometimes ignored) selection of offers
    async fn decide_request(
        &self,
        request_id: RequestId,
        selected_offer_ids: &[OfferId],
    ) -> ContractResult<bool>;

    /// Common offer fields, or `None` for an unknown id
    async fn get_offer(&self, offer_id: OfferId) -> ContractResult<Option<OfferCommon>>;

    /// Marketplace-specific payload of an offer
    async fn get_offer_extra(&self, offer_id: OfferId) -> ContractResult<Option<Extra>>;

    /// Create a pending offer on a request and return its id
    async fn add_offer(&self, request_id: RequestId) -> ContractResult<OfferId>;

    /// Attach the payload of an offer
    async fn add_offer_extra(&self, offer_id: OfferId, extra: &[Value]) -> ContractResult<bool>;

    async fn close_request(&self, request_id: RequestId) -> ContractResult<bool>;

    async fn delete_request(&self, request_id: RequestId) -> ContractResult<bool>;

    async fn add_manager(&self, account: &str) -> ContractResult<bool>;

    async fn remove_manager(&self, account: &str) -> ContractResult<bool>;

    async fn change_owner(&self, account: &str) -> ContractResult<bool>;

    /// Type name, owner and location of the deployed marketplace
    async fn info(&self) -> ContractResult<MarketInfo>;
}

/// Read access to the events a ledger has emitted
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Events with a sequence number strictly greater than `cursor`
    async fn events_since(&self, cursor: u64) -> ContractResult<Vec<LedgerEvent>>;

    /// Event kinds this ledger can emit
    fn event_kinds(&self) -> Vec<EventKind> {
        EventKind::ALL.to_vec()
    }
}
