//! Role-gated orchestration over a [`Contract`]
//!
//! The marketplace is the only component with business rules. It hydrates
//! requests and offers from raw ledger data, and checks the caller's role
//! before any state-changing call reaches the ledger.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::contract::Contract;
use crate::entity::{Offer, Request};
use crate::error::{MarketError, Result};
use crate::types::{MarketInfo, OfferId, RequestId};
use crate::variant::{MarketVariant, Payload};

/// Capabilities granted to the calling identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Roles {
    pub is_manager: bool,
    pub is_owner: bool,
}

impl Roles {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn manager() -> Self {
        Self {
            is_manager: true,
            is_owner: false,
        }
    }

    pub fn owner() -> Self {
        Self {
            is_manager: true,
            is_owner: true,
        }
    }
}

/// The offer marketplace for flavour `V`
pub struct Marketplace<V: MarketVariant> {
    contract: Arc<dyn Contract>,
    roles: Roles,
    _variant: PhantomData<V>,
}

impl<V: MarketVariant> Clone for Marketplace<V> {
    fn clone(&self) -> Self {
        Self {
            contract: self.contract.clone(),
            roles: self.roles,
            _variant: PhantomData,
        }
    }
}

impl<V: MarketVariant> Marketplace<V> {
    pub fn new(contract: Arc<dyn Contract>, roles: Roles) -> Self {
        Self {
            contract,
            roles,
            _variant: PhantomData,
        }
    }

    pub fn is_manager(&self) -> bool {
        self.roles.is_manager
    }

    pub fn is_owner(&self) -> bool {
        self.roles.is_owner
    }

    pub fn contract(&self) -> &Arc<dyn Contract> {
        &self.contract
    }

    pub fn market_type(&self) -> &'static str {
        V::TYPE_NAME
    }

    fn require_manager(&self, operation: &'static str) -> Result<()> {
        if !self.roles.is_manager {
            warn!(operation, "Manager access required");
            return Err(MarketError::ManagerAccessRequired);
        }
        Ok(())
    }

    fn require_owner(&self, operation: &'static str) -> Result<()> {
        if !self.roles.is_owner {
            warn!(operation, "Owner access required");
            return Err(MarketError::OwnerAccessRequired);
        }
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// All requests, fully hydrated
    pub async fn get_requests(&self) -> Result<Vec<Request<V>>> {
        let ids = self
            .contract
            .get_request_ids()
            .await
            .map_err(|e| MarketError::from_contract("get_request_ids", e))?;

        let mut requests = Vec::with_capacity(ids.len());
        for request_id in ids {
            let request = self.get_request(request_id).await?.ok_or_else(|| {
                MarketError::inconsistent(format!("request {request_id} listed but not found"))
            })?;
            requests.push(request);
        }
        Ok(requests)
    }

    /// One request with its offers and decided offers, or `None`
    pub async fn get_request(&self, request_id: RequestId) -> Result<Option<Request<V>>> {
        debug!(request_id, "Fetching request");
        let Some(common) = self
            .contract
            .get_request(request_id)
            .await
            .map_err(|e| MarketError::from_contract("get_request", e))?
        else {
            return Ok(None);
        };

        let extra = self
            .contract
            .get_request_extra(request_id)
            .await
            .map_err(|e| MarketError::from_contract("get_request_extra", e))?
            .unwrap_or_default();

        let mut hydrated: HashMap<OfferId, Offer<V>> = HashMap::new();
        let mut offers = Vec::with_capacity(common.offer_ids.len());
        for &offer_id in &common.offer_ids {
            let offer = self.require_offer(request_id, offer_id).await?;
            hydrated.insert(offer_id, offer.clone());
            offers.push(offer);
        }

        let mut decided_offers = Vec::with_capacity(common.decided_offer_ids.len());
        for &offer_id in &common.decided_offer_ids {
            let offer = match hydrated.get(&offer_id) {
                Some(offer) => offer.clone(),
                None => self.require_offer(request_id, offer_id).await?,
            };
            decided_offers.push(offer);
        }

        Request::from_data(request_id, &common, &extra, offers, decided_offers).map(Some)
    }

    async fn require_offer(&self, request_id: RequestId, offer_id: OfferId) -> Result<Offer<V>> {
        self.get_offer(offer_id).await?.ok_or_else(|| {
            MarketError::inconsistent(format!(
                "offer {offer_id} referenced by request {request_id} not found"
            ))
        })
    }

    /// One offer, or `None`
    pub async fn get_offer(&self, offer_id: OfferId) -> Result<Option<Offer<V>>> {
        debug!(offer_id, "Fetching offer");
        let Some(common) = self
            .contract
            .get_offer(offer_id)
            .await
            .map_err(|e| MarketError::from_contract("get_offer", e))?
        else {
            return Ok(None);
        };

        let extra = self
            .contract
            .get_offer_extra(offer_id)
            .await
            .map_err(|e| MarketError::from_contract("get_offer_extra", e))?
            .unwrap_or_default();

        Offer::from_data(offer_id, &common, &extra).map(Some)
    }

    /// Offers made on one request, or `None` for an unknown request
    pub async fn get_offers(&self, request_id: RequestId) -> Result<Option<Vec<Offer<V>>>> {
        Ok(self.get_request(request_id).await?.map(|r| r.offers))
    }

    /// Offers across every request
    pub async fn get_all_offers(&self) -> Result<Vec<Offer<V>>> {
        Ok(self
            .get_requests()
            .await?
            .into_iter()
            .flat_map(|r| r.offers)
            .collect())
    }

    pub async fn info(&self) -> Result<MarketInfo> {
        self.contract
            .info()
            .await
            .map_err(|e| MarketError::from_contract("info", e))
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Submit a new request and attach its payload.
    ///
    /// Creation takes two ledger calls. When the payload is refused after
    /// the request exists, the orphan is closed and deleted before the
    /// error is returned; `compensated` reports whether that cleanup worked.
    pub async fn add_request(&self, request: &Request<V>) -> Result<Request<V>> {
        if request.request_id.is_some() {
            return Err(MarketError::precondition("request already has an id"));
        }
        self.require_manager("add_request")?;
        if request.extra.is_none() {
            return Err(MarketError::precondition("request has no extra payload"));
        }

        let request_id = self
            .contract
            .add_request(request.deadline)
            .await
            .map_err(|e| MarketError::from_contract("add_request", e))?;

        let attached = self
            .contract
            .add_request_extra(request_id, &request.marshal_extra())
            .await;
        match attached {
            Ok(true) => {}
            Ok(false) => {
                let compensated = self.compensate_request(request_id).await;
                return Err(MarketError::RequestExtraRejected {
                    request_id,
                    compensated,
                });
            }
            Err(e) => {
                self.compensate_request(request_id).await;
                return Err(MarketError::from_contract("add_request_extra", e));
            }
        }

        info!(request_id, deadline = request.deadline, "Request submitted");
        self.get_request(request_id).await?.ok_or_else(|| {
            MarketError::inconsistent(format!("request {request_id} vanished after creation"))
        })
    }

    async fn compensate_request(&self, request_id: RequestId) -> bool {
        warn!(request_id, "Extra payload rejected, removing orphaned request");
        let closed = matches!(self.contract.close_request(request_id).await, Ok(true));
        let deleted = matches!(self.contract.delete_request(request_id).await, Ok(true));
        if !(closed && deleted) {
            warn!(request_id, closed, deleted, "Orphaned request could not be removed");
        }
        closed && deleted
    }

    /// First half of [`Marketplace::add_request`]: create a pending request
    pub async fn create_request(&self, deadline: i64) -> Result<RequestId> {
        self.require_manager("create_request")?;
        let request_id = self
            .contract
            .add_request(deadline)
            .await
            .map_err(|e| MarketError::from_contract("add_request", e))?;
        info!(request_id, deadline, "Request created");
        Ok(request_id)
    }

    /// Second half of [`Marketplace::add_request`]: attach a payload
    pub async fn add_request_extra(&self, request_id: RequestId, extra: &[Value]) -> Result<bool> {
        self.require_manager("add_request_extra")?;
        V::RequestExtra::unmarshal(extra)?;
        let ok = self
            .contract
            .add_request_extra(request_id, extra)
            .await
            .map_err(|e| MarketError::from_contract("add_request_extra", e))?;
        if !ok {
            warn!(request_id, "Request extra rejected");
        }
        Ok(ok)
    }

    /// Decide a request with the given offers
    pub async fn decide_request(&self, request: &Request<V>, offers: &[Offer<V>]) -> Result<bool> {
        let request_id = request
            .request_id
            .ok_or_else(|| MarketError::precondition("request has no id"))?;
        let selected = offers
            .iter()
            .map(|o| o.offer_id.ok_or_else(|| MarketError::precondition("offer has no id")))
            .collect::<Result<Vec<_>>>()?;
        self.decide_request_by_id(request_id, &selected).await
    }

    /// Decide a request by id with the given selection of offer ids
    pub async fn decide_request_by_id(&self, request_id: RequestId, selected: &[OfferId]) -> Result<bool> {
        self.require_manager("decide_request")?;
        V::DECISION_POLICY
            .check_selection(selected)
            .map_err(MarketError::invalid_decision)?;

        let ok = self
            .contract
            .decide_request(request_id, selected)
            .await
            .map_err(|e| MarketError::from_contract("decide_request", e))?;
        if ok {
            info!(request_id, selected = ?selected, "Request decided");
        } else {
            warn!(request_id, "Decision rejected");
        }
        Ok(ok)
    }

    pub async fn close_request(&self, request_id: RequestId) -> Result<bool> {
        self.require_manager("close_request")?;
        let ok = self
            .contract
            .close_request(request_id)
            .await
            .map_err(|e| MarketError::from_contract("close_request", e))?;
        if ok {
            info!(request_id, "Request closed");
        }
        Ok(ok)
    }

    pub async fn delete_request(&self, request_id: RequestId) -> Result<bool> {
        self.require_manager("delete_request")?;
        let ok = self
            .contract
            .delete_request(request_id)
            .await
            .map_err(|e| MarketError::from_contract("delete_request", e))?;
        if ok {
            info!(request_id, "Request deleted");
        }
        Ok(ok)
    }

    // ========================================================================
    // Offers
    // ========================================================================

    /// Submit a new offer and attach its payload.
    ///
    /// The ledger has no offer deletion, so an offer whose payload is refused
    /// stays pending and is never considered by a decision.
    pub async fn add_offer(&self, offer: &Offer<V>) -> Result<Offer<V>> {
        if offer.offer_id.is_some() {
            return Err(MarketError::precondition("offer already has an id"));
        }
        if offer.extra.is_none() {
            return Err(MarketError::precondition("offer has no extra payload"));
        }

        let offer_id = self
            .contract
            .add_offer(offer.request_id)
            .await
            .map_err(|e| MarketError::from_contract("add_offer", e))?;

        let ok = self
            .contract
            .add_offer_extra(offer_id, &offer.marshal_extra())
            .await
            .map_err(|e| MarketError::from_contract("add_offer_extra", e))?;
        if !ok {
            warn!(offer_id, "Offer extra rejected, offer stays pending");
            return Err(MarketError::OfferExtraRejected {
                offer_id,
                compensated: false,
            });
        }

        info!(offer_id, request_id = offer.request_id, "Offer submitted");
        self.get_offer(offer_id).await?.ok_or_else(|| {
            MarketError::inconsistent(format!("offer {offer_id} vanished after creation"))
        })
    }

    /// First half of [`Marketplace::add_offer`]
    pub async fn create_offer(&self, request_id: RequestId) -> Result<OfferId> {
        let offer_id = self
            .contract
            .add_offer(request_id)
            .await
            .map_err(|e| MarketError::from_contract("add_offer", e))?;
        info!(offer_id, request_id, "Offer created");
        Ok(offer_id)
    }

    /// Second half of [`Marketplace::add_offer`]
    pub async fn add_offer_extra(&self, offer_id: OfferId, extra: &[Value]) -> Result<bool> {
        V::OfferExtra::unmarshal(extra)?;
        let ok = self
            .contract
            .add_offer_extra(offer_id, extra)
            .await
            .map_err(|e| MarketError::from_contract("add_offer_extra", e))?;
        if !ok {
            warn!(offer_id, "Offer extra rejected");
        }
        Ok(ok)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    pub async fn add_manager(&self, account: &str) -> Result<bool> {
        self.require_owner("add_manager")?;
        self.contract
            .add_manager(account)
            .await
            .map_err(|e| MarketError::from_contract("add_manager", e))
    }

    pub async fn remove_manager(&self, account: &str) -> Result<bool> {
        self.require_owner("remove_manager")?;
        self.contract
            .remove_manager(account)
            .await
            .map_err(|e| MarketError::from_contract("remove_manager", e))
    }

    pub async fn change_owner(&self, account: &str) -> Result<bool> {
        self.require_owner("change_owner")?;
        self.contract
            .change_owner(account)
            .await
            .map_err(|e| MarketError::from_contract("change_owner", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Contract;
    use crate::error::ContractResult;
    use crate::types::{Extra, OfferCommon, RequestCommon, Stage};
    use crate::variants::{Flower, FlowerOfferExtra, FlowerRequestExtra, FlowerType, Generic};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Contract returning canned data and recording every call
    #[derive(Default)]
    struct SpyContract {
        requests: HashMap<RequestId, (RequestCommon, Extra)>,
        offers: HashMap<OfferId, (OfferCommon, Extra)>,
        listed_ids: Vec<RequestId>,
        accept_extra: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl SpyContract {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn mutations(&self) -> Vec<&'static str> {
            self.calls()
                .into_iter()
                .filter(|c| !c.starts_with("get_") && *c != "info")
                .collect()
        }
    }

    #[async_trait]
    impl Contract for SpyContract {
        async fn get_request_ids(&self) -> ContractResult<Vec<RequestId>> {
            self.record("get_request_ids");
            Ok(self.listed_ids.clone())
        }

        async fn get_request(&self, request_id: RequestId) -> ContractResult<Option<RequestCommon>> {
            self.record("get_request");
            Ok(self.requests.get(&request_id).map(|(c, _)| c.clone()))
        }

        async fn get_request_extra(&self, request_id: RequestId) -> ContractResult<Option<Extra>> {
            self.record("get_request_extra");
            Ok(self.requests.get(&request_id).map(|(_, e)| e.clone()))
        }

        async fn add_request(&self, _deadline: i64) -> ContractResult<RequestId> {
            self.record("add_request");
            Ok(1)
        }

        async fn add_request_extra(&self, _request_id: RequestId, _extra: &[Value]) -> ContractResult<bool> {
            self.record("add_request_extra");
            Ok(self.accept_extra)
        }

        async fn decide_request(&self, _request_id: RequestId, _selected: &[OfferId]) -> ContractResult<bool> {
            self.record("decide_request");
            Ok(true)
        }

        async fn get_offer(&self, offer_id: OfferId) -> ContractResult<Option<OfferCommon>> {
            self.record("get_offer");
            Ok(self.offers.get(&offer_id).map(|(c, _)| c.clone()))
        }

        async fn get_offer_extra(&self, offer_id: OfferId) -> ContractResult<Option<Extra>> {
            self.record("get_offer_extra");
            Ok(self.offers.get(&offer_id).map(|(_, e)| e.clone()))
        }

        async fn add_offer(&self, _request_id: RequestId) -> ContractResult<OfferId> {
            self.record("add_offer");
            Ok(1)
        }

        async fn add_offer_extra(&self, _offer_id: OfferId, _extra: &[Value]) -> ContractResult<bool> {
            self.record("add_offer_extra");
            Ok(self.accept_extra)
        }

        async fn close_request(&self, _request_id: RequestId) -> ContractResult<bool> {
            self.record("close_request");
            Ok(true)
        }

        async fn delete_request(&self, _request_id: RequestId) -> ContractResult<bool> {
            self.record("delete_request");
            Ok(true)
        }

        async fn add_manager(&self, _account: &str) -> ContractResult<bool> {
            self.record("add_manager");
            Ok(true)
        }

        async fn remove_manager(&self, _account: &str) -> ContractResult<bool> {
            self.record("remove_manager");
            Ok(true)
        }

        async fn change_owner(&self, _account: &str) -> ContractResult<bool> {
            self.record("change_owner");
            Ok(true)
        }

        async fn info(&self) -> ContractResult<MarketInfo> {
            self.record("info");
            Ok(MarketInfo {
                type_name: Flower::TYPE_NAME.into(),
                owner: "0xowner".into(),
                address: "spy".into(),
                network: "spy".into(),
            })
        }
    }

    fn decided_request_spy() -> SpyContract {
        let mut spy = SpyContract::default();
        spy.requests.insert(
            1,
            (
                RequestCommon {
                    deadline: 2_000_000_000,
                    stage: Stage::Closed,
                    is_decided: true,
                    maker: None,
                    offer_ids: vec![4, 5],
                    decided_offer_ids: vec![5],
                    decided_at: Some(1_900_000_000),
                },
                vec![json!(2), json!(0)],
            ),
        );
        for (id, price) in [(4, 10), (5, 20)] {
            spy.offers.insert(
                id,
                (
                    OfferCommon {
                        request_id: 1,
                        author: "0xbidder".into(),
                        stage: Stage::Open,
                    },
                    vec![json!(price)],
                ),
            );
        }
        spy.listed_ids = vec![1];
        spy
    }

    fn flower_request() -> Request<Flower> {
        Request::new(
            2_000_000_000,
            FlowerRequestExtra {
                quantity: 1,
                flower_type: FlowerType::Tulip,
            },
        )
    }

    #[tokio::test]
    async fn test_hydration_composes_offers() {
        let market = Marketplace::<Flower>::new(Arc::new(decided_request_spy()), Roles::none());
        let request = market.get_request(1).await.unwrap().unwrap();

        let mut offer_ids = request.offer_ids();
        offer_ids.sort_unstable();
        assert_eq!(offer_ids, vec![4, 5]);
        assert_eq!(request.decided_offer_ids(), vec![5]);
        assert_eq!(
            request.decided_offer().and_then(|o| o.extra),
            Some(FlowerOfferExtra { price: 20 })
        );
    }

    #[tokio::test]
    async fn test_reads_are_idempotent() {
        let market = Marketplace::<Flower>::new(Arc::new(decided_request_spy()), Roles::none());
        let first = market.get_request(1).await.unwrap();
        let second = market.get_request(1).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let market = Marketplace::<Flower>::new(Arc::new(SpyContract::default()), Roles::owner());
        assert!(market.get_request(42).await.unwrap().is_none());
        assert!(market.get_offer(42).await.unwrap().is_none());
        assert!(market.get_offers(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listed_but_missing_request_is_inconsistent() {
        let mut spy = SpyContract::default();
        spy.listed_ids = vec![3];
        let market = Marketplace::<Flower>::new(Arc::new(spy), Roles::none());
        assert!(matches!(
            market.get_requests().await,
            Err(MarketError::Inconsistent { .. })
        ));
    }

    #[tokio::test]
    async fn test_manager_gate_precedes_contract() {
        let spy = Arc::new(SpyContract::default());
        let market = Marketplace::<Flower>::new(spy.clone(), Roles::none());

        let results = vec![
            market.add_request(&flower_request()).await.map(|_| true),
            market.create_request(5).await.map(|_| true),
            market.add_request_extra(1, &[json!(1), json!(1)]).await,
            market.decide_request_by_id(1, &[]).await,
            market.close_request(1).await,
            market.delete_request(1).await,
        ];
        for result in results {
            assert!(matches!(result, Err(MarketError::ManagerAccessRequired)));
        }
        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn test_owner_gate_precedes_contract() {
        let spy = Arc::new(SpyContract::default());
        let market = Marketplace::<Flower>::new(spy.clone(), Roles::manager());

        assert!(matches!(market.add_manager("0xa").await, Err(MarketError::OwnerAccessRequired)));
        assert!(matches!(market.remove_manager("0xa").await, Err(MarketError::OwnerAccessRequired)));
        assert!(matches!(market.change_owner("0xa").await, Err(MarketError::OwnerAccessRequired)));
        assert!(spy.calls().is_empty());

        let owner = Marketplace::<Flower>::new(spy.clone(), Roles::owner());
        assert!(owner.add_manager("0xa").await.unwrap());
        assert_eq!(spy.mutations(), vec!["add_manager"]);
    }

    #[tokio::test]
    async fn test_rejected_extra_is_compensated() {
        let spy = Arc::new(SpyContract::default());
        let market = Marketplace::<Flower>::new(spy.clone(), Roles::manager());

        let result = market.add_request(&flower_request()).await;
        assert!(matches!(
            result,
            Err(MarketError::RequestExtraRejected {
                request_id: 1,
                compensated: true
            })
        ));
        assert_eq!(
            spy.mutations(),
            vec!["add_request", "add_request_extra", "close_request", "delete_request"]
        );
    }

    #[tokio::test]
    async fn test_rejected_offer_extra_is_reported() {
        let spy = Arc::new(SpyContract::default());
        let market = Marketplace::<Flower>::new(spy.clone(), Roles::none());
        let offer = Offer::<Flower>::new(1, FlowerOfferExtra { price: 3 });

        assert!(matches!(
            market.add_offer(&offer).await,
            Err(MarketError::OfferExtraRejected {
                offer_id: 1,
                compensated: false
            })
        ));
        assert_eq!(spy.mutations(), vec!["add_offer", "add_offer_extra"]);
    }

    #[tokio::test]
    async fn test_preconditions() {
        let spy = Arc::new(SpyContract::default());
        let market = Marketplace::<Flower>::new(spy.clone(), Roles::owner());

        let mut created = flower_request();
        created.request_id = Some(9);
        assert!(matches!(
            market.add_request(&created).await,
            Err(MarketError::Precondition { .. })
        ));

        assert!(matches!(
            market.add_request_extra(1, &[json!("lots")]).await,
            Err(MarketError::Payload(_))
        ));
        assert!(spy.calls().is_empty());
    }

    #[tokio::test]
    async fn test_decision_policy_checked_first() {
        let spy = Arc::new(SpyContract::default());
        let market = Marketplace::<Generic>::new(spy.clone(), Roles::manager());

        assert!(matches!(
            market.decide_request_by_id(1, &[2, 2]).await,
            Err(MarketError::InvalidDecision { .. })
        ));
        assert!(spy.calls().is_empty());

        assert!(market.decide_request_by_id(1, &[2, 3]).await.unwrap());
        assert_eq!(spy.mutations(), vec!["decide_request"]);
    }
}
