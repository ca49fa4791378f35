//! In-memory ledger binding
//!
//! Reproduces the stage rules and status codes of the on-chain marketplace
//! contract:
//! - ids start at 1 and are never reused
//! - the owner is also the first manager
//! - a valid extra payload opens a pending request or offer
//! - an open request past its deadline reports `Closed`
//! - a decision closes the request for good
//! - only closed requests may be deleted
//!
//! Every mutating call records a `FunctionStatus` event carrying its status
//! code, and successful calls also record their specific event.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::contract::{Contract, EventSource};
use crate::error::{ContractError, ContractResult};
use crate::types::{
    ContractStatus, EventKind, Extra, LedgerEvent, MarketInfo, OfferCommon, OfferId, RequestCommon,
    RequestId, Stage,
};
use crate::variant::{DecisionPolicy, MarketVariant, Payload};

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time in seconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self(AtomicI64::new(now))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Flavour-specific rules the ledger applies, erased from the variant type
#[derive(Clone)]
struct LedgerRules {
    type_name: &'static str,
    policy: DecisionPolicy,
    request_valid: fn(&[Value]) -> bool,
    offer_valid: fn(&[Value]) -> bool,
    rank: fn(&[Value]) -> Option<i128>,
}

fn payload_valid<P: Payload>(extra: &[Value]) -> bool {
    P::unmarshal(extra).map(|p| p.is_valid()).unwrap_or(false)
}

fn rank_extra<V: MarketVariant>(extra: &[Value]) -> Option<i128> {
    V::OfferExtra::unmarshal(extra).ok().and_then(|p| V::rank_offer(&p))
}

impl LedgerRules {
    fn for_variant<V: MarketVariant>() -> Self {
        Self {
            type_name: V::TYPE_NAME,
            policy: V::DECISION_POLICY,
            request_valid: payload_valid::<V::RequestExtra>,
            offer_valid: payload_valid::<V::OfferExtra>,
            rank: rank_extra::<V>,
        }
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone)]
struct RequestRecord {
    deadline: i64,
    stage: Stage,
    is_decided: bool,
    maker: String,
    offer_ids: Vec<OfferId>,
    decided_offer_ids: Vec<OfferId>,
    decided_at: Option<i64>,
    extra: Extra,
}

impl RequestRecord {
    /// Stage as observed at `now`: an open request past its deadline is closed
    fn stage_at(&self, now: i64) -> Stage {
        if self.stage.is_open() && now > self.deadline {
            Stage::Closed
        } else {
            self.stage
        }
    }
}

#[derive(Debug, Clone)]
struct OfferRecord {
    request_id: RequestId,
    author: String,
    stage: Stage,
    extra: Extra,
}

#[derive(Debug)]
struct LedgerState {
    owner: String,
    managers: HashSet<String>,
    requests: BTreeMap<RequestId, RequestRecord>,
    offers: BTreeMap<OfferId, OfferRecord>,
    next_request_id: RequestId,
    next_offer_id: OfferId,
    events: Vec<LedgerEvent>,
}

impl LedgerState {
    fn new(owner: String) -> Self {
        let mut managers = HashSet::new();
        managers.insert(owner.clone());
        Self {
            owner,
            managers,
            requests: BTreeMap::new(),
            offers: BTreeMap::new(),
            next_request_id: 1,
            next_offer_id: 1,
            events: Vec::new(),
        }
    }

    fn emit(&mut self, kind: EventKind, payload: Value) {
        let sequence = self.events.len() as u64 + 1;
        self.events.push(LedgerEvent {
            sequence,
            kind,
            payload,
        });
    }

    /// Record the outcome of a mutating call
    fn status(&mut self, function: &'static str, caller: &str, status: ContractStatus) -> ContractStatus {
        if status.is_success() {
            debug!(function, caller, "Ledger call succeeded");
        } else {
            warn!(function, caller, status = %status, "Ledger call failed");
        }
        self.emit(
            EventKind::FunctionStatus,
            json!({ "function": function, "caller": caller, "status": status.code() }),
        );
        status
    }
}

fn into_bool(status: ContractStatus) -> ContractResult<bool> {
    match status {
        ContractStatus::AccessDenied => Err(ContractError::AccessDenied),
        status => Ok(status.is_success()),
    }
}

fn into_id(status: ContractStatus, id: u64) -> ContractResult<u64> {
    match status {
        ContractStatus::Successful => Ok(id),
        ContractStatus::AccessDenied => Err(ContractError::AccessDenied),
        status => Err(ContractError::Rejected { status }),
    }
}

// ============================================================================
// MemoryContract
// ============================================================================

/// In-memory [`Contract`] with shared state and per-caller handles
#[derive(Clone)]
pub struct MemoryContract {
    state: Arc<RwLock<LedgerState>>,
    rules: LedgerRules,
    clock: Arc<dyn Clock>,
    caller: String,
    address: String,
    network: String,
}

impl MemoryContract {
    /// Deploy a fresh ledger for flavour `V`; `owner` is the calling identity
    pub fn new<V: MarketVariant>(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        Self {
            state: Arc::new(RwLock::new(LedgerState::new(owner.clone()))),
            rules: LedgerRules::for_variant::<V>(),
            clock: Arc::new(SystemClock),
            caller: owner,
            address: "memory://offermarket".to_string(),
            network: "memory".to_string(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_location(mut self, address: impl Into<String>, network: impl Into<String>) -> Self {
        self.address = address.into();
        self.network = network.into();
        self
    }

    /// A handle to the same ledger acting as `account`
    pub fn as_caller(&self, account: impl Into<String>) -> Self {
        Self {
            caller: account.into(),
            ..self.clone()
        }
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    pub async fn is_manager(&self, account: &str) -> bool {
        self.state.read().await.managers.contains(account)
    }

    pub async fn owner(&self) -> String {
        self.state.read().await.owner.clone()
    }

    /// Ids of requests currently observed as open
    pub async fn open_request_ids(&self) -> Vec<RequestId> {
        self.request_ids_in(Stage::Open).await
    }

    /// Ids of requests currently observed as closed
    pub async fn closed_request_ids(&self) -> Vec<RequestId> {
        self.request_ids_in(Stage::Closed).await
    }

    async fn request_ids_in(&self, stage: Stage) -> Vec<RequestId> {
        let now = self.clock.now();
        let state = self.state.read().await;
        state
            .requests
            .iter()
            .filter(|(_, r)| r.stage_at(now) == stage)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Offers ranked best first, ties broken by lower id
    fn select_winners(&self, state: &LedgerState, offer_ids: &[OfferId], max_winners: usize) -> Vec<OfferId> {
        let mut ranked: Vec<(i128, OfferId)> = offer_ids
            .iter()
            .filter_map(|id| {
                let offer = state.offers.get(id)?;
                if !offer.stage.is_open() {
                    return None;
                }
                (self.rules.rank)(&offer.extra).map(|score| (score, *id))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        ranked.into_iter().take(max_winners).map(|(_, id)| id).collect()
    }
}

#[async_trait]
impl Contract for MemoryContract {
    async fn get_request_ids(&self) -> ContractResult<Vec<RequestId>> {
        Ok(self.state.read().await.requests.keys().copied().collect())
    }

    async fn get_request(&self, request_id: RequestId) -> ContractResult<Option<RequestCommon>> {
        let now = self.clock.now();
        let state = self.state.read().await;
        Ok(state.requests.get(&request_id).map(|r| RequestCommon {
            deadline: r.deadline,
            stage: r.stage_at(now),
            is_decided: r.is_decided,
            maker: Some(r.maker.clone()),
            offer_ids: r.offer_ids.clone(),
            decided_offer_ids: r.decided_offer_ids.clone(),
            decided_at: r.decided_at,
        }))
    }

    async fn get_request_extra(&self, request_id: RequestId) -> ContractResult<Option<Extra>> {
        let state = self.state.read().await;
        Ok(state.requests.get(&request_id).map(|r| r.extra.clone()))
    }

    async fn add_request(&self, deadline: i64) -> ContractResult<RequestId> {
        let mut state = self.state.write().await;
        if !state.managers.contains(&self.caller) {
            let status = state.status("add_request", &self.caller, ContractStatus::AccessDenied);
            return into_id(status, 0);
        }

        let request_id = state.next_request_id;
        state.next_request_id += 1;
        state.requests.insert(
            request_id,
            RequestRecord {
                deadline,
                stage: Stage::Pending,
                is_decided: false,
                maker: self.caller.clone(),
                offer_ids: Vec::new(),
                decided_offer_ids: Vec::new(),
                decided_at: None,
                extra: Vec::new(),
            },
        );
        state.status("add_request", &self.caller, ContractStatus::Successful);
        state.emit(
            EventKind::RequestAdded,
            json!({ "request_id": request_id, "deadline": deadline }),
        );
        info!(request_id, deadline, "Request added");
        Ok(request_id)
    }

    async fn add_request_extra(&self, request_id: RequestId, extra: &[Value]) -> ContractResult<bool> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let caller = self.caller.as_str();

        let status = if !state.managers.contains(caller) {
            ContractStatus::AccessDenied
        } else {
            match state.requests.get(&request_id) {
                None => ContractStatus::UndefinedId,
                Some(r) if r.is_decided || r.stage_at(now).is_closed() => ContractStatus::NotPending,
                Some(_) if !(self.rules.request_valid)(extra) => ContractStatus::ImproperList,
                Some(_) => ContractStatus::Successful,
            }
        };

        if status.is_success() {
            if let Some(record) = state.requests.get_mut(&request_id) {
                record.extra = extra.to_vec();
                record.stage = Stage::Open;
            }
            state.status("add_request_extra", caller, status);
            state.emit(
                EventKind::RequestExtraAdded,
                json!({ "request_id": request_id, "extra": extra }),
            );
            info!(request_id, "Request extra attached");
        } else {
            state.status("add_request_extra", caller, status);
        }
        into_bool(status)
    }

    async fn decide_request(
        &self,
        request_id: RequestId,
        selected_offer_ids: &[OfferId],
    ) -> ContractResult<bool> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let caller = self.caller.as_str();

        let record = state.requests.get(&request_id).cloned();
        let outcome = if !state.managers.contains(caller) {
            Err(ContractStatus::AccessDenied)
        } else {
            match record {
                None => Err(ContractStatus::UndefinedId),
                Some(r) if r.is_decided || r.stage_at(now).is_pending() => Err(ContractStatus::RequestNotOpen),
                Some(r) => match self.rules.policy {
                    DecisionPolicy::ContractSelects { max_winners } => {
                        Ok(self.select_winners(&state, &r.offer_ids, max_winners))
                    }
                    DecisionPolicy::CallerSelects { .. } => {
                        let proper = selected_offer_ids.iter().all(|id| {
                            r.offer_ids.contains(id)
                                && state.offers.get(id).map(|o| o.stage.is_open()).unwrap_or(false)
                        });
                        if proper {
                            Ok(selected_offer_ids.to_vec())
                        } else {
                            Err(ContractStatus::ImproperList)
                        }
                    }
                },
            }
        };

        match outcome {
            Ok(winners) => {
                if let Some(record) = state.requests.get_mut(&request_id) {
                    record.stage = Stage::Closed;
                    record.is_decided = true;
                    record.decided_at = Some(now);
                    record.decided_offer_ids = winners.clone();
                }
                state.status("decide_request", caller, ContractStatus::Successful);
                state.emit(
                    EventKind::RequestDecided,
                    json!({ "request_id": request_id, "offer_ids": winners }),
                );
                info!(request_id, winners = ?winners, "Request decided");
                Ok(true)
            }
            Err(status) => {
                state.status("decide_request", caller, status);
                into_bool(status)
            }
        }
    }

    async fn get_offer(&self, offer_id: OfferId) -> ContractResult<Option<OfferCommon>> {
        let state = self.state.read().await;
        Ok(state.offers.get(&offer_id).map(|o| OfferCommon {
            request_id: o.request_id,
            author: o.author.clone(),
            stage: o.stage,
        }))
    }

    async fn get_offer_extra(&self, offer_id: OfferId) -> ContractResult<Option<Extra>> {
        let state = self.state.read().await;
        Ok(state.offers.get(&offer_id).map(|o| o.extra.clone()))
    }

    async fn add_offer(&self, request_id: RequestId) -> ContractResult<OfferId> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let caller = self.caller.as_str();

        let status = match state.requests.get(&request_id) {
            None => ContractStatus::UndefinedId,
            Some(r) if r.is_decided => ContractStatus::RequestNotOpen,
            Some(r) if now > r.deadline => ContractStatus::DeadlinePassed,
            Some(r) if !r.stage.is_open() => ContractStatus::RequestNotOpen,
            Some(_) => ContractStatus::Successful,
        };
        if !status.is_success() {
            state.status("add_offer", caller, status);
            return into_id(status, 0);
        }

        let offer_id = state.next_offer_id;
        state.next_offer_id += 1;
        state.offers.insert(
            offer_id,
            OfferRecord {
                request_id,
                author: caller.to_string(),
                stage: Stage::Pending,
                extra: Vec::new(),
            },
        );
        if let Some(record) = state.requests.get_mut(&request_id) {
            record.offer_ids.push(offer_id);
        }
        state.status("add_offer", caller, status);
        state.emit(
            EventKind::OfferAdded,
            json!({ "offer_id": offer_id, "request_id": request_id, "author": caller }),
        );
        info!(offer_id, request_id, author = caller, "Offer added");
        Ok(offer_id)
    }

    async fn add_offer_extra(&self, offer_id: OfferId, extra: &[Value]) -> ContractResult<bool> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let caller = self.caller.as_str();

        let status = match state.offers.get(&offer_id) {
            None => ContractStatus::UndefinedId,
            Some(o) if o.author != caller => ContractStatus::AccessDenied,
            Some(o) if !o.stage.is_pending() => ContractStatus::NotPending,
            Some(o) => match state.requests.get(&o.request_id) {
                None => ContractStatus::UndefinedId,
                Some(r) if now > r.deadline => ContractStatus::DeadlinePassed,
                Some(r) if r.is_decided || !r.stage.is_open() => ContractStatus::RequestNotOpen,
                Some(_) if !(self.rules.offer_valid)(extra) => ContractStatus::ImproperList,
                Some(_) => ContractStatus::Successful,
            },
        };

        if status.is_success() {
            if let Some(record) = state.offers.get_mut(&offer_id) {
                record.extra = extra.to_vec();
                record.stage = Stage::Open;
            }
            state.status("add_offer_extra", caller, status);
            state.emit(
                EventKind::OfferExtraAdded,
                json!({ "offer_id": offer_id, "extra": extra }),
            );
            info!(offer_id, "Offer extra attached");
        } else {
            state.status("add_offer_extra", caller, status);
        }
        into_bool(status)
    }

    async fn close_request(&self, request_id: RequestId) -> ContractResult<bool> {
        let mut state = self.state.write().await;
        let caller = self.caller.as_str();

        let status = if !state.managers.contains(caller) {
            ContractStatus::AccessDenied
        } else {
            match state.requests.get(&request_id) {
                None => ContractStatus::UndefinedId,
                Some(r) if r.stage.is_closed() => ContractStatus::RequestNotOpen,
                Some(_) => ContractStatus::Successful,
            }
        };

        if status.is_success() {
            if let Some(record) = state.requests.get_mut(&request_id) {
                record.stage = Stage::Closed;
            }
            state.status("close_request", caller, status);
            state.emit(EventKind::RequestClosed, json!({ "request_id": request_id }));
            info!(request_id, "Request closed");
        } else {
            state.status("close_request", caller, status);
        }
        into_bool(status)
    }

    async fn delete_request(&self, request_id: RequestId) -> ContractResult<bool> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let caller = self.caller.as_str();

        let status = if !state.managers.contains(caller) {
            ContractStatus::AccessDenied
        } else {
            match state.requests.get(&request_id) {
                None => ContractStatus::UndefinedId,
                Some(r) if !r.stage_at(now).is_closed() => ContractStatus::ReqNotClosed,
                Some(_) => ContractStatus::Successful,
            }
        };

        if status.is_success() {
            if let Some(record) = state.requests.remove(&request_id) {
                for offer_id in &record.offer_ids {
                    state.offers.remove(offer_id);
                }
            }
            state.status("delete_request", caller, status);
            state.emit(EventKind::RequestDeleted, json!({ "request_id": request_id }));
            info!(request_id, "Request deleted");
        } else {
            state.status("delete_request", caller, status);
        }
        into_bool(status)
    }

    async fn add_manager(&self, account: &str) -> ContractResult<bool> {
        let mut state = self.state.write().await;
        let caller = self.caller.as_str();

        let status = if state.owner != caller {
            ContractStatus::AccessDenied
        } else if state.managers.contains(account) {
            ContractStatus::DuplicateManager
        } else {
            ContractStatus::Successful
        };

        if status.is_success() {
            state.managers.insert(account.to_string());
            state.status("add_manager", caller, status);
            state.emit(EventKind::ManagerAdded, json!({ "manager": account }));
            info!(manager = account, "Manager added");
        } else {
            state.status("add_manager", caller, status);
        }
        into_bool(status)
    }

    async fn remove_manager(&self, account: &str) -> ContractResult<bool> {
        let mut state = self.state.write().await;
        let caller = self.caller.as_str();

        let status = if state.owner != caller {
            ContractStatus::AccessDenied
        } else if !state.managers.contains(account) {
            ContractStatus::UndefinedId
        } else {
            ContractStatus::Successful
        };

        if status.is_success() {
            state.managers.remove(account);
            state.status("remove_manager", caller, status);
            state.emit(EventKind::ManagerRemoved, json!({ "manager": account }));
            info!(manager = account, "Manager removed");
        } else {
            state.status("remove_manager", caller, status);
        }
        into_bool(status)
    }

    async fn change_owner(&self, account: &str) -> ContractResult<bool> {
        let mut state = self.state.write().await;
        let caller = self.caller.as_str();

        if state.owner != caller {
            let status = state.status("change_owner", caller, ContractStatus::AccessDenied);
            return into_bool(status);
        }

        let previous = std::mem::replace(&mut state.owner, account.to_string());
        state.status("change_owner", caller, ContractStatus::Successful);
        state.emit(
            EventKind::OwnershipTransferred,
            json!({ "previous_owner": previous, "new_owner": account }),
        );
        info!(previous = %previous, owner = account, "Ownership transferred");
        Ok(true)
    }

    async fn info(&self) -> ContractResult<MarketInfo> {
        let state = self.state.read().await;
        Ok(MarketInfo {
            type_name: self.rules.type_name.to_string(),
            owner: state.owner.clone(),
            address: self.address.clone(),
            network: self.network.clone(),
        })
    }
}

#[async_trait]
impl EventSource for MemoryContract {
    async fn events_since(&self, cursor: u64) -> ContractResult<Vec<LedgerEvent>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.sequence > cursor)
            .cloned()
            .collect())
    }
}
