//! Offermarket Core - domain model of the offer marketplace
//!
//! A manager posts requests, anyone may bid on them with offers, and the
//! manager decides which offers win. This crate holds:
//! - Contract: the capability boundary to the backing ledger
//! - Request / Offer: snapshots rebuilt from ledger data on every read
//! - MarketVariant: pluggable payload shapes and decision policies
//! - Marketplace: role-gated orchestration over a Contract
//! - MemoryContract: an in-memory ledger binding
//!
//! # Lifecycle
//!
//! Requests move `Pending -> Open -> Closed`. Attaching a valid payload
//! opens a request, a manager or the deadline closes it, and a decision
//! closes it for good. Being decided is tracked next to the stage, never
//! as a stage of its own.

pub mod contract;
pub mod entity;
pub mod error;
pub mod marketplace;
pub mod memory;
pub mod types;
pub mod variant;
pub mod variants;

pub use contract::{Contract, EventSource};
pub use entity::{Offer, Request};
pub use error::{ContractError, ContractResult, MarketError, PayloadError, Result};
pub use marketplace::{Marketplace, Roles};
pub use memory::{Clock, ManualClock, MemoryContract, SystemClock};
pub use types::*;
pub use variant::{DecisionPolicy, MarketVariant, Payload};
pub use variants::{Flower, FlowerOfferExtra, FlowerRequestExtra, FlowerType, Generic, MarketKind, RawExtra};
