//! Fallback flavour for marketplaces without a dedicated payload type

use serde_json::Value;

use crate::error::PayloadError;
use crate::types::Extra;
use crate::variant::{DecisionPolicy, MarketVariant, Payload};

/// Extra payload kept exactly as the ledger reports it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawExtra(pub Vec<Value>);

impl Payload for RawExtra {
    fn marshal(&self) -> Extra {
        self.0.clone()
    }

    fn unmarshal(extra: &[Value]) -> Result<Self, PayloadError> {
        Ok(Self(extra.to_vec()))
    }

    fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }
}

/// Any marketplace: payloads are opaque and the caller names the winners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Generic;

impl MarketVariant for Generic {
    const TYPE_NAME: &'static str = "generic";
    const DECISION_POLICY: DecisionPolicy = DecisionPolicy::CallerSelects { min: 0, max: None };

    type RequestExtra = RawExtra;
    type OfferExtra = RawExtra;
}
