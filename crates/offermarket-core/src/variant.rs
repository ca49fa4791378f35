//! Pluggable marketplace flavours
//!
//! A marketplace flavour fixes three things: the shape of the extra payload
//! on requests, the shape on offers, and how many offers a decision selects.
//! The [`crate::Marketplace`] is generic over the flavour, so it is resolved
//! once at construction rather than on every call.

use std::fmt::Debug;

use serde_json::Value;

use crate::error::PayloadError;
use crate::types::{Extra, OfferId};

/// A typed extra payload carried by a request or offer
pub trait Payload: Sized + Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Encode into the ledger representation
    fn marshal(&self) -> Extra;

    /// Decode from the ledger representation. Inverse of [`Payload::marshal`].
    fn unmarshal(extra: &[Value]) -> Result<Self, PayloadError>;

    /// Ledger-side validity rule deciding whether attaching this payload
    /// opens a pending entity
    fn is_valid(&self) -> bool {
        true
    }
}

/// How a decision selects its winning offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPolicy {
    /// The ledger picks the winners itself and ignores the caller's selection
    ContractSelects { max_winners: usize },
    /// The caller names between `min` and `max` winning offers
    CallerSelects { min: usize, max: Option<usize> },
}

impl DecisionPolicy {
    /// Validate a caller-supplied selection before it reaches the ledger
    pub fn check_selection(&self, selected: &[OfferId]) -> Result<(), String> {
        let mut seen = selected.to_vec();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != selected.len() {
            return Err("selection contains duplicate offer ids".to_string());
        }

        match *self {
            DecisionPolicy::ContractSelects { .. } => Ok(()),
            DecisionPolicy::CallerSelects { min, max } => {
                if selected.len() < min {
                    return Err(format!(
                        "at least {min} offer(s) must be selected, got {}",
                        selected.len()
                    ));
                }
                if let Some(max) = max {
                    if selected.len() > max {
                        return Err(format!(
                            "at most {max} offer(s) may be selected, got {}",
                            selected.len()
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    /// Validate the decided offers reported for a request
    pub fn check_decided(&self, is_decided: bool, decided: usize) -> Result<(), String> {
        if !is_decided {
            if decided > 0 {
                return Err(format!("{decided} decided offer(s) on an undecided request"));
            }
            return Ok(());
        }

        let max = match *self {
            DecisionPolicy::ContractSelects { max_winners } => Some(max_winners),
            DecisionPolicy::CallerSelects { max, .. } => max,
        };
        match max {
            Some(max) if decided > max => Err(format!(
                "{decided} decided offers, this marketplace allows at most {max}"
            )),
            _ => Ok(()),
        }
    }

    /// Whether the caller's selection is forwarded to the ledger at all
    pub fn caller_selects(&self) -> bool {
        matches!(self, DecisionPolicy::CallerSelects { .. })
    }
}

/// A concrete marketplace flavour
pub trait MarketVariant:
    Debug + Clone + Copy + PartialEq + Eq + Default + Send + Sync + 'static
{
    /// Type name the ledger reports for this flavour
    const TYPE_NAME: &'static str;

    const DECISION_POLICY: DecisionPolicy;

    type RequestExtra: Payload;

    type OfferExtra: Payload;

    /// Score used to pick winners when the ledger selects. Higher wins.
    fn rank_offer(_extra: &Self::OfferExtra) -> Option<i128> {
        None
    }
}
