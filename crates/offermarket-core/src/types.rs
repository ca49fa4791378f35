//! Shared value types: identifiers, stages, raw ledger records and status codes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a request, assigned by the ledger on creation
pub type RequestId = u64;

/// Identifier of an offer, assigned by the ledger on creation
pub type OfferId = u64;

/// Marketplace-specific payload as it travels to and from the ledger
pub type Extra = Vec<serde_json::Value>;

// ============================================================================
// Stage
// ============================================================================

/// Lifecycle stage of a request or offer.
///
/// Exactly one stage describes an entity at any time. Whether a request has
/// been decided is tracked separately, since a closed request may or may not
/// carry a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Pending,
    Open,
    Closed,
}

impl Stage {
    pub fn is_pending(&self) -> bool {
        matches!(self, Stage::Pending)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Stage::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Stage::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Open => "open",
            Stage::Closed => "closed",
        }
    }

    /// Numeric encoding used by the ledger (0, 1, 2)
    pub fn as_u8(&self) -> u8 {
        match self {
            Stage::Pending => 0,
            Stage::Open => 1,
            Stage::Closed => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Stage::Pending),
            1 => Some(Stage::Open),
            2 => Some(Stage::Closed),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Stage::Pending),
            "open" => Some(Stage::Open),
            "closed" => Some(Stage::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Raw ledger records
// ============================================================================

/// Common request fields as reported by a [`crate::Contract`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestCommon {
    /// Deadline in seconds since the Unix epoch
    pub deadline: i64,
    pub stage: Stage,
    pub is_decided: bool,
    /// Account that created the request, when the ledger records it
    #[serde(default)]
    pub maker: Option<String>,
    #[serde(default)]
    pub offer_ids: Vec<OfferId>,
    #[serde(default)]
    pub decided_offer_ids: Vec<OfferId>,
    /// Decision time in seconds since the Unix epoch
    #[serde(default)]
    pub decided_at: Option<i64>,
}

/// Common offer fields as reported by a [`crate::Contract`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferCommon {
    pub request_id: RequestId,
    pub author: String,
    #[serde(default)]
    pub stage: Stage,
}

/// Descriptive information about the deployed marketplace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInfo {
    /// Marketplace type name, e.g. `eu.sofie-iot.offer-marketplace-demo.flower`
    pub type_name: String,
    pub owner: String,
    pub address: String,
    pub network: String,
}

// ============================================================================
// Ledger status codes
// ============================================================================

/// Status codes reported by the ledger for each mutating call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractStatus {
    Successful,
    AccessDenied,
    UndefinedId,
    DeadlinePassed,
    RequestNotOpen,
    NotPending,
    ReqNotDecided,
    ReqNotClosed,
    NotTimeForDeletion,
    AlreadySentOffer,
    ImproperList,
    DuplicateManager,
}

impl ContractStatus {
    pub fn code(&self) -> u8 {
        match self {
            ContractStatus::Successful => 0,
            ContractStatus::AccessDenied => 1,
            ContractStatus::UndefinedId => 2,
            ContractStatus::DeadlinePassed => 3,
            ContractStatus::RequestNotOpen => 4,
            ContractStatus::NotPending => 5,
            ContractStatus::ReqNotDecided => 6,
            ContractStatus::ReqNotClosed => 7,
            ContractStatus::NotTimeForDeletion => 8,
            ContractStatus::AlreadySentOffer => 9,
            ContractStatus::ImproperList => 10,
            ContractStatus::DuplicateManager => 11,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let status = match code {
            0 => ContractStatus::Successful,
            1 => ContractStatus::AccessDenied,
            2 => ContractStatus::UndefinedId,
            3 => ContractStatus::DeadlinePassed,
            4 => ContractStatus::RequestNotOpen,
            5 => ContractStatus::NotPending,
            6 => ContractStatus::ReqNotDecided,
            7 => ContractStatus::ReqNotClosed,
            8 => ContractStatus::NotTimeForDeletion,
            9 => ContractStatus::AlreadySentOffer,
            10 => ContractStatus::ImproperList,
            11 => ContractStatus::DuplicateManager,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ContractStatus::Successful)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Successful => "Successful",
            ContractStatus::AccessDenied => "AccessDenied",
            ContractStatus::UndefinedId => "UndefinedID",
            ContractStatus::DeadlinePassed => "DeadlinePassed",
            ContractStatus::RequestNotOpen => "RequestNotOpen",
            ContractStatus::NotPending => "NotPending",
            ContractStatus::ReqNotDecided => "ReqNotDecided",
            ContractStatus::ReqNotClosed => "ReqNotClosed",
            ContractStatus::NotTimeForDeletion => "NotTimeForDeletion",
            ContractStatus::AlreadySentOffer => "AlreadySentOffer",
            ContractStatus::ImproperList => "ImproperList",
            ContractStatus::DuplicateManager => "DuplicateManager",
        }
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

// ============================================================================
// Ledger events
// ============================================================================

/// Kinds of events the ledger emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    RequestAdded,
    RequestExtraAdded,
    RequestClosed,
    RequestDecided,
    RequestDeleted,
    OfferAdded,
    OfferExtraAdded,
    ManagerAdded,
    ManagerRemoved,
    OwnershipTransferred,
    FunctionStatus,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::RequestAdded,
        EventKind::RequestExtraAdded,
        EventKind::RequestClosed,
        EventKind::RequestDecided,
        EventKind::RequestDeleted,
        EventKind::OfferAdded,
        EventKind::OfferExtraAdded,
        EventKind::ManagerAdded,
        EventKind::ManagerRemoved,
        EventKind::OwnershipTransferred,
        EventKind::FunctionStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RequestAdded => "RequestAdded",
            EventKind::RequestExtraAdded => "RequestExtraAdded",
            EventKind::RequestClosed => "RequestClosed",
            EventKind::RequestDecided => "RequestDecided",
            EventKind::RequestDeleted => "RequestDeleted",
            EventKind::OfferAdded => "OfferAdded",
            EventKind::OfferExtraAdded => "OfferExtraAdded",
            EventKind::ManagerAdded => "ManagerAdded",
            EventKind::ManagerRemoved => "ManagerRemoved",
            EventKind::OwnershipTransferred => "OwnershipTransferred",
            EventKind::FunctionStatus => "FunctionStatus",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event recorded by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Monotonic position in the ledger's event log, starting at 1
    pub sequence: u64,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_encoding() {
        for stage in [Stage::Pending, Stage::Open, Stage::Closed] {
            assert_eq!(Stage::from_u8(stage.as_u8()), Some(stage));
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::from_u8(3), None);
        assert_eq!(Stage::parse("decided"), None);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ContractStatus::Successful.code(), 0);
        assert_eq!(ContractStatus::ReqNotClosed.code(), 7);
        assert_eq!(ContractStatus::DuplicateManager.code(), 11);
        for code in 0..12 {
            let status = ContractStatus::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert!(ContractStatus::from_code(12).is_none());
        assert_eq!(ContractStatus::UndefinedId.as_str(), "UndefinedID");
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::parse("RequestAdded"), Some(EventKind::RequestAdded));
        assert_eq!(EventKind::parse("FunctionStatus"), Some(EventKind::FunctionStatus));
        assert_eq!(EventKind::parse("Nope"), None);
        let json = serde_json::to_string(&EventKind::OfferExtraAdded).unwrap();
        assert_eq!(json, "\"OfferExtraAdded\"");
    }

    #[test]
    fn test_stage_serde() {
        assert_eq!(serde_json::to_string(&Stage::Open).unwrap(), "\"open\"");
        let common: RequestCommon =
            serde_json::from_str(r#"{"deadline": 5, "stage": "closed", "is_decided": true}"#).unwrap();
        assert!(common.stage.is_closed());
        assert!(common.offer_ids.is_empty());
    }
}
