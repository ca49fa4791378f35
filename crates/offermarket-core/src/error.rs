//! Error types for the offer marketplace
//!
//! Absence of a request or offer is never an error here: lookups return
//! `Option`. Errors cover authorization, business-rule rejections, payload
//! decoding and failures of the backing ledger.

use thiserror::Error;

use crate::types::{ContractStatus, OfferId, RequestId};

/// Result type for [`crate::Contract`] calls
pub type ContractResult<T> = std::result::Result<T, ContractError>;

/// Result type for [`crate::Marketplace`] operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Failures raised by a concrete ledger binding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The calling identity lacks the role the ledger requires
    #[error("Access denied by the ledger")]
    AccessDenied,

    /// The ledger refused an operation that cannot report failure as `false`
    #[error("Ledger rejected the operation: {status}")]
    Rejected { status: ContractStatus },

    /// The binding refused the operation without a ledger status code
    #[error("Ledger refused the operation: {message}")]
    Refused { message: String },

    /// Transport or ledger failure (timeout, malformed response, ...)
    #[error("Upstream ledger failure: {message}")]
    Upstream { message: String },
}

impl ContractError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AccessDenied => "ACCESS_DENIED",
            Self::Rejected { .. } => "LEDGER_REJECTED",
            Self::Refused { .. } => "LEDGER_REFUSED",
            Self::Upstream { .. } => "UPSTREAM_FAILURE",
        }
    }
}

/// Failures decoding a marketplace-specific extra payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Expected {expected} extra values, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("Invalid extra field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

impl PayloadError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Marketplace error taxonomy
#[derive(Debug, Clone, Error)]
pub enum MarketError {
    // ========================================================================
    // Authorization
    // ========================================================================

    /// Operation requires the manager role
    #[error("Manager access required")]
    ManagerAccessRequired,

    /// Operation requires the owner role
    #[error("Owner access required")]
    OwnerAccessRequired,

    /// The ledger itself denied access
    #[error("Access denied by the ledger")]
    AccessDenied,

    // ========================================================================
    // Business rules
    // ========================================================================

    /// The ledger refused the operation
    #[error("Operation '{operation}' rejected by the ledger{}", status_suffix(.status))]
    Rejected {
        operation: &'static str,
        status: Option<ContractStatus>,
    },

    /// Request created but its extra payload was refused
    #[error("Extra payload rejected for request {request_id} (compensated: {compensated})")]
    RequestExtraRejected {
        request_id: RequestId,
        compensated: bool,
    },

    /// Offer created but its extra payload was refused
    #[error("Extra payload rejected for offer {offer_id} (compensated: {compensated})")]
    OfferExtraRejected { offer_id: OfferId, compensated: bool },

    /// Offer selection violates the marketplace decision policy
    #[error("Invalid decision: {reason}")]
    InvalidDecision { reason: String },

    /// Extra payload could not be decoded
    #[error("Invalid payload: {0}")]
    Payload(#[from] PayloadError),

    /// Entity passed in a state that the operation does not accept
    #[error("Precondition violated: {reason}")]
    Precondition { reason: String },

    // ========================================================================
    // Internal
    // ========================================================================

    /// Ledger reported data that contradicts itself
    #[error("Ledger inconsistency: {reason}")]
    Inconsistent { reason: String },

    /// Transport or ledger failure
    #[error("Upstream ledger failure: {message}")]
    Upstream { message: String },
}

fn status_suffix(status: &Option<ContractStatus>) -> String {
    status.map(|s| format!(": {s}")).unwrap_or_default()
}

impl MarketError {
    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition {
            reason: reason.into(),
        }
    }

    pub fn inconsistent(reason: impl Into<String>) -> Self {
        Self::Inconsistent {
            reason: reason.into(),
        }
    }

    pub fn invalid_decision(reason: impl Into<String>) -> Self {
        Self::InvalidDecision {
            reason: reason.into(),
        }
    }

    /// True for failures caused by the caller's role
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::ManagerAccessRequired | Self::OwnerAccessRequired | Self::AccessDenied
        )
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ManagerAccessRequired => "MANAGER_ACCESS_REQUIRED",
            Self::OwnerAccessRequired => "OWNER_ACCESS_REQUIRED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::Rejected { .. } => "REJECTED",
            Self::RequestExtraRejected { .. } => "REQUEST_EXTRA_REJECTED",
            Self::OfferExtraRejected { .. } => "OFFER_EXTRA_REJECTED",
            Self::InvalidDecision { .. } => "INVALID_DECISION",
            Self::Payload(_) => "INVALID_PAYLOAD",
            Self::Precondition { .. } => "PRECONDITION_FAILED",
            Self::Inconsistent { .. } => "INCONSISTENT_LEDGER",
            Self::Upstream { .. } => "UPSTREAM_FAILURE",
        }
    }

    /// Translate a ledger failure raised during `operation`
    pub(crate) fn from_contract(operation: &'static str, err: ContractError) -> Self {
        match err {
            ContractError::AccessDenied => Self::AccessDenied,
            ContractError::Rejected { status } => Self::Rejected {
                operation,
                status: Some(status),
            },
            ContractError::Refused { message } => {
                tracing::debug!(operation, %message, "Ledger refused the operation");
                Self::Rejected {
                    operation,
                    status: None,
                }
            }
            ContractError::Upstream { message } => Self::Upstream { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            MarketError::ManagerAccessRequired.error_code(),
            "MANAGER_ACCESS_REQUIRED"
        );
        assert_eq!(ContractError::AccessDenied.error_code(), "ACCESS_DENIED");
        assert!(MarketError::OwnerAccessRequired.is_authorization());
        assert!(!MarketError::inconsistent("x").is_authorization());
    }

    #[test]
    fn test_contract_error_translation() {
        let err = MarketError::from_contract(
            "add_offer",
            ContractError::Rejected {
                status: ContractStatus::UndefinedId,
            },
        );
        assert!(matches!(
            err,
            MarketError::Rejected {
                operation: "add_offer",
                status: Some(ContractStatus::UndefinedId)
            }
        ));
        assert!(err.to_string().contains("UndefinedID"));

        let err = MarketError::from_contract("get_request", ContractError::upstream("timeout"));
        assert!(err.is_retriable());

        let err = MarketError::from_contract(
            "add_offer",
            ContractError::Refused {
                message: "request is closed".into(),
            },
        );
        assert!(matches!(
            err,
            MarketError::Rejected {
                operation: "add_offer",
                status: None
            }
        ));
        assert!(!err.is_retriable());
    }
}
