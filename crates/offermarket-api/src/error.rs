//! API error handling
//!
//! Domain errors map onto HTTP statuses: business-rule failures and bad
//! input are 400, missing roles 401, unknown resources 404, ledger
//! transport failures 502 and ledger inconsistencies 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use offermarket_core::MarketError;
use offermarket_events::EventError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found, undefined object: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Events(#[from] EventError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Market(e) => e.error_code(),
            Self::Events(e) => e.error_code(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Market(e) => match e {
                MarketError::ManagerAccessRequired
                | MarketError::OwnerAccessRequired
                | MarketError::AccessDenied => StatusCode::UNAUTHORIZED,

                MarketError::Rejected { .. }
                | MarketError::RequestExtraRejected { .. }
                | MarketError::OfferExtraRejected { .. }
                | MarketError::InvalidDecision { .. }
                | MarketError::Payload(_)
                | MarketError::Precondition { .. } => StatusCode::BAD_REQUEST,

                MarketError::Inconsistent { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                MarketError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::Events(e) => match e {
                EventError::SubscriptionNotFound { .. }
                | EventError::UnknownEvent { .. }
                | EventError::EmptyUpdate => StatusCode::BAD_REQUEST,
                EventError::Store(_) | EventError::Source(_) => StatusCode::SERVICE_UNAVAILABLE,
                EventError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Error body returned with every failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    /// Numeric ledger status when the ledger refused the operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_status: Option<u8>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        let ledger_status = match err {
            ApiError::Market(MarketError::Rejected {
                status: Some(status), ..
            }) => Some(status.code()),
            _ => None,
        };
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
            ledger_status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}
