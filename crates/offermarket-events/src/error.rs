//! Errors raised by subscription stores and webhook delivery

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EventError>;

#[derive(Debug, Clone, Error)]
pub enum EventError {
    #[error("Subscription {id} not found")]
    SubscriptionNotFound { id: String },

    #[error("Event '{name}' not found")]
    UnknownEvent { name: String },

    #[error("Either 'event' or 'url' must be given")]
    EmptyUpdate,

    #[error("Subscription store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Event source error: {0}")]
    Source(String),
}

impl EventError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Source(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SubscriptionNotFound { .. } => "SUBSCRIPTION_NOT_FOUND",
            Self::UnknownEvent { .. } => "UNKNOWN_EVENT",
            Self::EmptyUpdate => "EMPTY_UPDATE",
            Self::Store(_) => "STORE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Source(_) => "EVENT_SOURCE_ERROR",
        }
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
