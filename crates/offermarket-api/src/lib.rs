//! Offer marketplace REST API
//!
//! JSON façade over a [`offermarket_core::Marketplace`], plus the webhook
//! subscription endpoints backed by `offermarket-events`.
//!
//! # API Structure
//!
//! ```text
//! /info                  - Marketplace type, owner and ledger location
//! /request[/:id]         - Requests: list, create, show, close/decide, delete
//! /request/register      - Attach a request payload
//! /offer[/:id]           - Offers: list, create, show
//! /offer/register        - Attach an offer payload
//! /subscription[/:id]    - Webhook subscriptions
//! /manager, /owner       - Role management
//! /health                - Liveness
//! ```

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::http::HeaderName;
use axum::Router;
use offermarket_core::MarketVariant;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Enable CORS for browser clients
    pub enable_cors: bool,
    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
    /// Enable request tracing
    pub enable_tracing: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            enable_tracing: true,
        }
    }
}

/// Create the API router with all middleware
pub fn create_router<V: MarketVariant>(state: Arc<AppState<V>>, config: ApiConfig) -> Router {
    let mut router = Router::new()
        .merge(routes::market_routes::<V>())
        .route("/health", axum::routing::get(handlers::health::health_check))
        .with_state(state);

    let x_request_id = HeaderName::from_static("x-request-id");
    router = router
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(x_request_id));

    if config.enable_tracing {
        router = router.layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");

                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        );
    }

    if config.enable_cors {
        let cors = if config.cors_origins.iter().any(|o| o == "*") {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(
                    config
                        .cors_origins
                        .iter()
                        .filter_map(|o| o.parse().ok())
                        .collect::<Vec<_>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
        };
        router = router.layer(cors);
    }

    router
}

/// Create a router without middleware for testing
pub fn create_test_router<V: MarketVariant>(state: Arc<AppState<V>>) -> Router {
    Router::new()
        .merge(routes::market_routes::<V>())
        .route("/health", axum::routing::get(handlers::health::health_check))
        .with_state(state)
}
