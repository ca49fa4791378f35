//! API Routes

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use offermarket_core::MarketVariant;
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// All marketplace routes
pub fn market_routes<V: MarketVariant>() -> Router<Arc<AppState<V>>> {
    Router::new()
        .route("/info", get(handlers::info::get_info::<V>))
        .merge(request_routes())
        .merge(offer_routes())
        .merge(subscription_routes())
        .merge(role_routes())
}

fn request_routes<V: MarketVariant>() -> Router<Arc<AppState<V>>> {
    Router::new()
        .route(
            "/request",
            get(handlers::request::list_requests::<V>).post(handlers::request::create_request::<V>),
        )
        .route("/request/register", post(handlers::request::register_request_extra::<V>))
        .route(
            "/request/:id",
            get(handlers::request::get_request::<V>)
                .put(handlers::request::update_request::<V>)
                .delete(handlers::request::delete_request::<V>),
        )
}

fn offer_routes<V: MarketVariant>() -> Router<Arc<AppState<V>>> {
    Router::new()
        .route(
            "/offer",
            get(handlers::offer::list_offers::<V>).post(handlers::offer::create_offer::<V>),
        )
        .route("/offer/register", post(handlers::offer::register_offer_extra::<V>))
        .route("/offer/:id", get(handlers::offer::get_offer::<V>))
}

fn subscription_routes<V: MarketVariant>() -> Router<Arc<AppState<V>>> {
    Router::new()
        .route("/subscription", post(handlers::subscription::subscribe::<V>))
        .route("/subscription/events", get(handlers::subscription::list_events::<V>))
        .route(
            "/subscription/:id",
            get(handlers::subscription::get_subscription::<V>)
                .put(handlers::subscription::update_subscription::<V>)
                .delete(handlers::subscription::unsubscribe::<V>),
        )
}

fn role_routes<V: MarketVariant>() -> Router<Arc<AppState<V>>> {
    Router::new()
        .route("/manager", post(handlers::info::add_manager::<V>))
        .route("/manager/:account", delete(handlers::info::remove_manager::<V>))
        .route("/owner", put(handlers::info::change_owner::<V>))
}
