//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness check
//! GET  /health/ready               - Readiness check (pings the database)
//!
//! # Addresses (requires auth)
//! GET    /api/addresses            - List the user's addresses
//! POST   /api/addresses            - Create an address
//! GET    /api/addresses/{id}       - Fetch one address
//! PUT    /api/addresses/{id}       - Replace one address
//! DELETE /api/addresses/{id}       - Delete one address
//!
//! # Orders (requires auth)
//! GET  /api/orders                 - The user's orders, newest first
//! POST /api/orders                 - Create an order (atomic with items)
//! GET  /api/orders/{order_number}  - Fetch one order by number
//! PUT  /api/orders/{id}            - Status update (pending→cancelled only)
//!
//! # Pricing
//! GET  /api/pricing/rate           - Current CNY→BTN rate (refreshes when stale)
//! ```

pub mod addresses;
pub mod orders;
pub mod pricing;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create the address routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::store))
        .route(
            "/{id}",
            get(addresses::show)
                .put(addresses::update)
                .delete(addresses::destroy),
        )
}

/// Create the order routes router.
///
/// `GET` addresses an order by its human-readable number; `PUT` addresses
/// it by numeric id. They share one path parameter because the formats are
/// disjoint.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::store))
        .route("/{key}", get(orders::show).put(orders::update))
}

/// Create the pricing routes router.
pub fn pricing_routes() -> Router<AppState> {
    Router::new().route("/rate", get(pricing::rate))
}

/// Create the full `/api` router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/addresses", address_routes())
        .nest("/orders", order_routes())
        .nest("/pricing", pricing_routes())
}

/// Parse a numeric path parameter, rejecting non-numeric input.
pub(crate) fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}
