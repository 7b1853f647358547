//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. `TraceLayer` (request tracing)
//! 2. CORS (the SPA is served from another origin)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)

pub mod auth;
pub mod session;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;

use crate::config::StorefrontConfig;

pub use auth::RequireAuth;
pub use session::create_session_layer;

/// Build the CORS layer.
///
/// With no configured origin, no cross-origin requests are allowed - the
/// layer is intentionally restrictive because session cookies ride along
/// with credentials.
#[must_use]
pub fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    if let Some(origin) = &config.allowed_origin
        && let Ok(value) = origin.parse::<HeaderValue>()
    {
        layer = layer.allow_origin(value);
    }

    layer
}
