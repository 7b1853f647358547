//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::RateProvider;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; provides access to the database pool, the
/// configuration, and the exchange-rate provider.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    rates: RateProvider,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let rates = RateProvider::new(&config.rates);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                rates,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the exchange-rate provider.
    #[must_use]
    pub fn rates(&self) -> &RateProvider {
        &self.inner.rates
    }
}
