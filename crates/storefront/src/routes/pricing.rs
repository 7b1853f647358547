//! Pricing route handlers.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::error::Result;
use crate::state::AppState;

/// Response body for `GET /api/pricing/rate`.
#[derive(Debug, Serialize)]
pub struct RateResponse {
    /// Ngultrum per yuan.
    pub rate: Decimal,
    /// When the rate was fetched from the rates API.
    pub fetched_at: DateTime<Utc>,
    /// True when the refresh failed and a previously fetched rate is being
    /// served past its TTL.
    pub stale: bool,
}

/// `GET /api/pricing/rate` - the current CNY→BTN conversion rate.
///
/// Refresh is owned here, not by the pricing engine: the handler refreshes
/// the provider when the held rate is past its TTL, and falls back to
/// serving the stale rate (flagged) when the rates API is down. Only a
/// cold start with no rate ever fetched surfaces an error.
#[instrument(skip(state))]
pub async fn rate(State(state): State<AppState>) -> Result<Json<RateResponse>> {
    match state.rates().refresh_if_stale().await {
        Ok(rate) => Ok(Json(RateResponse {
            rate: rate.rate,
            fetched_at: rate.fetched_at,
            stale: false,
        })),
        Err(err) => {
            if let Some(rate) = state.rates().current().await {
                warn!(error = %err, "rate refresh failed, serving stale rate");
                return Ok(Json(RateResponse {
                    rate: rate.rate,
                    fetched_at: rate.fetched_at,
                    stale: true,
                }));
            }
            Err(err.into())
        }
    }
}
