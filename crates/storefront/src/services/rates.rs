//! Exchange-rate client and provider.
//!
//! Fetches the CNY→BTN conversion rate from the exchangerate-api.com pair
//! endpoint. The [`RateProvider`] owns the current [`ExchangeRate`] and its
//! freshness; the pricing engine itself never refreshes anything - callers
//! trigger [`RateProvider::refresh_if_stale`] and pass the returned rate
//! into pricing calls explicitly.

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

use drukmart_core::pricing::ExchangeRate;

use crate::config::RatesConfig;

/// Exchange-rate API base URL.
const BASE_URL: &str = "https://v6.exchangerate-api.com/v6";

/// Errors from the exchange-rate service.
#[derive(Debug, Error)]
pub enum RatesError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Response body of the pair endpoint.
#[derive(Debug, Deserialize)]
struct PairResponse {
    result: String,
    #[serde(default)]
    conversion_rate: Option<f64>,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
}

/// Client for the exchange-rate pair endpoint.
#[derive(Clone)]
pub struct RatesClient {
    client: reqwest::Client,
    url: String,
}

impl RatesClient {
    /// Create a new rates client.
    #[must_use]
    pub fn new(config: &RatesConfig) -> Self {
        let url = format!(
            "{BASE_URL}/{}/pair/{}/{}",
            config.api_key.expose_secret(),
            config.base_currency,
            config.local_currency,
        );

        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Fetch the current conversion rate.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails, the API reports an error,
    /// or the rate is missing or non-positive.
    pub async fn fetch(&self) -> Result<ExchangeRate, RatesError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            let message = response.text().await.unwrap_or_default();
            return Err(RatesError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: PairResponse = response
            .json()
            .await
            .map_err(|e| RatesError::Parse(e.to_string()))?;

        if body.result != "success" {
            return Err(RatesError::Api {
                status: status.as_u16(),
                message: body
                    .error_type
                    .unwrap_or_else(|| "unknown error".to_owned()),
            });
        }

        let rate = body
            .conversion_rate
            .and_then(Decimal::from_f64)
            .filter(|rate| rate > &Decimal::ZERO)
            .ok_or_else(|| RatesError::Parse("missing or invalid conversion_rate".to_owned()))?;

        Ok(ExchangeRate::new(rate, Utc::now()))
    }
}

/// Holder of the current exchange rate with caller-owned refresh.
pub struct RateProvider {
    client: RatesClient,
    ttl: Duration,
    current: RwLock<Option<ExchangeRate>>,
}

impl RateProvider {
    /// Create a provider with no rate loaded yet.
    #[must_use]
    pub fn new(config: &RatesConfig) -> Self {
        Self {
            client: RatesClient::new(config),
            ttl: Duration::hours(config.ttl_hours),
            current: RwLock::new(None),
        }
    }

    /// The staleness TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The currently held rate, if one has ever been loaded. May be stale.
    pub async fn current(&self) -> Option<ExchangeRate> {
        *self.current.read().await
    }

    /// Return a fresh rate, fetching only when the held one is absent or
    /// older than the TTL.
    ///
    /// A failed fetch keeps the previously held rate in place so callers
    /// can fall back to serving it stale.
    ///
    /// # Errors
    ///
    /// Returns the fetch error when a refresh was needed and failed.
    pub async fn refresh_if_stale(&self) -> Result<ExchangeRate, RatesError> {
        if let Some(rate) = self.current().await
            && !rate.is_stale(self.ttl)
        {
            return Ok(rate);
        }

        let mut guard = self.current.write().await;
        // Re-check under the write lock: another request may have
        // refreshed while we waited.
        if let Some(rate) = *guard
            && !rate.is_stale(self.ttl)
        {
            return Ok(rate);
        }

        let fresh = self.client.fetch().await?;
        *guard = Some(fresh);
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_response_success_parse() {
        let body = r#"{"result":"success","base_code":"CNY","target_code":"BTN","conversion_rate":11.6931}"#;
        let parsed: PairResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.result, "success");
        assert!((parsed.conversion_rate.expect("rate") - 11.6931).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pair_response_error_parse() {
        let body = r#"{"result":"error","error-type":"invalid-key"}"#;
        let parsed: PairResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.result, "error");
        assert_eq!(parsed.error_type.as_deref(), Some("invalid-key"));
        assert!(parsed.conversion_rate.is_none());
    }
}
