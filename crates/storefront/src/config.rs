//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront API
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `EXCHANGE_RATE_API_KEY` - exchangerate-api.com API key
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_ALLOWED_ORIGIN` - SPA origin allowed by CORS
//! - `EXCHANGE_RATE_BASE_CURRENCY` - Catalog currency (default: CNY)
//! - `EXCHANGE_RATE_LOCAL_CURRENCY` - Display currency (default: BTN)
//! - `EXCHANGE_RATE_TTL_HOURS` - Rate staleness TTL (default: 12)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront API
    pub base_url: String,
    /// SPA origin allowed to make credentialed cross-origin requests
    pub allowed_origin: Option<String>,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Exchange-rate API configuration
    pub rates: RatesConfig,
}

/// Exchange-rate API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct RatesConfig {
    /// exchangerate-api.com API key
    pub api_key: SecretString,
    /// Currency the catalog prices in (e.g. CNY)
    pub base_currency: String,
    /// Currency the storefront charges in (e.g. BTN)
    pub local_currency: String,
    /// How long a fetched rate stays fresh, in hours
    pub ttl_hours: i64,
}

impl std::fmt::Debug for RatesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatesConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_currency", &self.base_currency)
            .field("local_currency", &self.local_currency)
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the session secret fails validation (placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit variable map. Used by tests.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url =
            SecretString::from(get_required(lookup, "STOREFRONT_DATABASE_URL")?);

        let host = get_or_default(lookup, "STOREFRONT_HOST", "127.0.0.1");
        let host: IpAddr = host
            .parse()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_owned(), format!("{e}")))?;

        let port = get_or_default(lookup, "STOREFRONT_PORT", "3000");
        let port: u16 = port
            .parse()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_owned(), format!("{e}")))?;

        let base_url = get_required(lookup, "STOREFRONT_BASE_URL")?;
        let allowed_origin = lookup("STOREFRONT_ALLOWED_ORIGIN");

        let session_secret = get_validated_secret(lookup, "STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        let ttl_hours = get_or_default(lookup, "EXCHANGE_RATE_TTL_HOURS", "12");
        let ttl_hours: i64 = ttl_hours.parse().map_err(|e| {
            ConfigError::InvalidEnvVar("EXCHANGE_RATE_TTL_HOURS".to_owned(), format!("{e}"))
        })?;

        let rates = RatesConfig {
            api_key: SecretString::from(get_required(lookup, "EXCHANGE_RATE_API_KEY")?),
            base_currency: get_or_default(lookup, "EXCHANGE_RATE_BASE_CURRENCY", "CNY"),
            local_currency: get_or_default(lookup, "EXCHANGE_RATE_LOCAL_CURRENCY", "BTN"),
            ttl_hours,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            allowed_origin,
            session_secret,
            rates,
        })
    }

    /// The socket address to bind the server to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn get_required(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, ConfigError> {
    lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()))
}

fn get_or_default(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_owned())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_owned(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret.
fn get_validated_secret(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
) -> Result<SecretString, ConfigError> {
    let value = get_required(lookup, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "STOREFRONT_DATABASE_URL".to_owned(),
                "postgres://localhost/drukmart".to_owned(),
            ),
            (
                "STOREFRONT_BASE_URL".to_owned(),
                "http://localhost:3000".to_owned(),
            ),
            (
                "STOREFRONT_SESSION_SECRET".to_owned(),
                "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%".to_owned(),
            ),
            (
                "EXCHANGE_RATE_API_KEY".to_owned(),
                "4214da0d2e6dfdb3c78926c1".to_owned(),
            ),
        ])
    }

    #[test]
    fn test_loads_with_defaults() {
        let config = StorefrontConfig::from_map(&base_vars()).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.rates.base_currency, "CNY");
        assert_eq!(config.rates.local_currency, "BTN");
        assert_eq!(config.rates.ttl_hours, 12);
        assert!(config.allowed_origin.is_none());
    }

    #[test]
    fn test_missing_required_var() {
        let mut vars = base_vars();
        vars.remove("STOREFRONT_DATABASE_URL");
        let err = StorefrontConfig::from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut vars = base_vars();
        vars.insert("STOREFRONT_PORT".to_owned(), "not-a-port".to_owned());
        let err = StorefrontConfig::from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_placeholder_session_secret_rejected() {
        let mut vars = base_vars();
        vars.insert(
            "STOREFRONT_SESSION_SECRET".to_owned(),
            "your-session-secret-goes-here-okay".to_owned(),
        );
        let err = StorefrontConfig::from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_short_session_secret_rejected() {
        let mut vars = base_vars();
        vars.insert(
            "STOREFRONT_SESSION_SECRET".to_owned(),
            "aB3$xY9!mK2@".to_owned(),
        );
        let err = StorefrontConfig::from_map(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_rates_config_debug_redacts_key() {
        let config = StorefrontConfig::from_map(&base_vars()).unwrap();
        let debug_output = format!("{:?}", config.rates);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("4214da0d2e6dfdb3c78926c1"));
    }
}
