//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::Money;
use fulfillment::{DEFAULT_MAX_REDRIVE_ATTEMPTS, FulfillmentSettings};
use payments::{STRIPE_API_BASE, StripeConfig};
use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors detected at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("PAYMENT_PROVIDER=stripe requires {0}")]
    MissingSecret(&'static str),

    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Which payment gateway the server talks to.
#[derive(Debug, Clone)]
pub enum PaymentProvider {
    Mock,
    Stripe(StripeConfig),
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; absent means in-memory storage
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `PAYMENT_PROVIDER`: `mock` or `stripe` (default: `mock`)
/// - `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET`, `STRIPE_API_BASE`
/// - `WEB_BASE_URL`: storefront URL for payment redirects
/// - `SHIPPING_COST_CENTS` (default: `3000`), `CURRENCY` (default: `MAD`)
/// - `PENDING_ORDER_TTL_SECS` (default: `3600`)
/// - `SWEEP_INTERVAL_SECS` (default: `300`, `0` disables maintenance)
/// - `WEBHOOK_MAX_ATTEMPTS`: failed attempts before redrive gives up on an
///   event (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<SecretString>,
    pub database_max_connections: u32,
    pub payment_provider: PaymentProvider,
    pub web_base_url: String,
    pub shipping_cost: Money,
    pub currency: String,
    pub pending_order_ttl: Duration,
    pub sweep_interval: Duration,
    pub webhook_max_attempts: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let log_format = match get("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        let payment_provider = match get("PAYMENT_PROVIDER").as_deref() {
            None | Some("mock") => PaymentProvider::Mock,
            Some("stripe") => PaymentProvider::Stripe(StripeConfig {
                secret_key: get("STRIPE_SECRET_KEY")
                    .map(SecretString::from)
                    .ok_or(ConfigError::MissingSecret("STRIPE_SECRET_KEY"))?,
                webhook_secret: get("STRIPE_WEBHOOK_SECRET")
                    .map(SecretString::from)
                    .ok_or(ConfigError::MissingSecret("STRIPE_WEBHOOK_SECRET"))?,
                api_base: get("STRIPE_API_BASE").unwrap_or_else(|| STRIPE_API_BASE.to_string()),
            }),
            Some(other) => return Err(ConfigError::UnknownProvider(other.to_string())),
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse(&get, "PORT", defaults.port)?,
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: get("DATABASE_URL").map(SecretString::from),
            database_max_connections: parse(
                &get,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            payment_provider,
            web_base_url: get("WEB_BASE_URL").unwrap_or(defaults.web_base_url),
            shipping_cost: Money::from_cents(parse(
                &get,
                "SHIPPING_COST_CENTS",
                defaults.shipping_cost.cents(),
            )?),
            currency: get("CURRENCY").unwrap_or(defaults.currency),
            pending_order_ttl: Duration::from_secs(parse(
                &get,
                "PENDING_ORDER_TTL_SECS",
                defaults.pending_order_ttl.as_secs(),
            )?),
            sweep_interval: Duration::from_secs(parse(
                &get,
                "SWEEP_INTERVAL_SECS",
                defaults.sweep_interval.as_secs(),
            )?),
            webhook_max_attempts: parse(
                &get,
                "WEBHOOK_MAX_ATTEMPTS",
                defaults.webhook_max_attempts,
            )?,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Business settings handed to the fulfillment services.
    pub fn fulfillment_settings(&self) -> FulfillmentSettings {
        FulfillmentSettings {
            shipping_cost: self.shipping_cost,
            currency: self.currency.clone(),
            web_base_url: self.web_base_url.clone(),
            ..FulfillmentSettings::default()
        }
    }
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            payment_provider: PaymentProvider::Mock,
            web_base_url: "http://localhost:5173".to_string(),
            shipping_cost: Money::from_units(30),
            currency: "MAD".to_string(),
            pending_order_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(300),
            webhook_max_attempts: DEFAULT_MAX_REDRIVE_ATTEMPTS,
        }
    }
}
