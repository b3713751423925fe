//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `BASE_URL` - Public URL of the API; `https` enables secure cookies
//!   (default: `http://localhost:3000`)
//! - `ORDER_CODE_PREFIX` - Prefix for order codes, 1-8 uppercase letters
//!   (default: LC)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (fulfillment bot)
//! - `FULFILLMENT_WEBHOOK_URL` - Endpoint that receives new orders. When
//!   unset, notifications are recorded as `disabled`.
//! - `FULFILLMENT_TIMEOUT_SECS` - Outbound timeout, 1-60 (default: 10)
//! - `FULFILLMENT_CALLBACK_TOKEN` - Bearer token the bot must present on
//!   status callbacks. When unset, callbacks are unauthenticated.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use live_commerce_core::order_code::is_valid_prefix;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const MIN_CALLBACK_TOKEN_LENGTH: usize = 24;
const DEFAULT_ORDER_CODE_PREFIX: &str = "LC";
const DEFAULT_FULFILLMENT_TIMEOUT_SECS: u64 = 10;
const MAX_FULFILLMENT_TIMEOUT_SECS: u64 = 60;

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

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub base_url: String,
    /// Prefix for generated order codes
    pub order_code_prefix: String,
    /// Emit JSON logs instead of text
    pub json_logs: bool,
    /// Fulfillment bot integration
    pub fulfillment: FulfillmentConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Fulfillment bot configuration.
///
/// Implements `Debug` manually to redact the callback token.
#[derive(Clone)]
pub struct FulfillmentConfig {
    /// Endpoint receiving order notifications. `None` disables them.
    pub webhook_url: Option<Url>,
    /// Hard timeout for outbound notifications
    pub timeout: Duration,
    /// Token required on inbound status callbacks
    pub callback_token: Option<SecretString>,
}

impl std::fmt::Debug for FulfillmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfillmentConfig")
            .field("webhook_url", &self.webhook_url.as_ref().map(Url::as_str))
            .field("timeout", &self.timeout)
            .field(
                "callback_token",
                &self.callback_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout: Duration::from_secs(DEFAULT_FULFILLMENT_TIMEOUT_SECS),
            callback_token: None,
        }
    }
}

impl FulfillmentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_url = get_optional_env("FULFILLMENT_WEBHOOK_URL")
            .map(|raw| parse_webhook_url(&raw))
            .transpose()?;

        let timeout_secs = get_env_or_default(
            "FULFILLMENT_TIMEOUT_SECS",
            &DEFAULT_FULFILLMENT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("FULFILLMENT_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        if !(1..=MAX_FULFILLMENT_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(ConfigError::InvalidEnvVar(
                "FULFILLMENT_TIMEOUT_SECS".to_string(),
                format!("must be between 1 and {MAX_FULFILLMENT_TIMEOUT_SECS}"),
            ));
        }

        let callback_token = get_optional_env("FULFILLMENT_CALLBACK_TOKEN")
            .map(|token| {
                validate_callback_token(&token, "FULFILLMENT_CALLBACK_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;

        Ok(Self {
            webhook_url,
            timeout: Duration::from_secs(timeout_secs),
            callback_token,
        })
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let host = get_env_or_default("HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let base_url = get_env_or_default("BASE_URL", "http://localhost:3000");
        Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BASE_URL".to_string(), e.to_string()))?;

        let order_code_prefix = get_env_or_default("ORDER_CODE_PREFIX", DEFAULT_ORDER_CODE_PREFIX);
        if !is_valid_prefix(&order_code_prefix) {
            return Err(ConfigError::InvalidEnvVar(
                "ORDER_CODE_PREFIX".to_string(),
                "must be 1-8 uppercase ASCII letters".to_string(),
            ));
        }

        let json_logs = get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));
        let fulfillment = FulfillmentConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            order_code_prefix,
            json_logs,
            fulfillment,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse the webhook endpoint, accepting only http(s) URLs.
fn parse_webhook_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("FULFILLMENT_WEBHOOK_URL".to_string(), e.to_string())
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEnvVar(
            "FULFILLMENT_WEBHOOK_URL".to_string(),
            format!("unsupported scheme '{other}'"),
        )),
    }
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

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Validate the shared callback token: long enough and not a placeholder.
fn validate_callback_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    if token.len() < MIN_CALLBACK_TOKEN_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_CALLBACK_TOKEN_LENGTH} characters (got {})",
                token.len()
            ),
        ));
    }
    validate_secret_strength(token, var_name)
}
