//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MERCADITO_BACKEND_URL` - Base URL of the backend REST API
//!
//! ## Optional
//! - `MERCADITO_PRINCIPAL` - `customer`, `staff` or `anonymous` (default: anonymous)
//! - `MERCADITO_CUSTOMER_TOKEN` - Backend access token (required for customer/staff)
//! - `MERCADITO_USER_ID` - Backend user ID of the principal
//! - `MERCADITO_USER_NAME` - Display name used by the assistant
//! - `MERCADITO_STORAGE_DIR` - Local storage directory (default: .mercadito)
//! - `MERCADITO_CATALOG_TTL_SECS` - Catalog snapshot lifetime (default: 300)
//! - `MERCADITO_HTTP_TIMEOUT_SECS` - Backend request timeout (default: 15)
//! - `MERCADITO_REMOTE_RETRIES` - Extra attempts for remote cart calls (default: 0)
//! - `MERCADITO_REMOTE_RETRY_BACKOFF_MS` - First retry delay (default: 250)
//! - `ANTHROPIC_API_KEY` - Text generation API key (assistant is offline without it)
//! - `ANTHROPIC_MODEL` - Model name (default: claude-sonnet-4-20250514)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use mercadito_core::{Principal, PrincipalKind};

use crate::cart::RetryPolicy;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Backend REST API configuration
    pub backend: BackendConfig,
    /// Text generation configuration (assistant runs offline when absent)
    pub claude: Option<ClaudeConfig>,
    /// Principal the session runs under
    pub principal: Principal,
    /// Directory used for durable local storage
    pub storage_dir: PathBuf,
    /// How long a catalog snapshot stays fresh
    pub catalog_ttl: Duration,
    /// Retry policy for remote cart calls
    pub retry: RetryPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backend REST API configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL all endpoints are resolved against
    pub base_url: Url,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Text generation API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ClaudeConfig {
    /// API key
    pub api_key: SecretString,
    /// Model name
    pub model: String,
}

impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
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
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`StorefrontConfig::from_env`].
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let backend = BackendConfig {
            base_url: parse_base_url(&env.required("MERCADITO_BACKEND_URL")?)?,
            request_timeout: Duration::from_secs(env.parsed("MERCADITO_HTTP_TIMEOUT_SECS", 15)?),
        };

        let claude = match env.optional("ANTHROPIC_API_KEY") {
            Some(key) => {
                validate_secret_strength(&key, "ANTHROPIC_API_KEY")?;
                Some(ClaudeConfig {
                    api_key: SecretString::from(key),
                    model: env.or_default("ANTHROPIC_MODEL", DEFAULT_MODEL),
                })
            }
            None => None,
        };

        let retry = RetryPolicy::new(
            env.parsed("MERCADITO_REMOTE_RETRIES", 0)?,
            Duration::from_millis(env.parsed("MERCADITO_REMOTE_RETRY_BACKOFF_MS", 250)?),
        );

        Ok(Self {
            backend,
            claude,
            principal: principal_from_env(&env)?,
            storage_dir: PathBuf::from(env.or_default("MERCADITO_STORAGE_DIR", ".mercadito")),
            catalog_ttl: Duration::from_secs(env.parsed("MERCADITO_CATALOG_TTL_SECS", 300)?),
            retry,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

/// Build the session principal from environment variables.
fn principal_from_env(env: &Env<'_>) -> Result<Principal, ConfigError> {
    let kind = env
        .or_default("MERCADITO_PRINCIPAL", "anonymous")
        .parse::<PrincipalKind>()
        .map_err(|e| ConfigError::InvalidEnvVar("MERCADITO_PRINCIPAL".to_string(), e))?;

    let principal = match kind {
        PrincipalKind::Anonymous => Principal::anonymous(),
        PrincipalKind::Customer => Principal::customer(
            env.required("MERCADITO_USER_ID")?,
            env.required_secret("MERCADITO_CUSTOMER_TOKEN")?,
        ),
        PrincipalKind::Staff => Principal::staff(
            env.required("MERCADITO_USER_ID")?,
            env.required_secret("MERCADITO_CUSTOMER_TOKEN")?,
        ),
    };

    Ok(match env.optional("MERCADITO_USER_NAME") {
        Some(name) => principal.with_display_name(name),
        None => principal,
    })
}

/// Parse and check the backend base URL.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("MERCADITO_BACKEND_URL".to_string(), e.to_string())
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "MERCADITO_BACKEND_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup with the usual required/optional/default accessors.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a required variable as a secret.
    fn required_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        Ok(SecretString::from(self.required(key)?))
    }

    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to a default when unset.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
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

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}
