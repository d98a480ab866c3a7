//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::time::Duration;

use serde::Deserialize;

use crate::services::backoff::BackoffPolicy;

/// Application configuration loaded from environment variables.
///
/// Loaded once at startup and never mutated afterwards. Every outbound call to the
/// aggregator carries the credentials below as request headers.
///
/// # Environment Variables
///
/// - `FUSE_BASE_PATH` (required): Aggregator API base URL
/// - `FUSE_CLIENT_ID` (required): Sent as `Fuse-Client-Id`
/// - `FUSE_API_KEY` (required): Sent as `Fuse-Api-Key`, also the webhook HMAC key
/// - `PLAID_*`, `TELLER_*`, `MX_*` (optional): Per-aggregator credential sets
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 8080
/// - `BACKOFF_*`, `UPSTREAM_TIMEOUT_SECS`, `EXCHANGE_DEADLINE_SECS` (optional): Latency bounds
#[derive(Clone, Deserialize)]
pub struct Config {
    pub fuse_base_path: String,
    pub fuse_client_id: String,
    pub fuse_api_key: String,

    #[serde(default)]
    pub plaid_client_id: Option<String>,
    #[serde(default)]
    pub plaid_secret: Option<String>,

    #[serde(default)]
    pub teller_application_id: Option<String>,
    #[serde(default)]
    pub teller_certificate: Option<String>,
    #[serde(default)]
    pub teller_private_key: Option<String>,
    #[serde(default)]
    pub teller_signing_secret: Option<String>,

    #[serde(default)]
    pub mx_client_id: Option<String>,
    #[serde(default)]
    pub mx_api_key: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    /// `client_name` shown by the linking UI of the aggregator.
    #[serde(default = "default_client_name")]
    pub link_client_name: String,

    #[serde(default = "default_backoff_attempts")]
    pub backoff_attempts: u32,
    #[serde(default = "default_backoff_start_delay_ms")]
    pub backoff_start_delay_ms: u64,
    #[serde(default = "default_backoff_max_delay_ms")]
    pub backoff_max_delay_ms: u64,

    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "default_exchange_deadline_secs")]
    pub exchange_deadline_secs: u64,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    8080
}

fn default_client_name() -> String {
    "Fuse Example".to_string()
}

fn default_backoff_attempts() -> u32 {
    3
}

fn default_backoff_start_delay_ms() -> u64 {
    100
}

fn default_backoff_max_delay_ms() -> u64 {
    5000
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

fn default_exchange_deadline_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., FUSE_API_KEY)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: fuse_api_key -> FUSE_API_KEY
        envy::from_env::<Config>()
    }

    /// Retry policy for the balance and transaction calls.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            attempts: self.backoff_attempts,
            start_delay: Duration::from_millis(self.backoff_start_delay_ms),
            max_delay: Duration::from_millis(self.backoff_max_delay_ms),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn exchange_deadline(&self) -> Duration {
        Duration::from_secs(self.exchange_deadline_secs)
    }
}

// Credentials must never end up in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("fuse_base_path", &self.fuse_base_path)
            .field("server_port", &self.server_port)
            .field("link_client_name", &self.link_client_name)
            .field("backoff_attempts", &self.backoff_attempts)
            .field("backoff_start_delay_ms", &self.backoff_start_delay_ms)
            .field("backoff_max_delay_ms", &self.backoff_max_delay_ms)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("exchange_deadline_secs", &self.exchange_deadline_secs)
            .finish_non_exhaustive()
    }
}
