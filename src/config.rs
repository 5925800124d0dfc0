//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use std::time::Duration;

use serde::Deserialize;

use crate::federation::{DeliveryConfig, TokenBucketConfig};

/// Top-level federator configuration (§6 Configuration).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub federation: FederationConfig,
    pub instance: InstanceConfig,
    pub logging: LoggingConfig,
}

/// Server configuration (demo binary bind address only — the engine
/// itself has no HTTP dependency, §1).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Instance metadata, needed to compute the origin actor's own inbox for
/// the delivery exclusion rule (§4.6 step 4).
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Public domain (e.g., "social.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl InstanceConfig {
    /// Full origin URL, e.g. "https://social.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Federation engine tuning knobs (§6 Configuration list).
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    pub enable_client: bool,
    pub enable_server: bool,
    pub max_delivery_depth: u32,
    pub agent: String,
    pub worker_count: usize,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub http_timeout_secs: u64,
}

impl FederationConfig {
    pub fn to_delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            worker_count: self.worker_count,
            agent: self.agent.clone(),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            token_bucket: TokenBucketConfig {
                capacity: self.rate_limit.capacity,
                refill_interval: Duration::from_millis(self.rate_limit.refill_interval_ms),
            },
            queue_capacity: self.rate_limit.queue_capacity,
        }
    }
}

/// Per-host token-bucket rate limiting for outbound delivery (§4.6, §5).
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub capacity: u32,
    pub refill_interval_ms: u64,
    pub queue_capacity: usize,
}

/// Retry/backoff tuning for the delivery pool (§4.6 step 5).
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (APUB_FEDERATOR__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::EngineError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("instance.protocol", "https")?
            .set_default("federation.enable_client", true)?
            .set_default("federation.enable_server", true)?
            .set_default("federation.max_delivery_depth", 4)?
            .set_default("federation.agent", "apub-federator")?
            .set_default("federation.worker_count", 4)?
            .set_default("federation.http_timeout_secs", 10)?
            .set_default("federation.rate_limit.capacity", 5)?
            .set_default("federation.rate_limit.refill_interval_ms", 500)?
            .set_default("federation.rate_limit.queue_capacity", 1024)?
            .set_default("federation.retry.max_attempts", 5)?
            .set_default("federation.retry.base_delay_ms", 250)?
            .set_default("federation.retry.max_delay_ms", 30000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (APUB_FEDERATOR__*)
            .add_source(
                Environment::with_prefix("APUB_FEDERATOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
