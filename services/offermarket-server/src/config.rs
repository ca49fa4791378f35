//! Server Configuration
//!
//! Loaded from an optional file, `config/default`, `config/local`, then
//! `OFFERMARKET__SECTION__KEY` environment variables.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use offermarket_api::ApiConfig;
use offermarket_events::DispatcherConfig;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub market: MarketSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server binding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Grace period for in-flight requests on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Marketplace settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSettings {
    /// Marketplace flavour (`flower`, `generic` or a full type name)
    #[serde(default = "default_market_kind")]
    pub kind: String,

    /// Identity the server acts as; it deploys and owns the ledger
    #[serde(default = "default_account")]
    pub account: String,

    #[serde(default = "default_true")]
    pub is_manager: bool,

    #[serde(default = "default_true")]
    pub is_owner: bool,

    /// Populate the ledger with sample requests and offers on startup
    #[serde(default)]
    pub seed_demo: bool,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            kind: default_market_kind(),
            account: default_account(),
            is_manager: true,
            is_owner: true,
            seed_demo: false,
        }
    }
}

/// Webhook dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_delivery_timeout")]
    pub delivery_timeout_secs: u64,

    /// Subscription store backend (`memory` or `redis`)
    #[serde(default = "default_store")]
    pub store: String,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
            delivery_timeout_secs: default_delivery_timeout(),
            store: default_store(),
            redis_url: default_redis_url(),
        }
    }
}

impl EventSettings {
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
        }
    }
}

/// API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_true")]
    pub enable_tracing: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors_origins: default_cors_origins(),
            enable_tracing: true,
        }
    }
}

impl From<&ApiSettings> for ApiConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            enable_cors: settings.enable_cors,
            cors_origins: settings.cors_origins.clone(),
            enable_tracing: settings.enable_tracing,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_shutdown_timeout() -> u64 {
    5
}

fn default_market_kind() -> String {
    "flower".to_string()
}

fn default_account() -> String {
    "0xmarketplace-owner".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_delivery_timeout() -> u64 {
    10
}

fn default_store() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl ServerConfig {
    /// Load configuration from environment and optional config file
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        builder = builder.add_source(
            config::Environment::with_prefix("OFFERMARKET")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.market.kind, "flower");
        assert!(config.market.is_owner);
        assert!(!config.market.seed_demo);
        assert_eq!(config.events.poll_interval_secs, 5);
        assert_eq!(config.events.store, "memory");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: ServerConfig = config::Config::builder()
            .set_override("server.port", 9100)
            .unwrap()
            .set_override("events.store", "redis")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.events.store, "redis");
        assert_eq!(config.events.redis_url, "redis://localhost:6379");
    }

    #[test]
    fn test_dispatcher_interval_floor() {
        let settings = EventSettings {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(settings.dispatcher_config().poll_interval, Duration::from_secs(1));
    }
}
