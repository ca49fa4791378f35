//! Offer Marketplace Server
//!
//! Serves the REST API over an in-memory marketplace ledger and dispatches
//! ledger events to webhook subscribers.
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings (flower marketplace on port 8000)
//! offermarket-server
//!
//! # Seed sample data
//! offermarket-server --seed-demo
//!
//! # Start with environment overrides
//! OFFERMARKET__SERVER__PORT=9000 OFFERMARKET__EVENTS__STORE=redis offermarket-server
//! ```

mod config;
mod seed;

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use offermarket_api::{create_router, ApiConfig, AppState};
use offermarket_core::{EventSource, Flower, Generic, MarketKind, MarketVariant, Marketplace, MemoryContract, Roles};
use offermarket_events::{Dispatcher, MemorySubscriptionStore, RedisSubscriptionStore, SubscriptionStore};

use crate::config::ServerConfig;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Offer marketplace server
#[derive(Parser, Debug)]
#[command(name = "offermarket-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "OFFERMARKET_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Marketplace flavour (flower, generic)
    #[arg(long)]
    market: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long)]
    log_format: Option<String>,

    /// Redis URL; switches subscriptions to the Redis store
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Populate the ledger with sample data
    #[arg(long)]
    seed_demo: bool,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(market) = self.market {
            config.market.kind = market;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(url) = self.redis_url {
            config.events.store = "redis".to_string();
            config.events.redis_url = url;
        }
        if self.seed_demo {
            config.market.seed_demo = true;
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::load(args.config.as_deref())?;
    args.apply(&mut server_config);

    init_logging(&server_config.logging)?;

    let kind = MarketKind::resolve(Some(&server_config.market.kind), Generic::TYPE_NAME);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        market = %kind,
        "Starting offer marketplace server"
    );

    match kind {
        MarketKind::Flower => {
            let contract = MemoryContract::new::<Flower>(&server_config.market.account);
            if server_config.market.seed_demo {
                seed::flower_demo(&contract, chrono::Utc::now().timestamp()).await?;
            }
            serve::<Flower>(server_config, contract).await
        }
        MarketKind::Generic => {
            if server_config.market.seed_demo {
                tracing::warn!("Demo data is only available for the flower marketplace");
            }
            let contract = MemoryContract::new::<Generic>(&server_config.market.account);
            serve::<Generic>(server_config, contract).await
        }
    }
}

/// Wire the ledger, subscription store, dispatcher and router, then serve
async fn serve<V: MarketVariant>(config: ServerConfig, contract: MemoryContract) -> anyhow::Result<()> {
    let contract = Arc::new(contract);
    let roles = Roles {
        is_manager: config.market.is_manager,
        is_owner: config.market.is_owner,
    };
    let market = Marketplace::<V>::new(contract.clone(), roles);

    let store = init_store(&config.events).await?;
    let state = AppState::new(market, store.clone()).with_event_kinds(contract.event_kinds());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = if config.events.enabled {
        let source: Arc<dyn EventSource> = contract.clone();
        let dispatcher = Dispatcher::new(source, store, config.events.dispatcher_config())?
            .from_latest()
            .await?;
        Some(tokio::spawn(dispatcher.run(shutdown_rx)))
    } else {
        None
    };

    let app = create_router(Arc::new(state), ApiConfig::from(&config.api));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = dispatcher {
        if tokio::time::timeout(config.server.shutdown_timeout(), handle).await.is_err() {
            tracing::warn!("Dispatcher did not stop in time");
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber.with(fmt::layer().json().with_target(true)).try_init()?;
        }
        _ => {
            subscriber.with(fmt::layer().pretty().with_target(true)).try_init()?;
        }
    }

    Ok(())
}

async fn init_store(config: &config::EventSettings) -> anyhow::Result<Arc<dyn SubscriptionStore>> {
    match config.store.as_str() {
        "redis" => {
            tracing::info!(url = %config.redis_url, "Connecting to Redis subscription store");
            Ok(Arc::new(RedisSubscriptionStore::connect(&config.redis_url).await?))
        }
        "memory" => Ok(Arc::new(MemorySubscriptionStore::new())),
        other => anyhow::bail!("unknown subscription store '{other}', use memory or redis"),
    }
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["offermarket-server", "--port", "8080", "--market", "generic"]);
        assert_eq!(args.port, Some(8080));

        let mut config = ServerConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.market.kind, "generic");
        assert_eq!(
            MarketKind::resolve(Some(&config.market.kind), Generic::TYPE_NAME),
            MarketKind::Generic
        );
    }

    #[test]
    fn test_redis_flag_switches_store() {
        let args = Args::parse_from(["offermarket-server", "--redis-url", "redis://cache:6379"]);
        let mut config = ServerConfig::default();
        args.apply(&mut config);
        assert_eq!(config.events.store, "redis");
        assert_eq!(config.events.redis_url, "redis://cache:6379");
    }
}
