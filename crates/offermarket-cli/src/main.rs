//! Offer marketplace CLI
//!
//! Talks to a marketplace server over its REST API. The flavour of the
//! marketplace is read from the server (or forced with `--override-type`);
//! unrecognised flavours can still be listed and inspected, but not given
//! new requests or offers.
//!
//! ```bash
//! offermarket --manager add-request 12 rose --deadline +2h
//! offermarket add-offer 1 40
//! offermarket --manager decide-request 1
//! offermarket show 1
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::*;
use offermarket_client::HttpContract;
use offermarket_core::{Contract, Flower, Generic, MarketKind, Marketplace, RequestId, Roles};

mod commands;
mod deadline;
mod display;
mod variant;

use commands::Action;
use variant::CliVariant;

const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

#[derive(Parser)]
#[command(name = "offermarket")]
#[command(version)]
#[command(about = "Inspect and trade on an offer marketplace", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Marketplace server URL
    #[arg(long, global = true, env = "OFFERMARKET_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Act with manager rights (creating, deciding, closing requests)
    #[arg(long, global = true)]
    manager: bool,

    /// Act with owner rights (implies manager)
    #[arg(long, global = true)]
    owner: bool,

    /// Marketplace type to assume instead of the one the server reports
    #[arg(long, global = true, env = "OFFERMARKET_TYPE")]
    override_type: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all requests
    #[command(alias = "list-requests")]
    List,

    /// Show a request with its offers
    #[command(alias = "show-request")]
    Show { request: RequestId },

    /// Add a request
    AddRequest {
        /// Flavour-specific parameters, e.g. `<quantity> <type>` for flowers
        params: Vec<String>,

        /// Unix timestamp, RFC 3339 date/time, YYYY-MM-DD, or +<n>[smhd];
        /// one hour from now when omitted
        #[arg(short, long)]
        deadline: Option<String>,
    },

    /// Add an offer to a request
    AddOffer {
        request: RequestId,

        /// Flavour-specific parameters, e.g. `<price>` for flowers
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        params: Vec<String>,
    },

    /// Decide a request
    DecideRequest { request: RequestId },

    /// Close a request to further offers
    CloseRequest { request: RequestId },

    /// Delete a closed request
    DeleteRequest { request: RequestId },

    /// Show marketplace information
    Info,
}

impl Commands {
    fn into_action(self, now: i64) -> anyhow::Result<Action> {
        Ok(match self {
            Commands::List => Action::List,
            Commands::Show { request } => Action::Show { request },
            Commands::AddRequest { deadline: when, params } => Action::AddRequest {
                deadline: match when {
                    Some(value) => deadline::parse_deadline(&value, now)?,
                    None => now + deadline::DEFAULT_OFFSET_SECS,
                },
                params,
            },
            Commands::AddOffer { request, params } => Action::AddOffer { request, params },
            Commands::DecideRequest { request } => Action::DecideRequest { request },
            Commands::CloseRequest { request } => Action::CloseRequest { request },
            Commands::DeleteRequest { request } => Action::DeleteRequest { request },
            Commands::Info => Action::Info,
        })
    }
}

async fn run_as<V: CliVariant>(contract: Arc<dyn Contract>, roles: Roles, action: Action, now: i64) -> anyhow::Result<()> {
    let market = Marketplace::<V>::new(contract, roles);
    commands::run(&market, action, now).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let now = chrono::Utc::now().timestamp();
    let action = cli.command.unwrap_or(Commands::List).into_action(now)?;

    let roles = Roles {
        is_manager: cli.manager || cli.owner,
        is_owner: cli.owner,
    };
    let contract: Arc<dyn Contract> = Arc::new(HttpContract::connect(&cli.server)?);
    let reported = contract.info().await?.type_name;
    let kind = MarketKind::resolve(cli.override_type.as_deref(), &reported);

    if kind == MarketKind::Generic {
        println!(
            "  {} Marketplace type {} is not recognised, using the generic fallback",
            "⚠".yellow(),
            reported.bright_cyan()
        );
    }

    let result = match kind {
        MarketKind::Flower => run_as::<Flower>(contract, roles, action, now).await,
        MarketKind::Generic => run_as::<Generic>(contract, roles, action, now).await,
    };
    if let Err(e) = &result {
        display::error(&e.to_string());
    }
    result
}
