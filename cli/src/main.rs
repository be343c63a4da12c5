//! Self-service portal CLI
//!
//! Browse the service catalog, fill in and submit request forms, read the
//! knowledge base and keep track of submitted requests from the terminal.
//!
//! # Usage
//!
//! ```bash
//! portal catalog list --category Hardware
//! portal catalog form cat-002 --set license_type=team
//! portal submit cat-001 --set request_type=new --set ram_size=16
//! portal stored list
//! portal --proxy-url http://localhost:3001 knowledge list --search vpn
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use portal_core::ledger::FileStore;
use portal_core::service::{resolve, DemoFallback};
use portal_core::models::ListQuery;
use portal_core::{DataService, MockDataService, PortalConfig, RequestLedger, ServiceKind};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

#[derive(Parser)]
#[command(name = "portal")]
#[command(version)]
#[command(about = "Self-service portal for the ServiceNow catalog", long_about = None)]
struct Cli {
    /// ServiceNow instance URL
    #[arg(long, env = "SERVICENOW_BASE_URL", global = true)]
    base_url: Option<String>,

    /// ServiceNow username
    #[arg(long, env = "SERVICENOW_USERNAME", global = true)]
    username: Option<String>,

    /// ServiceNow password
    #[arg(long, env = "SERVICENOW_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Portal proxy server; holds the credentials when set
    #[arg(long, env = "PORTAL_PROXY_URL", global = true)]
    proxy_url: Option<String>,

    /// Name recorded on locally stored requests
    #[arg(long, env = "PORTAL_SUBMITTED_BY", global = true)]
    submitted_by: Option<String>,

    /// Use built-in demo data
    #[arg(long, global = true)]
    demo: bool,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Profile name from config file
    #[arg(long, short, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the service catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogCommands,
    },
    /// Fill in and submit a catalog item's form
    Submit {
        /// Catalog item id
        id: String,
        /// Field value, repeatable
        #[arg(long = "set", value_name = "NAME=VALUE")]
        values: Vec<String>,
        /// Do not record the request locally
        #[arg(long)]
        no_store: bool,
    },
    /// Requests on the ITSM instance
    Requests {
        #[command(subcommand)]
        action: RequestCommands,
    },
    /// Browse the knowledge base
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeCommands,
    },
    /// Requests submitted from this machine
    Stored {
        #[command(subcommand)]
        action: StoredCommands,
    },
    /// Configure CLI
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(clap::Args, Clone, Debug)]
pub struct ListArgs {
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    limit: u32,
}

impl ListArgs {
    pub fn query(&self) -> ListQuery {
        ListQuery {
            search: self.search.clone(),
            category: self.category.clone(),
            page: self.page,
            limit: self.limit,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List catalog items
    List {
        #[command(flatten)]
        list: ListArgs,
        /// Include unavailable items
        #[arg(long)]
        all: bool,
    },
    /// Get catalog item details
    Get { id: String },
    /// List catalog categories
    Categories,
    /// Render an item's form
    Form {
        id: String,
        /// Field value, repeatable; drives conditional fields
        #[arg(long = "set", value_name = "NAME=VALUE")]
        values: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum RequestCommands {
    /// List my requests
    List {
        #[command(flatten)]
        list: ListArgs,
        #[arg(long)]
        state: Option<String>,
    },
    /// Get request details
    Get { id: String },
}

#[derive(Subcommand)]
pub enum KnowledgeCommands {
    /// List published articles
    List {
        #[command(flatten)]
        list: ListArgs,
    },
    /// Read an article
    Get { id: String },
}

#[derive(Subcommand)]
pub enum StoredCommands {
    /// List stored requests, newest first
    List,
    /// Get a stored request by number or record id
    Get { key: String },
    /// Move a stored request forward
    Status { number: String, status: String },
    /// Forget all stored requests
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Set configuration value
    Set { key: String, value: String },
    /// Get configuration value
    Get { key: String },
    /// List all configuration
    List,
    /// Initialize configuration
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let profile = cli.profile.as_deref();
    let overrides = config::Overrides {
        base_url: cli.base_url,
        username: cli.username,
        password: cli.password,
        proxy_url: cli.proxy_url,
        submitted_by: cli.submitted_by,
    };
    let open = || connect(profile, overrides, cli.demo, cli.format);

    match cli.command {
        Commands::Catalog { action } => commands::catalog::handle(action, &open()?).await,
        Commands::Submit { id, values, no_store } => {
            commands::submit::handle(&open()?, &id, &values, no_store).await
        }
        Commands::Requests { action } => commands::requests::handle(action, &open()?).await,
        Commands::Knowledge { action } => commands::knowledge::handle(action, &open()?).await,
        Commands::Stored { action } => commands::stored::handle(action, &open()?),
        Commands::Config { action } => commands::config::handle(action, profile),
    }
}

/// Picks the data service and opens the local ledger.
fn connect(
    profile: Option<&str>,
    overrides: config::Overrides,
    demo: bool,
    format: output::OutputFormat,
) -> anyhow::Result<commands::Portal> {
    let file = config::Config::load(profile)?;
    let portal_config = config::merge(PortalConfig::from_env(), &file, overrides);

    let service: Arc<dyn DataService> = if demo {
        Arc::new(MockDataService::new())
    } else {
        let resolved = resolve(&portal_config);
        if resolved.kind() == ServiceKind::Real {
            Arc::new(DemoFallback::new(resolved))
        } else {
            resolved
        }
    };
    debug!(kind = %service.kind(), demo, "data service selected");
    if service.kind() == ServiceKind::Mock {
        eprintln!("{}", "Running in demo mode with sample data".yellow());
    }

    let storage = file.storage_dir()?;
    let store = FileStore::new(storage.clone())
        .with_context(|| format!("opening request storage at {}", storage.display()))?;

    Ok(commands::Portal {
        service,
        ledger: Arc::new(RequestLedger::new(Arc::new(store))),
        submitted_by: portal_config.submitter(),
        format,
    })
}
