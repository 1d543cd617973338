//! MathAgent Gateway
//!
//! Serves the HTTP routes and agent legs until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use mathagent::config::{self, validate_config, StorageBackendKind};
use mathagent::gateway::GatewayServer;
use mathagent::operations::OperationTable;
use mathagent::session::SessionRegistry;
use mathagent::store::create_storage;
use mathagent::VERSION;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "mathagent-gateway",
    version = VERSION,
    about = "MathAgent gateway - HTTP and WebSocket front door for math agents"
)]
struct Args {
    /// Bind address
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(long, short)]
    port: Option<u16>,

    /// Configuration file
    #[arg(long, env = "MATHAGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Storage backend (memory or file)
    #[arg(long)]
    storage: Option<StorageBackendKind>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,mathagent=info,tower_http=info".into());
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    // Load config: defaults < file < env < flags
    let mut config = config::load_config_with(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(storage) = args.storage {
        config.storage.backend = storage;
    }

    let validation = validate_config(&config);
    for issue in &validation.warnings {
        warn!("{}", issue);
    }
    if !validation.valid {
        for issue in &validation.errors {
            error!("{}", issue);
        }
        bail!("Invalid configuration");
    }

    let storage = create_storage(&config.storage)?;
    if !storage.health_check().await? {
        bail!("Storage backend '{}' is not healthy", storage.id());
    }

    let operations = Arc::new(OperationTable::builtin());
    info!(
        storage = storage.id(),
        operations = operations.count(),
        idle_eviction = ?config.session.idle_eviction,
        leg_idle_timeout = ?config.session.leg_idle_timeout,
        "Starting MathAgent gateway v{}",
        VERSION
    );

    let registry = SessionRegistry::new(storage, operations, &config.session);
    let server = GatewayServer::from_config(registry, &config.gateway, &config.session);
    server
        .start(&config.gateway.bind, config.gateway.port, shutdown_signal())
        .await?;

    info!("Gateway shutdown complete");
    Ok(())
}
