//! Test Plan Sync - Main Server
//!
//! Serves the sync API, or runs a single scope refresh from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use testplan_sync::{AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "testplan-sync")]
#[command(about = "Mirror remote test plans into a cached document store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides config.yaml and SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Refresh one scope and print the result as JSON
    Sync {
        /// Resource scope whose connection should be synced
        #[arg(short, long)]
        scope: String,

        /// Always refresh, even when the cached suites are fresh
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,testplan_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            testplan_sync::start_server(config).await
        }
        Commands::Sync { scope, force } => run_sync(config, &scope, force).await,
    }
}

async fn run_sync(config: Config, scope: &str, force: bool) -> Result<()> {
    tracing::info!("Syncing scope '{}'", scope);

    let state = AppState::new(config).await?;

    // A forced sync reports the run itself; otherwise show what readers get
    let output = if force {
        serde_json::to_string_pretty(&state.orchestrator.refresh(scope).await?)?
    } else {
        serde_json::to_string_pretty(&state.orchestrator.read_suites(scope, false).await?)?
    };
    println!("{}", output);

    Ok(())
}
