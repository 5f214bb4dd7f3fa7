//! Relaychat Daemon - credential-holding relay for streaming chat completions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use relaychat::config::Config;
use relaychat::error::Result;
use relaychat::relay::{AppState, RelayServer};

/// Relaychat - streaming relay between a chat front-end and an LLM provider
#[derive(Parser)]
#[command(name = "relaychat")]
#[command(about = "A streaming relay that keeps your provider credential off the client")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the relay server (default command)
    #[command(name = "serve")]
    Serve {
        /// Override the configured listen address
        #[arg(long)]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None => serve(cli.config, None).await,
        Some(Command::Serve { listen }) => serve(cli.config, listen).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,relaychat=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>, listen: Option<String>) -> Result<()> {
    let mut config = Config::load(config_path.as_deref())?;
    if let Some(listen) = listen {
        config.relay.listen_addr = listen;
    }

    let state = AppState::from_env(config.relay)?;
    RelayServer::new(state).serve().await
}
