use std::path::PathBuf;

use clap::{Parser, Subcommand};
use relaychat::config::Config;
use relaychat_cli::commands::{AskCommand, ChatCommand, HistoryCommand, ModelCommand};
use relaychat_cli::error::CliResult;
use relaychat_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relaychat-cli")]
#[command(about = "Relaychat CLI - Terminal chat through the relaychat relay")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Interactive chat session")]
    Chat(ChatCommand),

    #[clap(about = "Send one message and print the reply")]
    Ask(AskCommand),

    #[clap(about = "Conversation history commands")]
    History(HistoryCommand),

    #[clap(about = "Model selection commands")]
    Model(ModelCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    init_logging();

    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Chat(cmd) => cmd.execute(&config).await,
        Command::Ask(cmd) => cmd.execute(&config, format).await,
        Command::History(cmd) => cmd.execute(&config, format).await,
        Command::Model(cmd) => cmd.execute(&config, format).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
