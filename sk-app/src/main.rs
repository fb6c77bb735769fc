//! Sidekick main binary.

mod commands;
mod compose;
mod config;
mod context;
mod dispatch;
mod server;
mod weather;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sidekick", version, about = "Sidekick personal assistant bot")]
struct Cli {
    /// Path to config.toml (default: ~/.sidekick/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the bot (default).
    Serve,
    /// Create ~/.sidekick with a config template and a seeded database.
    Init,
    /// Validate config and report store/key health.
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(cli.config).await,
        Command::Init => server::init(cli.config).await,
        Command::Doctor => server::doctor(cli.config).await,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,sk_app=debug,sk_channels=debug,sk_llm=debug,sk_store=debug")
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .compact()
        .init();
}
