mod commands;
mod config;
mod console;

use clap::{Parser, Subcommand};
use config::CliConfig;
use rollbot_core::{RollConfig, RollError, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rollbot")]
#[command(about = "Roll lottery bot for group chats")]
#[command(version)]
struct Cli {
    /// Data directory for the lottery database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Bot configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot against a console chat on stdin/stdout
    Run(commands::RunArgs),

    /// Insert a web-sourced lottery directly into the store
    Insert(commands::InsertArgs),

    /// List the lotteries of a group
    List(commands::ListArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "rollbot={level},rollbot_core={level},rollbot_lottery={level}",
            level = log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let paths = CliConfig::resolve(cli.data_dir, cli.config);
    tokio::fs::create_dir_all(&paths.data_dir).await?;

    let result = run(cli.command, &paths).await;

    if let Err(e) = result {
        match e.downcast_ref::<RollError>() {
            Some(RollError::Config(msg)) => {
                eprintln!("Error: Invalid configuration: {}", msg);
                eprintln!("Check {}", paths.config_path.display());
            }
            Some(RollError::Storage(err)) => {
                eprintln!("Error: Database failure: {}", err);
                eprintln!("Database: {}", paths.db_path().display());
            }
            _ => {
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, paths: &CliConfig) -> anyhow::Result<()> {
    let storage = Arc::new(Storage::new(&paths.db_path()).await?);

    match command {
        Commands::Run(args) => {
            let config = RollConfig::load(&paths.config_path).await?;
            commands::handle_run_command(args, config, storage).await
        }
        Commands::Insert(args) => commands::handle_insert_command(args, &storage).await,
        Commands::List(args) => commands::handle_list_command(args, &storage).await,
    }
}
