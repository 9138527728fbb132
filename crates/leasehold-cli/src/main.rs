//! leasehold CLI - command-line client for the leasehold lock service
//!
//! Provides commands for:
//! - Acquiring, releasing and renewing leases
//! - Inspecting a lock or listing all held locks
//! - Reading the recent event log
//! - Inspecting the daemon configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use leasehold_core::config::Config;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod output;

use client::{LeaseholdClient, DEFAULT_SERVER_URL};
use commands::{
    config::ConfigCommand,
    lock::{LockCommand, RenewCommand, UnlockCommand},
    log::LogCommand,
    status::{ListCommand, StatusCommand},
};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "leasehold", version, about = "Named locks with expiring leases")]
pub struct Cli {
    /// Base URL of the leasehold server
    #[arg(long, global = true, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Try once to take a lock
    Lock(LockCommand),
    /// Release a lock you hold
    Unlock(UnlockCommand),
    /// Extend a lock you hold
    Renew(RenewCommand),
    /// Show who holds a lock
    Status(StatusCommand),
    /// List held locks
    List(ListCommand),
    /// Show recent lock events
    Log(LogCommand),
    /// Inspect the daemon configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    fn tracing_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    async fn run(self, format: OutputFormat) -> Result<()> {
        let client = || LeaseholdClient::new(&self.server);

        match &self.command {
            Commands::Lock(cmd) => cmd.execute(&client()?, format).await,
            Commands::Unlock(cmd) => cmd.execute(&client()?, format).await,
            Commands::Renew(cmd) => cmd.execute(&client()?, format).await,
            Commands::Status(cmd) => cmd.execute(&client()?, format).await,
            Commands::List(cmd) => cmd.execute(&client()?, format).await,
            Commands::Log(cmd) => cmd.execute(&client()?, format).await,
            Commands::Config(cmd) => {
                let path = self.config.clone().unwrap_or_else(Config::default_path);
                cmd.execute(&path, format).await
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays parseable
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.tracing_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    if let Err(e) = cli.run(format).await {
        get_formatter(format).error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
