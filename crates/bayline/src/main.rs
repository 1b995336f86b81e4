//! Bayline - shop console command-line client
//!
//! Main entry point for the Bayline CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{auth, config, customers, jobs, obd2, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Bayline - shop console command-line client
#[derive(Parser)]
#[command(name = "bayline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: http://localhost:5000)
    #[arg(long, global = true, env = "BAYLINE_SERVER_URL")]
    pub server: Option<String>,

    /// Directory holding config.toml
    #[arg(long, global = true, env = "BAYLINE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show server health
    Status(status::StatusArgs),

    /// Sign in, sign out and inspect the session
    Auth(auth::AuthArgs),

    /// Customer records
    Customers(customers::CustomersArgs),

    /// Repair jobs
    Jobs(jobs::JobsArgs),

    /// OBD-II trouble codes
    Obd2(obd2::Obd2Args),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "bayline=debug,bayline_client=debug,bayline_config=debug,info"
    } else {
        "bayline=info,bayline_client=warn,bayline_config=warn,warn"
    };

    let log_dir = cli
        .config_dir
        .clone()
        .or_else(bayline_config::config_dir)
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "bayline.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "bayline=trace,bayline_client=trace,bayline_config=trace,info",
                )),
        )
        .init();

    let mut loaded = bayline_config::load_config(cli.config_dir.as_deref())?;
    loaded.config.apply_server_override(cli.server);
    loaded.config.validate()?;

    let ctx = commands::Context {
        config: loaded.config,
        config_path: loaded.path,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Customers(args) => customers::run(args, &ctx).await,
        Commands::Jobs(args) => jobs::run(args, &ctx).await,
        Commands::Obd2(args) => obd2::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
