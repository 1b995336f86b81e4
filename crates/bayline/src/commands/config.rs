//! Config command - configuration management.

use anyhow::Result;
use bayline_config::{BaylineConfig, load_config_from, save_config};
use clap::{Args, Subcommand};
use console::{Style, style};

use super::{Context, print_json};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a config file with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Set the server URL in the config file
    SetServer {
        /// Server root, e.g. http://shop-server.local:5000
        url: String,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { force } => cmd_init(force, ctx),
        ConfigCommand::SetServer { url } => cmd_set_server(url, ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        return print_json(&ctx.config);
    }

    let dim = Style::new().dim();
    let config = &ctx.config;

    println!("{}", style("Configuration").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    match &ctx.config_path {
        Some(path) if path.is_file() => {
            println!("  {} {}", dim.apply_to("File:"), path.display())
        }
        Some(path) => println!(
            "  {} {} {}",
            dim.apply_to("File:"),
            path.display(),
            dim.apply_to("(not created, using defaults)")
        ),
        None => println!("  {} {}", dim.apply_to("File:"), dim.apply_to("(none)")),
    }
    println!();
    println!("  {} {}", dim.apply_to("Server:"), config.server.url);
    println!(
        "  {} standard {}s, health {}s, upload {}s",
        dim.apply_to("Timeouts:"),
        config.timeouts.standard_secs,
        config.timeouts.health_secs,
        config.timeouts.upload_secs
    );
    println!("  {} {}s", dim.apply_to("Cache TTL:"), config.cache.ttl_secs);
    println!(
        "  {} {} attempt(s) per drain, backoff {:?}",
        dim.apply_to("Replay:"),
        config.queue.attempts_per_drain,
        config.queue.backoff
    );
    match config.session.resolve_dir() {
        Some(dir) => println!(
            "  {} {}",
            dim.apply_to("Session:"),
            dir.join("session.json").display()
        ),
        None => println!("  {} not persisted", dim.apply_to("Session:")),
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    match &ctx.config_path {
        Some(path) => {
            if ctx.json_output {
                print_json(&serde_json::json!({
                    "path": path,
                    "exists": path.is_file(),
                }))?;
            } else {
                println!("{}", path.display());
            }
            Ok(())
        }
        None => anyhow::bail!("Could not determine config directory"),
    }
}

fn cmd_init(force: bool, ctx: &Context) -> Result<()> {
    let path = ctx
        .config_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    if path.is_file() && !force {
        println!("Config already exists at {}", path.display());
        println!("Pass --force to overwrite it.");
        return Ok(());
    }

    save_config(&BaylineConfig::new(), path)?;
    println!(
        "{} Wrote {}",
        Style::new().green().apply_to("✓"),
        path.display()
    );
    Ok(())
}

fn cmd_set_server(url: String, ctx: &Context) -> Result<()> {
    let path = ctx
        .config_path
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    // Start from the file alone so environment overrides are not persisted.
    let dir = path.parent();
    let mut config = load_config_from(dir)?.config;
    config.server.url = url;
    config.validate()?;
    save_config(&config, path)?;

    println!(
        "{} Server set to {}",
        Style::new().green().apply_to("✓"),
        config.server.url
    );
    Ok(())
}
