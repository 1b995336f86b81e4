//! Status command - shows server health.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use serde_json::{Map, Value};

use super::Context;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show every field the health endpoint reports
    #[arg(short, long)]
    pub detailed: bool,
}

/// Status response for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    reachable: bool,
    status: Option<String>,
    server_url: String,
    authenticated: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    details: Map<String, Value>,
}

/// Run the status command.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let authenticated = client.is_authenticated();
    let dim = Style::new().dim();

    match client.health().check().await {
        Ok(health) => {
            if ctx.json_output {
                let output = StatusOutput {
                    reachable: true,
                    status: Some(health.status.clone()),
                    server_url: ctx.server_url().to_string(),
                    authenticated,
                    details: health.details,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                let green = Style::new().green();

                println!();
                println!("{}", style("Shop Server Status").bold());
                println!("{}", dim.apply_to("─".repeat(40)));
                println!();
                println!(
                    "  {} {}",
                    dim.apply_to("Status:"),
                    green.apply_to(format!("● {}", health.status))
                );
                println!("  {} {}", dim.apply_to("Server:"), ctx.server_url());
                println!(
                    "  {} {}",
                    dim.apply_to("Session:"),
                    if authenticated { "signed in" } else { "signed out" }
                );

                if args.detailed && !health.details.is_empty() {
                    println!();
                    println!("{}", dim.apply_to("─".repeat(40)));
                    println!();
                    for (key, value) in &health.details {
                        let shown = match value {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        println!("  {} {}", dim.apply_to(format!("{}:", key)), shown);
                    }
                }

                println!();
            }
        }
        Err(e) => {
            if ctx.json_output {
                let output = StatusOutput {
                    reachable: false,
                    status: None,
                    server_url: ctx.server_url().to_string(),
                    authenticated,
                    details: Map::new(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                let red = Style::new().red();

                println!();
                println!("{}", style("Shop Server Status").bold());
                println!("{}", dim.apply_to("─".repeat(40)));
                println!();
                println!(
                    "  {} {}",
                    dim.apply_to("Status:"),
                    red.apply_to("● unreachable")
                );
                println!("  {} {}", dim.apply_to("Server:"), ctx.server_url());

                if ctx.verbose {
                    println!();
                    println!("  {} {} ({})", dim.apply_to("Error:"), e, e.kind);
                }

                println!();
            }
        }
    }

    Ok(())
}
