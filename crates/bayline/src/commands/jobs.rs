//! Jobs command - repair jobs on the shop floor.

use anyhow::Result;
use bayline_client::JobStatusUpdate;
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::{Value, json};

use super::{Context, field, print_error, print_json, records, settle, truncate};

/// Arguments for the jobs command.
#[derive(Args, Debug)]
pub struct JobsArgs {
    #[command(subcommand)]
    pub command: JobsCommand,
}

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    /// List jobs
    List {
        /// Only jobs in this status
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum jobs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a job
    Show {
        /// Job ID
        id: String,
    },

    /// Open a job for a vehicle
    Open {
        /// Vehicle ID
        vehicle: String,

        /// Work description
        description: String,

        /// Seconds to hold a queued write for replay
        #[arg(long, default_value = "0")]
        wait: u64,
    },

    /// Move a job to a new status
    Status {
        /// Job ID
        id: String,

        /// New status (e.g. in_progress, waiting_parts, completed)
        status: String,

        /// Note recorded with the change
        #[arg(short, long)]
        notes: Option<String>,

        /// Seconds to hold a queued write for replay
        #[arg(long, default_value = "0")]
        wait: u64,
    },

    /// Log labor against a job
    Labor {
        /// Job ID
        id: String,

        /// Hours worked
        hours: f64,

        /// What was done
        #[arg(short, long)]
        description: Option<String>,

        /// Seconds to hold a queued write for replay
        #[arg(long, default_value = "0")]
        wait: u64,
    },
}

/// Run the jobs command.
pub async fn run(args: JobsArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let jobs = client.jobs();

    let (label, outcome, wait) = match args.command {
        JobsCommand::List { status, limit } => {
            let params: Vec<(&str, &str)> =
                status.iter().map(|s| ("status", s.as_str())).collect();
            return match jobs.list(&params).await {
                Ok(list) => show_list(ctx, &list, limit),
                Err(e) => {
                    print_error(ctx, &e);
                    Err(e.into())
                }
            };
        }
        JobsCommand::Show { id } => {
            return match jobs.get(&id).await {
                Ok(job) => show_one(ctx, &job),
                Err(e) => {
                    print_error(ctx, &e);
                    Err(e.into())
                }
            };
        }
        JobsCommand::Open {
            vehicle,
            description,
            wait,
        } => {
            let body = json!({ "vehicle_id": vehicle, "description": description });
            (format!("Job opened for vehicle {}", vehicle), jobs.create(&body).await, wait)
        }
        JobsCommand::Status {
            id,
            status,
            notes,
            wait,
        } => {
            let mut update = JobStatusUpdate::new(status.clone());
            if let Some(notes) = notes {
                update = update.with_notes(notes);
            }
            (
                format!("Job {} is now {}", id, status),
                jobs.update_status(&id, &update).await,
                wait,
            )
        }
        JobsCommand::Labor {
            id,
            hours,
            description,
            wait,
        } => {
            let body = json!({ "hours": hours, "description": description });
            (
                format!("Logged {}h on job {}", hours, id),
                jobs.add_labor(&id, &body).await,
                wait,
            )
        }
    };

    match outcome {
        Ok(outcome) => settle(ctx, &client, &label, outcome, wait).await,
        Err(e) => {
            print_error(ctx, &e);
            Err(e.into())
        }
    }
}

fn show_list(ctx: &Context, list: &Value, limit: usize) -> Result<()> {
    if ctx.json_output {
        return print_json(list);
    }

    let items = records(list, "jobs");
    let dim = Style::new().dim();
    if items.is_empty() {
        println!("{}", dim.apply_to("No jobs."));
        return Ok(());
    }

    println!(
        "{:<8} {:<16} {:<10} {}",
        style("ID").bold(),
        style("Status").bold(),
        style("Vehicle").bold(),
        style("Description").bold()
    );
    println!("{}", dim.apply_to("─".repeat(72)));
    for job in items.iter().take(limit) {
        println!(
            "{:<8} {} {:<10} {}",
            field(job, "id"),
            status_style(&field(job, "status")),
            field(job, "vehicle_id"),
            truncate(&field(job, "description"), 36)
        );
    }
    if items.len() > limit {
        println!(
            "{}",
            dim.apply_to(format!("... and {} more", items.len() - limit))
        );
    }
    Ok(())
}

fn show_one(ctx: &Context, job: &Value) -> Result<()> {
    if ctx.json_output {
        return print_json(job);
    }
    let dim = Style::new().dim();
    let job = job.get("job").unwrap_or(job);

    println!("{} {}", style("Job").bold(), style(field(job, "id")).bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("Status:     "), status_style(&field(job, "status")));
    println!("  {} {}", dim.apply_to("Vehicle:    "), field(job, "vehicle_id"));
    println!("  {} {}", dim.apply_to("Description:"), field(job, "description"));
    if let Some(notes) = job.get("notes").and_then(Value::as_str) {
        println!("  {} {}", dim.apply_to("Notes:      "), notes);
    }
    Ok(())
}

/// Status padded to its column, then coloured.
fn status_style(status: &str) -> String {
    let paint = match status {
        "completed" | "closed" => Style::new().green(),
        "waiting_parts" | "on_hold" => Style::new().yellow(),
        "cancelled" => Style::new().red(),
        _ => Style::new(),
    };
    paint.apply_to(format!("{:<16}", status)).to_string()
}
