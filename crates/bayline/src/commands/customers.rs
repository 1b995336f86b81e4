//! Customers command - customer records.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::{Map, Value, json};

use super::{Context, field, print_error, print_json, records, settle, truncate};

/// Arguments for the customers command.
#[derive(Args, Debug)]
pub struct CustomersArgs {
    #[command(subcommand)]
    pub command: CustomersCommand,
}

#[derive(Subcommand, Debug)]
pub enum CustomersCommand {
    /// List customers
    List {
        /// Page number
        #[arg(long)]
        page: Option<u32>,

        /// Maximum customers to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Search customers by name, phone or email
    Search {
        /// Search query
        query: String,
    },

    /// Show a customer
    Show {
        /// Customer ID
        id: String,
    },

    /// List a customer's vehicles
    Vehicles {
        /// Customer ID
        id: String,
    },

    /// Add a customer
    Add {
        /// Full name
        name: String,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Seconds to hold a queued write for replay
        #[arg(long, default_value = "0")]
        wait: u64,
    },

    /// Delete a customer
    Delete {
        /// Customer ID
        id: String,

        /// Seconds to hold a queued write for replay
        #[arg(long, default_value = "0")]
        wait: u64,
    },
}

/// Run the customers command.
pub async fn run(args: CustomersArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let customers = client.customers();

    let result = match args.command {
        CustomersCommand::List { page, limit } => {
            let page = page.map(|p| p.to_string());
            let params: Vec<(&str, &str)> = page.iter().map(|p| ("page", p.as_str())).collect();
            customers
                .list(&params)
                .await
                .map(|list| show_list(ctx, &list, limit))
        }
        CustomersCommand::Search { query } => customers
            .search(&query)
            .await
            .map(|list| show_list(ctx, &list, usize::MAX)),
        CustomersCommand::Show { id } => customers.get(&id).await.map(|c| show_one(ctx, &c)),
        CustomersCommand::Vehicles { id } => {
            customers.vehicles(&id).await.map(|v| show_vehicles(ctx, &v))
        }
        CustomersCommand::Add {
            name,
            phone,
            email,
            wait,
        } => {
            let mut body = Map::new();
            body.insert("name".to_string(), json!(name));
            if let Some(phone) = phone {
                body.insert("phone".to_string(), json!(phone));
            }
            if let Some(email) = email {
                body.insert("email".to_string(), json!(email));
            }
            match customers.create(&Value::Object(body)).await {
                Ok(outcome) => {
                    let label = format!("Customer {} added", name);
                    return settle(ctx, &client, &label, outcome, wait).await;
                }
                Err(e) => Err(e),
            }
        }
        CustomersCommand::Delete { id, wait } => match customers.delete(&id).await {
            Ok(outcome) => {
                let label = format!("Customer {} deleted", id);
                return settle(ctx, &client, &label, outcome, wait).await;
            }
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(printed) => printed,
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

    let items = records(list, "customers");
    let dim = Style::new().dim();
    if items.is_empty() {
        println!("{}", dim.apply_to("No customers."));
        return Ok(());
    }

    println!(
        "{:<8} {:<28} {:<16} {}",
        style("ID").bold(),
        style("Name").bold(),
        style("Phone").bold(),
        style("Email").bold()
    );
    println!("{}", dim.apply_to("─".repeat(72)));
    for customer in items.iter().take(limit) {
        println!(
            "{:<8} {:<28} {:<16} {}",
            field(customer, "id"),
            truncate(&field(customer, "name"), 28),
            field(customer, "phone"),
            field(customer, "email")
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

fn show_one(ctx: &Context, customer: &Value) -> Result<()> {
    if ctx.json_output {
        return print_json(customer);
    }
    let dim = Style::new().dim();
    let customer = customer.get("customer").unwrap_or(customer);

    println!("{}", style(field(customer, "name")).bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    for key in ["id", "phone", "email", "address", "notes"] {
        let label = format!("{}:", key);
        println!("  {} {}", dim.apply_to(format!("{:<8}", label)), field(customer, key));
    }
    Ok(())
}

fn show_vehicles(ctx: &Context, vehicles: &Value) -> Result<()> {
    if ctx.json_output {
        return print_json(vehicles);
    }
    let dim = Style::new().dim();
    let items = records(vehicles, "vehicles");
    if items.is_empty() {
        println!("{}", dim.apply_to("No vehicles on file."));
        return Ok(());
    }
    for vehicle in &items {
        println!(
            "  {} {} {} {}  {}",
            dim.apply_to(format!("#{}", field(vehicle, "id"))),
            field(vehicle, "year"),
            field(vehicle, "make"),
            field(vehicle, "model"),
            dim.apply_to(field(vehicle, "vin"))
        );
    }
    Ok(())
}
