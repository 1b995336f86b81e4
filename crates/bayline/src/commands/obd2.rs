//! OBD-II command - trouble code parsing and lookup.

use anyhow::Result;
use bayline_client::Obd2LookupRequest;
use bayline_client::api::{parse_codes, validate_code};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::{Value, json};

use super::{Context, field, print_error, print_json, records};

/// Arguments for the obd2 command.
#[derive(Args, Debug)]
pub struct Obd2Args {
    #[command(subcommand)]
    pub command: Obd2Command,
}

#[derive(Subcommand, Debug)]
pub enum Obd2Command {
    /// Extract trouble codes from scanner output (offline)
    Parse {
        /// Text containing codes, e.g. "P0300 p0171 misfire"
        text: Vec<String>,
    },

    /// Check that each argument is a well-formed trouble code (offline)
    Validate {
        /// Codes to check
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Look up code descriptions on the server
    Lookup {
        /// Codes or free text containing them
        #[arg(required = true)]
        text: Vec<String>,
    },
}

/// Run the obd2 command.
pub async fn run(args: Obd2Args, ctx: &Context) -> Result<()> {
    match args.command {
        Obd2Command::Parse { text } => cmd_parse(&text.join(" "), ctx),
        Obd2Command::Validate { codes } => cmd_validate(&codes, ctx),
        Obd2Command::Lookup { text } => cmd_lookup(&text.join(" "), ctx).await,
    }
}

fn cmd_parse(text: &str, ctx: &Context) -> Result<()> {
    let codes = parse_codes(text);
    if ctx.json_output {
        return print_json(&json!({ "codes": codes }));
    }
    if codes.is_empty() {
        println!("{}", Style::new().dim().apply_to("No trouble codes found."));
    }
    for code in &codes {
        println!("{}", code);
    }
    Ok(())
}

fn cmd_validate(codes: &[String], ctx: &Context) -> Result<()> {
    let results: Vec<(&str, bool)> = codes.iter().map(|c| (c.as_str(), validate_code(c))).collect();
    let all_valid = results.iter().all(|(_, ok)| *ok);

    if ctx.json_output {
        let report: Vec<Value> = results
            .iter()
            .map(|(code, ok)| json!({ "code": code, "valid": ok }))
            .collect();
        print_json(&report)?;
    } else {
        let green = Style::new().green();
        let red = Style::new().red();
        for (code, ok) in &results {
            if *ok {
                println!("{} {}", green.apply_to("✓"), code);
            } else {
                println!("{} {}", red.apply_to("✗"), code);
            }
        }
    }

    if !all_valid {
        anyhow::bail!("Some codes are not valid OBD-II trouble codes");
    }
    Ok(())
}

async fn cmd_lookup(text: &str, ctx: &Context) -> Result<()> {
    let codes = parse_codes(text);
    if codes.is_empty() {
        anyhow::bail!("No trouble codes found in '{}'", text);
    }

    let client = ctx.client()?;
    let request = Obd2LookupRequest {
        codes,
        vehicle: None,
    };
    match client.obd2().lookup(&request).await {
        Ok(result) => {
            if ctx.json_output {
                return print_json(&result);
            }
            let dim = Style::new().dim();
            let entries = records(&result, "codes");
            if entries.is_empty() {
                println!("{}", dim.apply_to("No descriptions returned."));
            }
            for entry in &entries {
                println!("{}  {}", style(field(entry, "code")).bold(), field(entry, "description"));
                if let Some(causes) = entry.get("possible_causes").and_then(Value::as_array) {
                    for cause in causes.iter().filter_map(Value::as_str) {
                        println!("    {} {}", dim.apply_to("-"), cause);
                    }
                }
            }
            Ok(())
        }
        Err(e) => {
            print_error(ctx, &e);
            Err(e.into())
        }
    }
}
