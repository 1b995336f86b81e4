//! Auth command - shop account sign-in.

use std::io::Write;

use anyhow::Result;
use bayline_client::{ChangePasswordRequest, LoginRequest};
use clap::{Args, Subcommand};
use console::{Style, style};
use serde_json::json;

use super::{Context, field, print_error, print_json};

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in with email and password
    Login {
        /// Account email
        email: String,

        /// Password (prompted when omitted)
        #[arg(long, env = "BAYLINE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show the stored session
    Status,

    /// Show the signed-in user as the server sees it
    Whoami,

    /// Exchange the current token for a fresh one
    Refresh,

    /// Change the account password
    Passwd,

    /// Sign out and forget the stored session
    Logout,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { email, password } => cmd_login(email, password, ctx).await,
        AuthCommand::Status => cmd_status(ctx),
        AuthCommand::Whoami => cmd_whoami(ctx).await,
        AuthCommand::Refresh => cmd_refresh(ctx).await,
        AuthCommand::Passwd => cmd_passwd(ctx).await,
        AuthCommand::Logout => cmd_logout(ctx).await,
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    Ok(rpassword::read_password()?)
}

async fn cmd_login(email: String, password: Option<String>, ctx: &Context) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password("Password: ")?,
    };
    if password.is_empty() {
        println!("No password provided, aborting.");
        return Ok(());
    }

    let client = ctx.client()?;
    match client.auth().login(&LoginRequest::new(email, password)).await {
        Ok(auth) => {
            if ctx.json_output {
                print_json(&json!({ "authenticated": true, "user": auth.user }))?;
            } else {
                let green = Style::new().green();
                println!(
                    "{} Signed in as {}",
                    green.apply_to("✓"),
                    style(field(&auth.user, "email")).bold()
                );
            }
            Ok(())
        }
        Err(e) => {
            print_error(ctx, &e);
            Err(e.into())
        }
    }
}

fn cmd_status(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let credential = client.session().credential();
    let dim = Style::new().dim();

    if ctx.json_output {
        return print_json(&json!({
            "authenticated": credential.is_some(),
            "server_url": ctx.server_url(),
            "user": credential.as_ref().map(|c| c.user.clone()),
        }));
    }

    println!("{}", style("Authentication Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    match credential {
        Some(credential) => {
            let signed_in = Style::new().green().apply_to("signed in");
            println!("  {} {}", dim.apply_to("Status:"), signed_in);
            println!("  {} {}", dim.apply_to("User:"), field(&credential.user, "email"));
            println!("  {} {}", dim.apply_to("Token:"), credential.masked_token());
        }
        None => {
            println!("  {} {}", dim.apply_to("Status:"), Style::new().red().apply_to("signed out"));
            println!();
            println!("  {}", dim.apply_to("Sign in with: bayline auth login <email>"));
        }
    }
    println!("  {} {}", dim.apply_to("Server:"), ctx.server_url());
    Ok(())
}

async fn cmd_whoami(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    match client.auth().me().await {
        Ok(user) => {
            if ctx.json_output {
                print_json(&user)?;
            } else {
                let dim = Style::new().dim();
                let user = user.get("user").unwrap_or(&user);
                println!("  {} {}", dim.apply_to("Email:"), field(user, "email"));
                println!("  {} {}", dim.apply_to("Name:"), field(user, "name"));
                println!("  {} {}", dim.apply_to("Role:"), field(user, "role"));
            }
            Ok(())
        }
        Err(e) => {
            print_error(ctx, &e);
            Err(e.into())
        }
    }
}

async fn cmd_refresh(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    match client.auth().refresh().await {
        Ok(response) => {
            if ctx.json_output {
                print_json(&json!({ "refreshed": response.token.is_some() }))?;
            } else if response.token.is_some() {
                println!("{} Session refreshed", Style::new().green().apply_to("✓"));
            } else {
                println!("Server returned no new token; session unchanged.");
            }
            Ok(())
        }
        Err(e) => {
            print_error(ctx, &e);
            Err(e.into())
        }
    }
}

async fn cmd_passwd(ctx: &Context) -> Result<()> {
    let current_password = prompt_password("Current password: ")?;
    let new_password = prompt_password("New password: ")?;
    let confirm = prompt_password("Repeat new password: ")?;
    if new_password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    let client = ctx.client()?;
    let request = ChangePasswordRequest {
        current_password,
        new_password,
    };
    match client.auth().change_password(&request).await {
        Ok(_) => {
            println!("{} Password changed", Style::new().green().apply_to("✓"));
            Ok(())
        }
        Err(e) => {
            print_error(ctx, &e);
            Err(e.into())
        }
    }
}

async fn cmd_logout(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let acknowledged = client.auth().logout().await;

    if ctx.json_output {
        print_json(&json!({ "signed_out": true, "server_acknowledged": acknowledged }))?;
    } else {
        println!("{} Signed out", Style::new().green().apply_to("✓"));
        if !acknowledged && ctx.verbose {
            println!(
                "  {}",
                Style::new().dim().apply_to("Server was not told; local session cleared.")
            );
        }
    }
    Ok(())
}
