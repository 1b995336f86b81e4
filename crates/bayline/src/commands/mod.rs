//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod customers;
pub mod jobs;
pub mod obd2;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bayline_client::{
    Backoff, ClassifiedError, DrainReport, FileSessionStore, MemorySessionStore, MutationOutcome,
    ReplayPolicy, SessionStore, ShopClient, Timeouts,
};
use bayline_config::{BackoffKind, BaylineConfig, QueueConfig, TimeoutsConfig};
use console::Style;
use serde_json::Value;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Resolved configuration, overrides applied.
    pub config: BaylineConfig,
    /// Config file location, whether or not it exists.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn server_url(&self) -> &str {
        &self.config.server.url
    }

    /// Build a client for the configured server, rehydrating any stored session.
    pub fn client(&self) -> Result<ShopClient> {
        let store: Arc<dyn SessionStore> = match self.config.session.resolve_dir() {
            Some(dir) => Arc::new(FileSessionStore::new(&dir)),
            None => Arc::new(MemorySessionStore::new()),
        };

        let mut builder = ShopClient::builder()
            .base_url(self.server_url())
            .timeouts(timeouts(&self.config.timeouts))
            .cache_ttl(self.config.cache.ttl())
            .replay_policy(replay_policy(&self.config.queue))
            .session_store(store);
        if let Some(agent) = &self.config.server.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        Ok(builder.build()?)
    }
}

pub fn timeouts(config: &TimeoutsConfig) -> Timeouts {
    Timeouts {
        standard: config.standard(),
        health: config.health(),
        upload: config.upload(),
    }
}

pub fn replay_policy(config: &QueueConfig) -> ReplayPolicy {
    let backoff = match config.backoff {
        BackoffKind::None => Backoff::None,
        BackoffKind::Fixed => Backoff::Fixed(config.backoff_base()),
        BackoffKind::Exponential => Backoff::Exponential {
            base: config.backoff_base(),
            max: config.backoff_max(),
        },
    };
    ReplayPolicy::default()
        .with_attempts(config.attempts_per_drain)
        .with_backoff(backoff)
}

/// Interval between health probes while waiting to replay.
const PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Probe the server until it answers, then replay the queue.
///
/// Returns the final drain report, or `None` when `limit` passes first.
/// A halt on anything other than a network failure ends the wait.
pub async fn wait_for_replay(client: &ShopClient, limit: Duration) -> Option<DrainReport> {
    let wait = async {
        loop {
            if client.health().is_healthy().await {
                let report = match client.set_online(true).await {
                    Some(report) => report,
                    None => client.drain_queue().await,
                };
                match &report {
                    DrainReport::Halted { error, .. } if error.is_network() => {}
                    DrainReport::AlreadyDraining => {}
                    _ => return report,
                }
            }
            tracing::debug!(queued = client.queue().len(), "Server unreachable, waiting");
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    };
    tokio::time::timeout(limit, wait).await.ok()
}

/// Settle a write from a one-shot command. The queue does not outlive the
/// process, so a queued write is either replayed within `wait_secs` or
/// reported as dropped.
pub async fn settle(
    ctx: &Context,
    client: &ShopClient,
    label: &str,
    outcome: MutationOutcome,
    wait_secs: u64,
) -> Result<()> {
    print_outcome(ctx, label, &outcome)?;
    if !outcome.is_queued() {
        return Ok(());
    }

    let dim = Style::new().dim();
    if wait_secs == 0 {
        eprintln!(
            "{}",
            dim.apply_to("Queued writes are discarded on exit; pass --wait <secs> to hold them.")
        );
        anyhow::bail!("{} was not delivered", label);
    }

    if !ctx.json_output {
        println!(
            "{}",
            dim.apply_to(format!("Waiting up to {}s for the server...", wait_secs))
        );
    }
    match wait_for_replay(client, Duration::from_secs(wait_secs)).await {
        Some(DrainReport::Completed { replayed }) => {
            if !ctx.json_output {
                println!(
                    "{} Replayed {} queued write(s)",
                    Style::new().green().apply_to("✓"),
                    replayed
                );
            }
            Ok(())
        }
        Some(DrainReport::Halted { error, remaining, .. }) => {
            print_error(ctx, &error);
            anyhow::bail!("Replay halted with {} write(s) undelivered", remaining)
        }
        Some(DrainReport::AlreadyDraining) | None => {
            anyhow::bail!("Server still unreachable; {} was not delivered", label)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a classified failure. Quiet failures only show with `--verbose`.
pub fn print_error(ctx: &Context, e: &ClassifiedError) {
    let red = Style::new().red();
    let dim = Style::new().dim();
    if e.is_quiet() && !ctx.verbose {
        return;
    }
    eprintln!("{} {}", red.apply_to("Error:"), e.message);
    if ctx.verbose {
        eprintln!("  {} {}", dim.apply_to("kind:"), e.kind);
        if let Some(status) = e.status {
            eprintln!("  {} {}", dim.apply_to("status:"), status);
        }
    }
}

/// Report a write that either completed or was queued for replay.
pub fn print_outcome(ctx: &Context, label: &str, outcome: &MutationOutcome) -> Result<()> {
    let green = Style::new().green();
    let yellow = Style::new().yellow();

    match outcome {
        MutationOutcome::Completed(value) => {
            if ctx.json_output {
                print_json(value)?;
            } else {
                println!("{} {}", green.apply_to("✓"), label);
            }
        }
        MutationOutcome::Queued(receipt) => {
            if ctx.json_output {
                print_json(&serde_json::json!({
                    "queued": true,
                    "id": receipt.id,
                    "position": receipt.position,
                }))?;
            } else {
                println!(
                    "{} {} (offline, queued as #{} at position {})",
                    yellow.apply_to("…"),
                    label,
                    receipt.id,
                    receipt.position
                );
            }
        }
    }
    Ok(())
}

/// The list a collection endpoint returned, accepting a bare array or an
/// object wrapping one.
pub fn records(value: &Value, key: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.get("data"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// A display string for a field, or `-`.
pub fn field(record: &Value, name: &str) -> String {
    match record.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_replay_policy_from_config() {
        let mut queue = QueueConfig::default();
        assert_eq!(replay_policy(&queue), ReplayPolicy::default());

        queue.attempts_per_drain = 3;
        queue.backoff = BackoffKind::Exponential;
        let policy = replay_policy(&queue);
        assert_eq!(policy.attempts_per_drain, 3);
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                base: Duration::from_millis(500),
                max: Duration::from_secs(10),
            }
        );
    }

    #[test]
    fn test_timeouts_from_config() {
        let t = timeouts(&TimeoutsConfig::default());
        assert_eq!(t, Timeouts::default());
    }

    #[test]
    fn test_records_shapes() {
        assert_eq!(records(&json!([{"id": 1}]), "customers").len(), 1);
        assert_eq!(records(&json!({"customers": [{"id": 1}, {"id": 2}]}), "customers").len(), 2);
        assert_eq!(records(&json!({"data": [{"id": 1}]}), "jobs").len(), 1);
        assert!(records(&json!({"total": 0}), "jobs").is_empty());
    }

    #[test]
    fn test_field_and_truncate() {
        let record = json!({"name": "Ada", "id": 7, "phone": null});
        assert_eq!(field(&record, "name"), "Ada");
        assert_eq!(field(&record, "id"), "7");
        assert_eq!(field(&record, "phone"), "-");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer string", 10), "a much ...");
    }
}
