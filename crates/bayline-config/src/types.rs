//! Configuration types.
//!
//! ```toml
//! [server]
//! url = "http://localhost:5000"
//!
//! [timeouts]
//! standard-secs = 30
//! health-secs = 5
//! upload-secs = 60
//!
//! [cache]
//! ttl-secs = 300
//!
//! [queue]
//! attempts-per-drain = 1
//! backoff = "none"          # none | fixed | exponential
//! backoff-ms = 500
//! max-backoff-ms = 10000
//!
//! [session]
//! persist = true
//! # dir = "/var/lib/bayline"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default server root.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaylineConfig {
    pub server: ServerConfig,
    pub timeouts: TimeoutsConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub session: SessionConfig,
}

impl BaylineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            return Err(ConfigError::invalid("server.url", "must not be empty"));
        }
        if !self.server.url.starts_with("http://") && !self.server.url.starts_with("https://") {
            return Err(ConfigError::invalid(
                "server.url",
                format!("'{}' is not an http(s) URL", self.server.url),
            ));
        }
        for (field, secs) in [
            ("timeouts.standard-secs", self.timeouts.standard_secs),
            ("timeouts.health-secs", self.timeouts.health_secs),
            ("timeouts.upload-secs", self.timeouts.upload_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::invalid(field, "must be at least 1"));
            }
        }
        if self.queue.attempts_per_drain == 0 {
            return Err(ConfigError::invalid(
                "queue.attempts-per-drain",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Replace the server URL when an override is present and non-empty.
    pub fn apply_server_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.server.url = url;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[server]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerConfig {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            user_agent: None,
        }
    }
}

/// `[timeouts]`, per request class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimeoutsConfig {
    pub standard_secs: u64,
    pub health_secs: u64,
    pub upload_secs: u64,
}

impl TimeoutsConfig {
    pub fn standard(&self) -> Duration {
        Duration::from_secs(self.standard_secs)
    }

    pub fn health(&self) -> Duration {
        Duration::from_secs(self.health_secs)
    }

    pub fn upload(&self) -> Duration {
        Duration::from_secs(self.upload_secs)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            standard_secs: 30,
            health_secs: 5,
            upload_secs: 60,
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Backoff between replay attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    None,
    Fixed,
    Exponential,
}

/// `[queue]`, offline replay policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QueueConfig {
    pub attempts_per_drain: u32,
    pub backoff: BackoffKind,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl QueueConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            attempts_per_drain: 1,
            backoff: BackoffKind::None,
            backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

/// `[session]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Keep the session credential across restarts.
    pub persist: bool,
    /// Directory holding `session.json`; the platform data dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl SessionConfig {
    /// Directory the session file lives in, when persistence is on.
    pub fn resolve_dir(&self) -> Option<PathBuf> {
        if !self.persist {
            return None;
        }
        self.dir.clone().or_else(crate::data_dir)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist: true,
            dir: None,
        }
    }
}
