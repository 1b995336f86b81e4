//! Config file discovery, loading and saving.
//!
//! The config file is `config.toml` in, in order of precedence:
//! 1. the directory passed explicitly
//! 2. `$BAYLINE_CONFIG_DIR`
//! 3. the platform config dir (`~/.config/bayline` on Linux)
//!
//! `BAYLINE_SERVER_URL` overrides `server.url` after the file is read.

use std::path::{Path, PathBuf};

use crate::{BaylineConfig, ConfigError, Result};

/// Config filename within the config directory.
const CONFIG_FILE: &str = "config.toml";

/// Application name for platform directory resolution.
const APP_NAME: &str = "bayline";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "BAYLINE_CONFIG_DIR";

/// Environment variable to override the server URL.
pub const SERVER_URL_ENV: &str = "BAYLINE_SERVER_URL";

/// Result of config discovery.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: BaylineConfig,
    /// Path that was checked.
    pub path: Option<PathBuf>,
    /// Whether the file existed and was read.
    pub loaded: bool,
}

/// Get the config directory.
///
/// Checks `BAYLINE_CONFIG_DIR` first, then falls back to the platform default.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the config file path.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}

/// Platform data directory for persisted client state.
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_NAME))
}

/// Discover and load configuration, then apply environment overrides.
///
/// A missing file yields the defaults.
pub fn load_config(config_dir: Option<&Path>) -> Result<LoadedConfig> {
    let mut loaded = load_config_from(config_dir)?;
    loaded
        .config
        .apply_server_override(std::env::var(SERVER_URL_ENV).ok());
    loaded.config.validate()?;
    Ok(loaded)
}

/// Load configuration without environment overrides.
pub fn load_config_from(config_dir: Option<&Path>) -> Result<LoadedConfig> {
    let path = match config_dir {
        Some(dir) => Some(dir.join(CONFIG_FILE)),
        None => config_path(),
    };

    match &path {
        Some(p) if p.is_file() => Ok(LoadedConfig {
            config: load_config_file(p)?,
            path,
            loaded: true,
        }),
        _ => Ok(LoadedConfig {
            config: BaylineConfig::new(),
            path,
            loaded: false,
        }),
    }
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<BaylineConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    BaylineConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &BaylineConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
