//! Configuration for the Bayline shop console client.
//!
//! Provides TOML-based configuration with:
//! - Server root and user agent (`[server]`)
//! - Per-class request timeouts (`[timeouts]`)
//! - Response cache TTL (`[cache]`)
//! - Offline replay policy (`[queue]`)
//! - Session persistence (`[session]`)
//!
//! The file lives in `$BAYLINE_CONFIG_DIR` or the platform config directory;
//! `BAYLINE_SERVER_URL` overrides the server root.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, SERVER_URL_ENV, config_dir, config_path, data_dir, load_config,
    load_config_file, load_config_from, save_config,
};
pub use error::{ConfigError, Result};
pub use types::*;
