//! CLI command implementations.

pub mod init;
pub mod run;
pub mod sessions;
pub mod status;

use cadence_config::AppConfig;
use std::path::{Path, PathBuf};

/// The config file in use: `--config`, else `~/.cadence/config.toml`.
pub fn config_file(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load config from `path` with environment overrides applied.
pub fn load_config(path: &Path) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config =
        AppConfig::load_from(path).map_err(|e| format!("Failed to load config: {e}"))?;
    config.apply_env_overrides();
    Ok(config)
}
