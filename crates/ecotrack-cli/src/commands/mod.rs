//! Subcommands and shared configuration loading.

pub mod batch;
pub mod config;
pub mod process;
pub mod records;

use std::path::{Path, PathBuf};

use ecotrack_core::EcotrackConfig;
use tracing::debug;

/// `<config dir>/ecotrack/config.json`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ecotrack")
        .join("config.json")
}

/// Load the explicit config file, else the default one if present, else
/// defaults. Environment overrides are applied last.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<EcotrackConfig> {
    let config = match config_path {
        Some(path) => EcotrackConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path, e))?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                debug!("Using config file {}", default_path.display());
                EcotrackConfig::from_file(&default_path)?
            } else {
                EcotrackConfig::default()
            }
        }
    };

    Ok(config.with_env_overrides())
}
