use anyhow::Result;
use bwmon_types::AppConfig;
use log::debug;
use std::path::{Path, PathBuf};

/// Load configuration from the default location.
///
/// A missing file yields the default configuration.
pub fn load() -> Result<AppConfig> {
    let config_path = config_path()?;

    if !config_path.exists() {
        debug!("No config at {}, using defaults", config_path.display());
        return Ok(AppConfig::default());
    }

    load_from_path(&config_path)
}

/// Save configuration to the default location
pub fn save(config: &AppConfig) -> Result<()> {
    save_to_path(config, &config_path()?)
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("org", "bwmon", "bwmon")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(dirs.config_dir().join("config.json"))
}

/// Load configuration from a specific file path
pub fn load_from_path(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Save configuration to a specific file path
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
