//! Configuration directory paths
//!
//! Uses XDG directories via `dirs` crate.
//!
//! Platform-specific locations:
//! - Linux: `~/.config/evreg/`
//! - macOS: `~/Library/Application Support/evreg/`
//! - Windows: `%APPDATA%\evreg\`

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_NAME: &str = "evreg";

/// Get the application config directory, creating it if needed
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    let dir = base.join(APP_NAME);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
    Ok(dir)
}

/// Get path to the persisted token pair
pub fn tokens_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("tokens.toml"))
}

/// Get path to the app config file in the config directory
pub fn app_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_exists() {
        let dir = config_dir().unwrap();
        assert!(dir.exists());
        assert!(dir.ends_with(APP_NAME));
    }

    #[test]
    fn test_file_paths() {
        assert!(tokens_path().unwrap().ends_with("tokens.toml"));
        assert!(app_config_path().unwrap().ends_with("config.toml"));
    }
}
