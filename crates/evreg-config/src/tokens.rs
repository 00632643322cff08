//! Token pair persistence
//!
//! The access and refresh tokens are stored together in a small TOML file
//! under fixed keys. There is no cross-process locking: the last writer wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Persisted tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredTokens {
    /// Build a record holding both tokens
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            updated_at: Some(Utc::now()),
        }
    }

    /// Load tokens from `path`; a missing file yields an empty record
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse token file: {:?}", path))
    }

    /// Write tokens to `path`
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize tokens")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write token file: {:?}", path))?;
        log::debug!("Saved tokens to {:?}", path);
        Ok(())
    }

    /// Remove the token file, if present
    pub fn clear_path(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                log::debug!("Removed token file {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove token file: {:?}", path))
            }
        }
    }

    /// Both tokens, if both are present
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some((access, refresh)),
            _ => None,
        }
    }
}
