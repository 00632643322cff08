//! Application configuration
//!
//! Loaded from `.evreg.toml`, then overridden by environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding [`AppConfig::api_base_url`]
pub const API_URL_ENV: &str = "EVREG_API_URL";
/// Environment variable overriding [`AppConfig::locale`]
pub const LOCALE_ENV: &str = "EVREG_LOCALE";

/// Application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the REST API, without trailing slash
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout; a timed out request counts as a network failure
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Active locale code
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Locale codes accepted as path prefixes
    #[serde(default = "default_supported_locales")]
    pub supported_locales: Vec<String>,

    /// Page size used for list queries
    #[serde(default = "default_list_page_size")]
    pub list_page_size: u32,
}

fn default_api_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_supported_locales() -> Vec<String> {
    vec!["en".to_string(), "ko".to_string()]
}

fn default_list_page_size() -> u32 {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            locale: default_locale(),
            supported_locales: default_supported_locales(),
            list_page_size: default_list_page_size(),
        }
    }
}

impl AppConfig {
    /// Load config from file (or defaults), then apply environment overrides
    pub fn load() -> Self {
        let config = match crate::load_config_file() {
            Some(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded app config from file");
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            None => {
                log::debug!("Using default app config");
                Self::default()
            }
        };

        config.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an environment lookup
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            log::debug!("API base URL overridden by {}", API_URL_ENV);
            self.api_base_url = url;
        }
        if let Some(locale) = lookup(LOCALE_ENV).filter(|v| !v.trim().is_empty()) {
            self.locale = locale;
        }
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();

        if !self.supported_locales.contains(&self.locale) {
            log::warn!(
                "Locale '{}' is not supported, falling back to '{}'",
                self.locale,
                self.default_locale()
            );
            self.locale = self.default_locale().to_string();
        }
        self
    }

    /// First supported locale, used when none is selected
    pub fn default_locale(&self) -> &str {
        self.supported_locales
            .first()
            .map(String::as_str)
            .unwrap_or("en")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:3000/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.locale, "en");
        assert_eq!(config.supported_locales, vec!["en", "ko"]);
        assert_eq!(config.list_page_size, 10);
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml = r#"
            api_base_url = "https://events.example.com/api"
            request_timeout_secs = 5
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.api_base_url, "https://events.example.com/api");
        assert_eq!(config.request_timeout_secs, 5);
        // Other fields should use defaults
        assert_eq!(config.locale, "en");
        assert_eq!(config.list_page_size, 10);
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::default().with_env_overrides(|name| match name {
            API_URL_ENV => Some("https://api.example.com/".to_string()),
            LOCALE_ENV => Some("ko".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.locale, "ko");
    }

    #[test]
    fn test_unsupported_locale_falls_back() {
        let config = AppConfig::default().with_env_overrides(|name| {
            (name == LOCALE_ENV).then(|| "xx".to_string())
        });
        assert_eq!(config.locale, "en");
    }
}
