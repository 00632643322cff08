//! Locale-prefixed paths
//!
//! The first path segment selects the active locale (`/ko/events/12`). The
//! bare root `/` resolves to the default locale; any other path whose first
//! segment is not a supported locale is treated as not found.

use thiserror::Error;

/// Errors from locale resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocaleError {
    #[error("Unsupported locale '{0}'")]
    NotFound(String),
}

/// A path split into its locale and the remaining route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizedPath {
    pub locale: String,
    /// Route without the locale prefix, always starting with `/`
    pub route: String,
    /// Whether the locale came from the path rather than the default
    pub explicit: bool,
}

/// Resolves and builds locale-prefixed paths for a fixed set of locales
#[derive(Debug, Clone)]
pub struct LocaleRouter {
    supported: Vec<String>,
    default_locale: String,
}

impl LocaleRouter {
    /// Create a router; the first supported locale is the default
    pub fn new(supported: Vec<String>) -> Self {
        let default_locale = supported.first().cloned().unwrap_or_else(|| "en".to_string());
        Self {
            supported,
            default_locale,
        }
    }

    pub fn from_config(config: &crate::AppConfig) -> Self {
        Self::new(config.supported_locales.clone())
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn is_supported(&self, locale: &str) -> bool {
        self.supported.iter().any(|l| l == locale)
    }

    /// Split `path` into locale and route
    pub fn resolve(&self, path: &str) -> Result<LocalizedPath, LocaleError> {
        let trimmed = path.trim_start_matches('/');
        let (first, rest) = match trimmed.split_once('/') {
            Some((first, rest)) => (first, rest),
            None => (trimmed, ""),
        };

        if self.is_supported(first) {
            return Ok(LocalizedPath {
                locale: first.to_string(),
                route: format!("/{}", rest),
                explicit: true,
            });
        }

        if trimmed.is_empty() {
            return Ok(LocalizedPath {
                locale: self.default_locale.clone(),
                route: "/".to_string(),
                explicit: false,
            });
        }

        Err(LocaleError::NotFound(first.to_string()))
    }

    /// Build the path for `route` under `locale`
    pub fn localize(&self, route: &str, locale: &str) -> Result<String, LocaleError> {
        if !self.is_supported(locale) {
            return Err(LocaleError::NotFound(locale.to_string()));
        }
        let route = route.trim_start_matches('/');
        if route.is_empty() {
            Ok(format!("/{}", locale))
        } else {
            Ok(format!("/{}/{}", locale, route))
        }
    }
}
