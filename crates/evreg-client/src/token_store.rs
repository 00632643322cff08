//! Token pair storage
//!
//! Tokens live outside the query cache. Both values are written and cleared
//! together.

use crate::types::TokenPair;
use evreg_config::StoredTokens;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Where the access/refresh token pair is kept
pub trait TokenStore: Send + Sync {
    /// The stored pair, if both tokens are present
    fn load(&self) -> Option<TokenPair>;

    /// Replace both tokens
    fn store(&self, pair: &TokenPair);

    /// Forget both tokens
    fn clear(&self);

    /// Current access token
    fn access_token(&self) -> Option<String> {
        self.load().map(|pair| pair.access_token)
    }
}

/// In-process storage, for tests and short-lived sessions
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    pair: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(pair: TokenPair) -> Self {
        Self {
            pair: Mutex::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<TokenPair> {
        self.pair
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, pair: &TokenPair) {
        *self.pair.lock().unwrap_or_else(PoisonError::into_inner) = Some(pair.clone());
    }

    fn clear(&self) {
        *self.pair.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Tokens persisted in a TOML file (see [`evreg_config::tokens_path`])
///
/// File errors are logged and treated as "no tokens".
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store in the platform config directory
    pub fn default_location() -> anyhow::Result<Self> {
        Ok(Self::new(evreg_config::tokens_path()?))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<TokenPair> {
        match StoredTokens::load_from_path(&self.path) {
            Ok(stored) => stored.pair().map(|(access, refresh)| TokenPair {
                access_token: access.to_string(),
                refresh_token: refresh.to_string(),
            }),
            Err(e) => {
                log::warn!("Failed to load tokens: {:#}", e);
                None
            }
        }
    }

    fn store(&self, pair: &TokenPair) {
        let stored = StoredTokens::new(&pair.access_token, &pair.refresh_token);
        if let Err(e) = stored.save_to_path(&self.path) {
            log::warn!("Failed to save tokens: {:#}", e);
        }
    }

    fn clear(&self) {
        if let Err(e) = StoredTokens::clear_path(&self.path) {
            log::warn!("Failed to clear tokens: {:#}", e);
        }
    }
}
