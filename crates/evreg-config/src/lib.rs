//! Configuration and file management for evreg
//!
//! This crate provides:
//! - File path utilities for config files
//! - Configuration file loading (TOML) with environment overrides
//! - Application configuration (AppConfig)
//! - Token pair persistence
//! - Supported locales and locale-prefixed path resolution

pub mod app_config;
pub mod config_file;
pub mod locale;
pub mod paths;
pub mod tokens;

pub use app_config::AppConfig;
pub use config_file::load_config_file;
pub use locale::{LocaleError, LocaleRouter, LocalizedPath};
pub use paths::{app_config_path, config_dir, tokens_path};
pub use tokens::StoredTokens;
