//! Application configuration loaded from `config.toml`.
//!
//! The file carries the reward policy tables and the catalog used to seed the
//! database. Every section is optional; missing sections fall back to the
//! defaults in [`rewards::RewardConfig`] and an empty catalog.

/// Catalog seeding (products, coupons, daily tasks)
pub mod catalog;

/// Database configuration and connection management
pub mod database;

/// Reward and order policies
pub mod rewards;

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Reward and order policies
    #[serde(default)]
    pub rewards: rewards::RewardConfig,
    /// Seed data
    #[serde(default, flatten)]
    pub catalog: catalog::Catalog,
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A present field has the wrong type
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from the default location (./config.toml)
pub fn load_default_config() -> Result<Config> {
    load_config("config.toml")
}
