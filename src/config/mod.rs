// Configuration module for influxdb-compat
//
// Provides:
// - Environment variable configuration (INFLUXDB_* names)
// - YAML configuration file loading with ${VAR} substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from the process environment
pub fn load_config_from_env() -> Result<InfluxConfig> {
    ConfigLoader::from_env().context("Failed to load configuration from environment")
}

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<InfluxConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
///
/// `INFLUXDB_V2_BUCKET` / `INFLUXDB_DATABASE` replace the file's bucket.
/// `INFLUXDB_VERSION` replaces the backend only when the file carries the
/// matching backend section.
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<InfluxConfig> {
    let mut config = load_config(path)?;

    if let Some(bucket) = ConfigLoader::bucket_from_env() {
        config.storage.bucket = bucket;
    }

    if std::env::var("INFLUXDB_VERSION").is_ok() {
        config.storage.backend = ConfigLoader::backend_from_env();
    }

    ConfigLoader::validate(&config)?;
    Ok(config)
}
