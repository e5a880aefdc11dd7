// Configuration loader: environment variables and YAML files

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;
use tracing::warn;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Build configuration from environment variables only.
    ///
    /// `INFLUXDB_VERSION=1` selects the 1.x backend, any other value the
    /// 2.x backend. The 2.x connection follows the client's `INFLUXDB_V2_*`
    /// property names.
    pub fn from_env() -> Result<InfluxConfig> {
        let backend = Self::backend_from_env();

        let backend_config = if backend == "legacy" {
            BackendConfig::Legacy {
                legacy: Self::legacy_from_env()?,
            }
        } else {
            BackendConfig::Modern {
                modern: Self::modern_from_env()?,
            }
        };

        let config = InfluxConfig {
            storage: StorageConfig {
                backend,
                bucket: Self::bucket_from_env().unwrap_or_else(default_bucket),
                backend_config,
            },
            ..InfluxConfig::default()
        };

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<InfluxConfig> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let content = Self::substitute_env_vars(&content);

        let config: InfluxConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Map `INFLUXDB_VERSION` to a backend name, defaulting to modern
    pub(crate) fn backend_from_env() -> String {
        let version = std::env::var("INFLUXDB_VERSION").unwrap_or_else(|_| "2".to_string());
        match version.trim() {
            "1" => "legacy".to_string(),
            "2" => "modern".to_string(),
            other => {
                warn!("Unrecognized INFLUXDB_VERSION '{}', using 2.x backend", other);
                "modern".to_string()
            }
        }
    }

    /// `INFLUXDB_V2_BUCKET` wins over `INFLUXDB_DATABASE`
    pub(crate) fn bucket_from_env() -> Option<String> {
        std::env::var("INFLUXDB_V2_BUCKET")
            .or_else(|_| std::env::var("INFLUXDB_DATABASE"))
            .ok()
    }

    fn legacy_from_env() -> Result<LegacyConfig> {
        let port = match std::env::var("INFLUXDB_PORT") {
            Ok(port) => port
                .trim()
                .parse()
                .with_context(|| format!("INFLUXDB_PORT is not a valid port: '{}'", port))?,
            Err(_) => default_port(),
        };

        Ok(LegacyConfig {
            host: std::env::var("INFLUXDB_HOST").unwrap_or_else(|_| default_host()),
            port,
            username: std::env::var("INFLUXDB_USERNAME").unwrap_or_else(|_| default_credential()),
            password: std::env::var("INFLUXDB_PASSWORD").unwrap_or_else(|_| default_credential()),
            ssl: std::env::var("INFLUXDB_SSL")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            timeout_seconds: None,
        })
    }

    fn modern_from_env() -> Result<ModernConfig> {
        let timeout_ms = match std::env::var("INFLUXDB_V2_TIMEOUT") {
            Ok(timeout) => timeout.trim().parse().with_context(|| {
                format!("INFLUXDB_V2_TIMEOUT is not a number of milliseconds: '{}'", timeout)
            })?,
            Err(_) => default_timeout_ms(),
        };

        Ok(ModernConfig {
            url: std::env::var("INFLUXDB_V2_URL").unwrap_or_else(|_| default_url()),
            org: std::env::var("INFLUXDB_V2_ORG").unwrap_or_default(),
            token: std::env::var("INFLUXDB_V2_TOKEN").unwrap_or_default(),
            timeout_ms,
            verify_ssl: std::env::var("INFLUXDB_V2_VERIFY_SSL")
                .map(|v| parse_flag(&v))
                .unwrap_or_else(|_| default_verify_ssl()),
        })
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${INFLUXDB_V2_TOKEN} -> my-token
    /// - ${INFLUXDB_DATABASE:-garmin} -> garmin (if INFLUXDB_DATABASE not set)
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").expect("static pattern is valid");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        })
        .to_string()
    }

    /// Validate configuration
    pub(crate) fn validate(config: &InfluxConfig) -> Result<()> {
        if config.storage.bucket.trim().is_empty() {
            bail!("storage.bucket cannot be empty");
        }

        match config.storage.backend.as_str() {
            "legacy" => match config.storage.backend_config.as_legacy() {
                Some(legacy) => {
                    if legacy.host.is_empty() {
                        bail!("legacy.host cannot be empty");
                    }
                    if legacy.port == 0 {
                        bail!("legacy.port must be > 0");
                    }
                }
                None => bail!("legacy backend selected but legacy config missing"),
            },
            "modern" => match config.storage.backend_config.as_modern() {
                Some(modern) => {
                    if modern.url.is_empty() {
                        bail!("modern.url cannot be empty");
                    }
                }
                None => bail!("modern backend selected but modern config missing"),
            },
            unknown => bail!("Unknown backend: '{}'. Supported: legacy, modern", unknown),
        }

        if config.lookup.measurement.is_empty() {
            bail!("lookup.measurement cannot be empty");
        }

        Ok(())
    }
}

/// "true", "yes" and "1" (any case) are on
fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "yes" | "1")
}
