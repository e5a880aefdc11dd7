// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for influxdb-compat

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InfluxConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration with backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Backend type: "legacy" (1.x) or "modern" (2.x)
    pub backend: String,

    /// Bucket (modern) or database (legacy) receiving the points
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Backend-specific configuration
    #[serde(flatten)]
    pub backend_config: BackendConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "modern".to_string(),
            bucket: default_bucket(),
            backend_config: BackendConfig::Modern {
                modern: ModernConfig::default(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BackendConfig {
    Legacy {
        #[serde(rename = "legacy")]
        legacy: LegacyConfig,
    },
    Modern {
        #[serde(rename = "modern")]
        modern: ModernConfig,
    },
}

impl BackendConfig {
    pub fn as_legacy(&self) -> Option<&LegacyConfig> {
        match self {
            BackendConfig::Legacy { legacy } => Some(legacy),
            _ => None,
        }
    }

    pub fn as_modern(&self) -> Option<&ModernConfig> {
        match self {
            BackendConfig::Modern { modern } => Some(modern),
            _ => None,
        }
    }
}

/// InfluxDB 1.x connection: username/password, database per connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LegacyConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_credential")]
    pub username: String,

    #[serde(default = "default_credential")]
    pub password: String,

    /// Use https and verify certificates
    #[serde(default)]
    pub ssl: bool,

    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: default_credential(),
            password: default_credential(),
            ssl: false,
            timeout_seconds: None,
        }
    }
}

impl LegacyConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// InfluxDB 2.x connection: token authentication, bucket addressed
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModernConfig {
    #[serde(default = "default_url")]
    pub url: String,

    /// Organization name; omitted from requests when empty
    #[serde(default)]
    pub org: String,

    #[serde(default)]
    pub token: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
}

impl Default for ModernConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            org: String::new(),
            token: String::new(),
            timeout_ms: default_timeout_ms(),
            verify_ssl: default_verify_ssl(),
        }
    }
}

impl ModernConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Latest-timestamp lookup settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LookupConfig {
    /// Measurement whose latest point marks the resume position
    #[serde(default = "default_measurement")]
    pub measurement: String,

    /// Days before now to resume from when nothing was synced yet
    #[serde(default = "default_days")]
    pub default_days: u32,

    /// Range of the 2.x query, in days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            measurement: default_measurement(),
            default_days: default_days(),
            lookback_days: default_lookback_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
pub(crate) fn default_bucket() -> String { "garmin".to_string() }
pub(crate) fn default_host() -> String { "localhost".to_string() }
pub(crate) fn default_port() -> u16 { 8086 }
pub(crate) fn default_credential() -> String { "root".to_string() }
pub(crate) fn default_url() -> String { "http://localhost:8086".to_string() }
pub(crate) fn default_timeout_ms() -> u64 { 10_000 }
pub(crate) fn default_verify_ssl() -> bool { true }
fn default_measurement() -> String { "HeartRateIntraday".to_string() }
fn default_days() -> u32 { 7 }
fn default_lookback_days() -> u32 { 90 }
fn default_log_level() -> String { "info".to_string() }
