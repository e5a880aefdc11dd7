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

// Backend factory for creating the version-specific adapter from configuration

use super::backend::TimeSeriesBackend;
use super::legacy::LegacyBackend;
use super::modern::ModernBackend;
use crate::config::{LookupConfig, StorageConfig};
use anyhow::{bail, Result};
use std::sync::Arc;

pub struct BackendFactory;

impl BackendFactory {
    /// Create storage backend from configuration
    pub fn create(
        config: &StorageConfig,
        lookup: &LookupConfig,
    ) -> Result<Arc<dyn TimeSeriesBackend>> {
        match config.backend.as_str() {
            "legacy" => {
                let backend_config = config
                    .backend_config
                    .as_legacy()
                    .ok_or_else(|| anyhow::anyhow!("Legacy config missing"))?;

                let backend = LegacyBackend::new(backend_config.clone(), config.bucket.clone())?;
                Ok(Arc::new(backend))
            }

            "modern" => {
                let backend_config = config
                    .backend_config
                    .as_modern()
                    .ok_or_else(|| anyhow::anyhow!("Modern config missing"))?;

                let backend = ModernBackend::new(
                    backend_config.clone(),
                    config.bucket.clone(),
                    lookup.lookback_days,
                )?;
                Ok(Arc::new(backend))
            }

            unknown => bail!(
                "Unknown storage backend: '{}'. Supported: legacy, modern",
                unknown
            ),
        }
    }
}
