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

// Time-series backend trait shared by the 1.x and 2.x adapters

use crate::point::Point;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Version-specific InfluxDB adapter
///
/// One implementation is selected at startup and used for the lifetime of
/// the process. Implementations report failures as errors; deciding what
/// is fatal belongs to the caller.
#[async_trait]
pub trait TimeSeriesBackend: Send + Sync {
    /// Open the connection and verify the server answers (ping / health)
    async fn initialize(&self) -> Result<()>;

    /// Submit a batch of points in a single request
    ///
    /// Returns the number of lines sent. Points without non-null fields
    /// are skipped; a batch that encodes to nothing sends no request.
    async fn write_points(&self, points: &[Point]) -> Result<usize>;

    /// Most recent timestamp recorded for `measurement`, if any
    async fn latest_timestamp(&self, measurement: &str) -> Result<Option<DateTime<Utc>>>;

    /// Get backend type identifier
    fn backend_type(&self) -> &str;
}
