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

// InfluxDB compatibility layer for ingestion pipelines
//
// Lets a pipeline write points and find its resume position without
// knowing which InfluxDB generation is deployed:
// - Selects the 1.x or 2.x adapter once, from configuration
// - Translates version-agnostic points to Line Protocol
// - Looks up the latest timestamp of a measurement, falling back to
//   a bounded recent window when nothing was synced yet
// - Never lets a write or lookup failure stop the pipeline

pub mod config;
pub mod connection;
pub mod error;
pub mod point;
pub mod storage;

// Re-export main types
pub use config::{load_config, load_config_from_env, load_config_with_env, InfluxConfig};
pub use connection::{default_start, InfluxConnection, WriteOutcome};
pub use error::InfluxError;
pub use point::{FieldValue, Point};
pub use storage::{BackendFactory, TimeSeriesBackend};
