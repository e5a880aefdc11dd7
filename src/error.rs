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

// Errors surfaced to the pipeline
//
// Only startup is fatal. Write and lookup failures are absorbed by
// InfluxConnection and never reach the caller as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfluxError {
    /// Connection could not be established or the health check did not pass
    #[error("InfluxDB connection failed: {0}")]
    Connection(String),

    /// Configuration is invalid for the selected backend
    #[error("Invalid InfluxDB configuration: {0}")]
    Config(String),
}

impl InfluxError {
    /// Build a connection error keeping the whole anyhow context chain
    pub fn connection(err: &anyhow::Error) -> Self {
        InfluxError::Connection(format!("{:#}", err))
    }
}
