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

// Storage backend module
//
// Provides a trait-based abstraction over the two InfluxDB generations:
// - legacy: 1.x HTTP API (InfluxQL, username/password, database)
// - modern: 2.x HTTP API (Flux, token, organization/bucket)
//
// Both write Line Protocol; only the addressing, authentication and
// query language differ.

pub mod backend;
pub mod factory;
pub mod legacy;
pub mod modern;

pub use backend::TimeSeriesBackend;
pub use factory::BackendFactory;
pub use legacy::LegacyBackend;
pub use modern::ModernBackend;
