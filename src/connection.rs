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

// Connection handle used by the ingestion pipeline
//
// Built once at startup by `initialize` and passed by reference to the
// write and lookup calls. Only `initialize` can fail; writes and lookups
// never stop the pipeline.

use crate::config::{InfluxConfig, LookupConfig};
use crate::error::InfluxError;
use crate::point::Point;
use crate::storage::{BackendFactory, TimeSeriesBackend};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a `write_points` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing to write, no request was made
    Empty,
    /// The batch was accepted; `count` lines were sent
    Written { count: usize },
    /// The write failed and was logged; the points are lost
    Failed { error: String },
}

impl WriteOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, WriteOutcome::Failed { .. })
    }
}

/// Handle to the selected InfluxDB backend
pub struct InfluxConnection {
    backend: Arc<dyn TimeSeriesBackend>,
    lookup: LookupConfig,
}

impl InfluxConnection {
    /// Select the backend from configuration, connect and verify it answers.
    ///
    /// Fails when the backend cannot be built or its ping / health check does
    /// not pass; the pipeline should not proceed in that case.
    pub async fn initialize(config: &InfluxConfig) -> Result<Self, InfluxError> {
        let backend = BackendFactory::create(&config.storage, &config.lookup)
            .map_err(|e| InfluxError::Config(format!("{:#}", e)))?;

        Self::connect(backend, config.lookup.clone()).await
    }

    /// Initialize over an already constructed backend
    pub async fn connect(
        backend: Arc<dyn TimeSeriesBackend>,
        lookup: LookupConfig,
    ) -> Result<Self, InfluxError> {
        if let Err(e) = backend.initialize().await {
            error!("Unable to connect with influxdb database! Aborted");
            return Err(InfluxError::connection(&e));
        }

        Ok(Self { backend, lookup })
    }

    pub fn backend_type(&self) -> &str {
        self.backend.backend_type()
    }

    pub fn lookup(&self) -> &LookupConfig {
        &self.lookup
    }

    /// Write points to the selected backend.
    ///
    /// Failures are logged and reported through the outcome, never raised.
    pub async fn write_points(&self, points: &[Point]) -> WriteOutcome {
        if points.is_empty() {
            return WriteOutcome::Empty;
        }

        match self.backend.write_points(points).await {
            Ok(count) => {
                info!(
                    "Successfully updated InfluxDB {} database with {} new points",
                    self.backend.backend_type(),
                    count
                );
                WriteOutcome::Written { count }
            }
            Err(e) => {
                error!("Unable to write to database! {:#}", e);
                WriteOutcome::Failed {
                    error: format!("{:#}", e),
                }
            }
        }
    }

    /// Latest timestamp of the configured lookup measurement, or
    /// `now - default_days` when nothing is found or the query fails
    pub async fn get_latest_timestamp_or_default(&self, default_days: u32) -> DateTime<Utc> {
        self.latest_timestamp_or_default_for(&self.lookup.measurement, default_days)
            .await
    }

    /// Same as `get_latest_timestamp_or_default` for any measurement
    pub async fn latest_timestamp_or_default_for(
        &self,
        measurement: &str,
        default_days: u32,
    ) -> DateTime<Utc> {
        match self.backend.latest_timestamp(measurement).await {
            Ok(Some(time)) => time,
            Ok(None) => {
                warn!(
                    "No previously synced data found for '{}', defaulting to initial fetching period of {} days",
                    measurement, default_days
                );
                default_start(default_days)
            }
            Err(e) => {
                error!("Error querying InfluxDB: {:#}", e);
                default_start(default_days)
            }
        }
    }
}

/// UTC instant `default_days` days before now
pub fn default_start(default_days: u32) -> DateTime<Utc> {
    Utc::now() - TimeDelta::days(i64::from(default_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory backend recording how often it was called
    #[derive(Default)]
    struct StubBackend {
        fail_init: bool,
        fail_calls: bool,
        latest: Option<DateTime<Utc>>,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl TimeSeriesBackend for StubBackend {
        async fn initialize(&self) -> Result<()> {
            if self.fail_init {
                bail!("ping refused");
            }
            Ok(())
        }

        async fn write_points(&self, points: &[Point]) -> Result<usize> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_calls {
                bail!("write rejected");
            }
            Ok(points.len())
        }

        async fn latest_timestamp(&self, _measurement: &str) -> Result<Option<DateTime<Utc>>> {
            if self.fail_calls {
                bail!("query rejected");
            }
            Ok(self.latest)
        }

        fn backend_type(&self) -> &str {
            "stub"
        }
    }

    async fn connect(stub: StubBackend) -> (Arc<StubBackend>, InfluxConnection) {
        let stub = Arc::new(stub);
        let conn = InfluxConnection::connect(stub.clone(), LookupConfig::default())
            .await
            .unwrap();
        (stub, conn)
    }

    fn sample_point() -> Point {
        Point::new("HeartRateIntraday", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .tag("device", "x")
            .field("bpm", 72i64)
    }

    #[tokio::test]
    async fn test_failed_initialize_is_fatal() {
        let stub = Arc::new(StubBackend {
            fail_init: true,
            ..Default::default()
        });
        let result = InfluxConnection::connect(stub, LookupConfig::default()).await;

        match result {
            Err(InfluxError::Connection(msg)) => assert!(msg.contains("ping refused")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected connection error"),
        }
    }

    #[tokio::test]
    async fn test_empty_write_makes_no_backend_call() {
        let (stub, conn) = connect(StubBackend::default()).await;

        assert_eq!(conn.write_points(&[]).await, WriteOutcome::Empty);
        assert_eq!(stub.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_success() {
        let (stub, conn) = connect(StubBackend::default()).await;

        let outcome = conn.write_points(&[sample_point(), sample_point()]).await;
        assert_eq!(outcome, WriteOutcome::Written { count: 2 });
        assert_eq!(stub.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let (_stub, conn) = connect(StubBackend {
            fail_calls: true,
            ..Default::default()
        })
        .await;

        let outcome = conn.write_points(&[sample_point()]).await;
        assert!(outcome.is_failed());
        assert_eq!(
            outcome,
            WriteOutcome::Failed {
                error: "write rejected".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_latest_timestamp_found() {
        let t = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        let (_stub, conn) = connect(StubBackend {
            latest: Some(t),
            ..Default::default()
        })
        .await;

        assert_eq!(conn.get_latest_timestamp_or_default(7).await, t);
    }

    #[tokio::test]
    async fn test_latest_timestamp_defaults_when_empty() {
        let (_stub, conn) = connect(StubBackend::default()).await;

        let before = Utc::now() - TimeDelta::days(7);
        let result = conn.get_latest_timestamp_or_default(7).await;
        let after = Utc::now() - TimeDelta::days(7);

        assert!(result >= before && result <= after);
    }

    #[tokio::test]
    async fn test_latest_timestamp_defaults_on_error() {
        let (_stub, conn) = connect(StubBackend {
            fail_calls: true,
            ..Default::default()
        })
        .await;

        let before = Utc::now() - TimeDelta::days(30);
        let result = conn.latest_timestamp_or_default_for("Steps", 30).await;
        let after = Utc::now() - TimeDelta::days(30);

        assert!(result >= before && result <= after);
    }

    #[tokio::test]
    async fn test_lookup_settings_kept_from_connect() {
        let lookup = LookupConfig {
            measurement: "Steps".to_string(),
            default_days: 14,
            ..Default::default()
        };
        let conn = InfluxConnection::connect(Arc::new(StubBackend::default()), lookup)
            .await
            .unwrap();

        assert_eq!(conn.lookup().measurement, "Steps");
        assert_eq!(conn.lookup().default_days, 14);
        assert_eq!(conn.backend_type(), "stub");
    }

    #[test]
    fn test_default_start_zero_days_is_now() {
        let before = Utc::now();
        let start = default_start(0);
        assert!(start >= before && start <= Utc::now());
    }
}
