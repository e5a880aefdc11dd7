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

// InfluxDB 1.x backend implementation

use super::backend::TimeSeriesBackend;
use crate::config::LegacyConfig;
use crate::point::{encode_batch, Point};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// InfluxDB 1.x client: basic auth, database selected per connection
pub struct LegacyBackend {
    client: Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
}

impl LegacyBackend {
    pub fn new(config: LegacyConfig, database: String) -> Result<Self> {
        let mut client_builder = reqwest::ClientBuilder::new();

        if let Some(timeout) = config.timeout_seconds {
            client_builder = client_builder.timeout(Duration::from_secs(timeout));
        }

        let client = client_builder
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            database,
            username: config.username,
            password: config.password,
        })
    }

    /// Run an InfluxQL statement against the selected database
    async fn query(&self, statement: &str) -> Result<QueryResponse> {
        let url = format!("{}/query", self.base_url);
        debug!("InfluxQL query on '{}': {}", self.database, statement);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("db", self.database.as_str()), ("q", statement)])
            .send()
            .await
            .context("Failed to send query request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            bail!("InfluxDB query failed with status {}: {}", status, error_text);
        }

        response
            .json::<QueryResponse>()
            .await
            .context("Failed to decode query response")
    }
}

#[async_trait]
impl TimeSeriesBackend for LegacyBackend {
    async fn initialize(&self) -> Result<()> {
        let url = format!("{}/ping", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to ping {}", self.base_url))?;

        if !response.status().is_success() {
            bail!("Ping to {} failed with status {}", self.base_url, response.status());
        }

        let version = response
            .headers()
            .get("X-Influxdb-Version")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        info!(
            "Connected to InfluxDB v1 at {} (server {}, database '{}')",
            self.base_url, version, self.database
        );
        Ok(())
    }

    async fn write_points(&self, points: &[Point]) -> Result<usize> {
        let lines = encode_batch(points)?;
        if lines.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/write", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .query(&[("db", self.database.as_str()), ("precision", "n")])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(lines.join("\n"))
            .send()
            .await
            .context("Failed to send write request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("InfluxDB write failed with status {}: {}", status, error_text);
        }

        Ok(lines.len())
    }

    async fn latest_timestamp(&self, measurement: &str) -> Result<Option<DateTime<Utc>>> {
        let statement = latest_statement(measurement);
        let response = self.query(&statement).await?;
        response.latest_time()
    }

    fn backend_type(&self) -> &str {
        "legacy"
    }
}

/// InfluxQL selecting the newest point of a measurement
pub fn latest_statement(measurement: &str) -> String {
    let escaped = measurement.replace('\\', "\\\\").replace('"', "\\\"");
    format!("SELECT * FROM \"{}\" ORDER BY time DESC LIMIT 1", escaped)
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl QueryResponse {
    /// `time` of the first row of the first series, as UTC
    fn latest_time(&self) -> Result<Option<DateTime<Utc>>> {
        if let Some(error) = &self.error {
            bail!("InfluxDB query error: {}", error);
        }

        let Some(result) = self.results.first() else {
            return Ok(None);
        };
        if let Some(error) = &result.error {
            bail!("InfluxDB statement error: {}", error);
        }

        let Some(series) = result.series.first() else {
            return Ok(None);
        };
        let Some(row) = series.values.first() else {
            return Ok(None);
        };

        let time_idx = series
            .columns
            .iter()
            .position(|c| c == "time")
            .ok_or_else(|| anyhow!("Query result has no 'time' column"))?;

        let raw = row
            .get(time_idx)
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Query result 'time' value is not a string"))?;

        let time = DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid timestamp in query result: '{}'", raw))?;

        Ok(Some(time.with_timezone(&Utc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(json: &str) -> QueryResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_latest_statement() {
        assert_eq!(
            latest_statement("HeartRateIntraday"),
            "SELECT * FROM \"HeartRateIntraday\" ORDER BY time DESC LIMIT 1"
        );
        assert_eq!(
            latest_statement("odd\"name"),
            "SELECT * FROM \"odd\\\"name\" ORDER BY time DESC LIMIT 1"
        );
    }

    #[test]
    fn test_latest_time_from_row() {
        let response = parse(
            r#"{"results":[{"statement_id":0,"series":[{"name":"HeartRateIntraday",
                "columns":["time","Device","HeartRate"],
                "values":[["2024-03-05T10:15:00Z","x",72]]}]}]}"#,
        );

        assert_eq!(
            response.latest_time().unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_latest_time_fractional_seconds() {
        let response = parse(
            r#"{"results":[{"series":[{"columns":["bpm","time"],
                "values":[[72,"2024-03-05T10:15:00.5Z"]]}]}]}"#,
        );

        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 0).unwrap()
            + chrono::TimeDelta::milliseconds(500);
        assert_eq!(response.latest_time().unwrap(), Some(expected));
    }

    #[test]
    fn test_latest_time_empty_results() {
        assert_eq!(parse(r#"{"results":[{"statement_id":0}]}"#).latest_time().unwrap(), None);
        assert_eq!(parse(r#"{"results":[]}"#).latest_time().unwrap(), None);
    }

    #[test]
    fn test_latest_time_statement_error() {
        let response = parse(r#"{"results":[{"statement_id":0,"error":"database not found: garmin"}]}"#);
        let err = response.latest_time().unwrap_err();
        assert!(err.to_string().contains("database not found"));
    }

    #[test]
    fn test_latest_time_bad_timestamp() {
        let response = parse(r#"{"results":[{"series":[{"columns":["time"],"values":[[1700000000]]}]}]}"#);
        assert!(response.latest_time().is_err());
    }

    #[test]
    fn test_backend_creation() {
        let backend = LegacyBackend::new(LegacyConfig::default(), "garmin".to_string()).unwrap();
        assert_eq!(backend.backend_type(), "legacy");
        assert_eq!(backend.base_url, "http://localhost:8086");
    }
}
