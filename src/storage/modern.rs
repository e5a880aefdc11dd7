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

// InfluxDB 2.x backend implementation

use super::backend::TimeSeriesBackend;
use crate::config::ModernConfig;
use crate::point::{encode_batch, Point};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use csv::StringRecord;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

/// InfluxDB 2.x client: token auth, bucket addressed, synchronous writes
pub struct ModernBackend {
    client: Client,
    base_url: String,
    org: String,
    bucket: String,
    lookback_days: u32,
}

impl ModernBackend {
    pub fn new(config: ModernConfig, bucket: String, lookback_days: u32) -> Result<Self> {
        let mut client_builder = reqwest::ClientBuilder::new()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_ssl);

        if !config.token.is_empty() {
            let mut headers = reqwest::header::HeaderMap::new();
            let auth_value = format!("Token {}", config.token);
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&auth_value).context("Invalid API token")?,
            );
            client_builder = client_builder.default_headers(headers);
        }

        let client = client_builder
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            org: config.org,
            bucket,
            lookback_days,
        })
    }

    /// Query parameters shared by write and query endpoints
    fn org_param(&self) -> Vec<(&str, &str)> {
        if self.org.is_empty() {
            Vec::new()
        } else {
            vec![("org", self.org.as_str())]
        }
    }

    async fn health(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;

        // An unhealthy server still answers with a JSON status body
        let status = response.status();
        response
            .json::<HealthResponse>()
            .await
            .with_context(|| format!("Unreadable health response (HTTP {})", status))
    }
}

#[async_trait]
impl TimeSeriesBackend for ModernBackend {
    async fn initialize(&self) -> Result<()> {
        let health = self.health().await?;

        if health.status != "pass" {
            bail!(
                "InfluxDB health check failed: {}",
                health.message.unwrap_or_else(|| health.status.clone())
            );
        }

        info!(
            "Connected to InfluxDB v{} at {} (bucket '{}')",
            health.version.as_deref().unwrap_or("unknown"),
            self.base_url,
            self.bucket
        );
        Ok(())
    }

    async fn write_points(&self, points: &[Point]) -> Result<usize> {
        let lines = encode_batch(points)?;
        if lines.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/api/v2/write", self.base_url);
        let mut params = self.org_param();
        params.push(("bucket", self.bucket.as_str()));
        params.push(("precision", "ns"));

        let response = self
            .client
            .post(&url)
            .query(&params)
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
        let flux = latest_flux(&self.bucket, measurement, self.lookback_days);
        debug!("Flux query: {}", flux);

        let body = serde_json::json!({
            "query": flux,
            "type": "flux",
            "dialect": {
                "header": true,
                "annotations": [],
                "delimiter": ",",
                "dateTimeFormat": "RFC3339Nano",
            },
        });

        let url = format!("{}/api/v2/query", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&self.org_param())
            .header("Accept", "application/csv")
            .json(&body)
            .send()
            .await
            .context("Failed to send query request")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read query response")?;

        if !status.is_success() {
            bail!("InfluxDB query failed with status {}: {}", status, text);
        }

        latest_time_from_csv(&text)
    }

    fn backend_type(&self) -> &str {
        "modern"
    }
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Flux selecting the newest record of a measurement within the lookback range
pub fn latest_flux(bucket: &str, measurement: &str, lookback_days: u32) -> String {
    format!(
        "from(bucket: \"{}\")\n  \
         |> range(start: -{}d)\n  \
         |> filter(fn: (r) => r[\"_measurement\"] == \"{}\")\n  \
         |> sort(columns: [\"_time\"], desc: true)\n  \
         |> limit(n: 1)",
        flux_string(bucket),
        lookback_days,
        flux_string(measurement)
    )
}

/// Escape a value for a Flux string literal
fn flux_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "\\${")
}

/// Latest `_time` across all tables of a CSV query response.
///
/// Each table of the response (one per series) starts with its own header
/// row. Quoted values may span lines. An `error` column signals a query
/// error reported mid-stream.
pub fn latest_time_from_csv(body: &str) -> Result<Option<DateTime<Utc>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut header: Option<StringRecord> = None;
    let mut latest: Option<DateTime<Utc>> = None;

    for record in reader.records() {
        let record = record.context("Malformed CSV in query response")?;

        if header.is_none() || is_table_header(&record) {
            header = Some(record);
            continue;
        }
        let Some(columns) = header.as_ref() else {
            continue;
        };

        if let Some(idx) = column(columns, "error") {
            bail!("Flux query error: {}", record.get(idx).unwrap_or_default());
        }

        let Some(idx) = column(columns, "_time") else {
            continue;
        };
        let raw = record.get(idx).unwrap_or_default();
        if raw.is_empty() {
            continue;
        }

        let time = DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid _time in query result: '{}'", raw))?
            .with_timezone(&Utc);

        if latest.map_or(true, |current| time > current) {
            latest = Some(time);
        }
    }

    Ok(latest)
}

/// Header rows name the `result` and `table` columns; data rows carry
/// `_result` and a table number there
fn is_table_header(record: &StringRecord) -> bool {
    record.iter().any(|c| c == "result") && record.iter().any(|c| c == "table")
}

fn column(header: &StringRecord, name: &str) -> Option<usize> {
    header.iter().position(|c| c == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_latest_flux() {
        let flux = latest_flux("garmin", "HeartRateIntraday", 90);
        assert!(flux.starts_with("from(bucket: \"garmin\")"));
        assert!(flux.contains("|> range(start: -90d)"));
        assert!(flux.contains("r[\"_measurement\"] == \"HeartRateIntraday\""));
        assert!(flux.contains("|> sort(columns: [\"_time\"], desc: true)"));
        assert!(flux.ends_with("|> limit(n: 1)"));
    }

    #[test]
    fn test_flux_string_escaping() {
        assert_eq!(flux_string(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(flux_string("${x}"), "\\${x}");
    }

    #[test]
    fn test_latest_time_quoted_value_spanning_lines() {
        let csv = ",result,table,_time,_value,_field\r\n\
                   ,_result,0,2024-01-02T00:00:00Z,\"note\n,,,see log,x\",comment\r\n";

        assert_eq!(
            latest_time_from_csv(csv).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_latest_time_quoted_commas_and_quotes() {
        let csv = ",result,table,_time,_value\n\
                   ,_result,0,2024-01-03T00:00:00Z,\"a,b \"\"c\"\"\"\n";

        assert_eq!(
            latest_time_from_csv(csv).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_latest_time_single_table() {
        let csv = ",result,table,_start,_stop,_time,_value,_field,_measurement,device\r\n\
                   ,_result,0,2023-10-03T00:00:00Z,2024-01-01T00:00:00Z,2023-12-31T23:59:00Z,72,bpm,HeartRateIntraday,x\r\n\
                   \r\n";

        assert_eq!(
            latest_time_from_csv(csv).unwrap(),
            Some(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 0).unwrap())
        );
    }

    #[test]
    fn test_latest_time_across_tables() {
        let csv = ",result,table,_time,_value,_field\n\
                   ,_result,0,2024-01-01T00:00:00Z,72,bpm\n\
                   \n\
                   ,result,table,_time,_value,_field,device\n\
                   ,_result,1,2024-01-02T00:00:00Z,71,bpm,y\n";

        assert_eq!(
            latest_time_from_csv(csv).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_latest_time_empty_response() {
        assert_eq!(latest_time_from_csv("").unwrap(), None);
        assert_eq!(latest_time_from_csv("\r\n").unwrap(), None);
        assert_eq!(
            latest_time_from_csv(",result,table,_time,_value\r\n").unwrap(),
            None
        );
    }

    #[test]
    fn test_latest_time_annotations_skipped() {
        let csv = "#datatype,string,long,dateTime:RFC3339\n\
                   #group,false,false,false\n\
                   #default,_result,,\n\
                   ,result,table,_time\n\
                   ,,0,2024-01-01T00:00:00.123456789Z\n";

        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::TimeDelta::nanoseconds(123_456_789);
        assert_eq!(latest_time_from_csv(csv).unwrap(), Some(expected));
    }

    #[test]
    fn test_latest_time_error_row() {
        let csv = "error,reference\nbucket \"garmin\" not found,\n";
        let err = latest_time_from_csv(csv).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_backend_creation() {
        let config = ModernConfig {
            url: "http://localhost:8086/".to_string(),
            token: "secret".to_string(),
            ..ModernConfig::default()
        };
        let backend = ModernBackend::new(config, "garmin".to_string(), 90).unwrap();
        assert_eq!(backend.backend_type(), "modern");
        assert_eq!(backend.base_url, "http://localhost:8086");
        assert!(backend.org_param().is_empty());
    }

    #[test]
    fn test_invalid_token_rejected() {
        let config = ModernConfig {
            token: "bad\ntoken".to_string(),
            ..ModernConfig::default()
        };
        assert!(ModernBackend::new(config, "garmin".to_string(), 90).is_err());
    }
}
