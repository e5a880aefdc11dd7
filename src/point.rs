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

// Version-agnostic point model and line protocol encoding
//
// Line Protocol format (accepted by both the 1.x and 2.x write endpoints):
//   measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp_ns

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scalar value stored in a point field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl FieldValue {
    /// Format this value for Line Protocol.
    ///
    /// - Float: written as-is (`72.5`)
    /// - Integer: suffixed with `i` (`72i`)
    /// - String: double-quoted, inner quotes and backslashes escaped
    /// - Boolean: `true` or `false`
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
            FieldValue::Boolean(v) => v.to_string(),
        }
    }

    /// NaN and infinite floats have no Line Protocol form
    pub fn is_writable(&self) -> bool {
        match self {
            FieldValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line_protocol())
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

/// One time-series sample: measurement, tags, fields and timestamp.
///
/// Field values of `None` are never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Option<FieldValue>>,
    pub time: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            time,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), Some(value.into()));
        self
    }

    /// Record a field with no value; it is skipped on write
    pub fn null_field(mut self, key: impl Into<String>) -> Self {
        self.fields.insert(key.into(), None);
        self
    }

    /// Encode this point as a single Line Protocol line.
    ///
    /// Null fields and non-finite floats are skipped. Returns `Ok(None)` when
    /// nothing is left, since neither server version accepts a line without
    /// fields.
    pub fn to_line_protocol(&self) -> Result<Option<String>> {
        let fields: Vec<_> = self
            .fields
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
            .filter(|(_, v)| v.is_writable())
            .collect();

        if fields.is_empty() {
            return Ok(None);
        }

        let timestamp_ns = self.time.timestamp_nanos_opt().ok_or_else(|| {
            anyhow!(
                "timestamp {} of measurement '{}' is out of nanosecond range",
                self.time,
                self.measurement
            )
        })?;

        let mut line = escape_measurement(&self.measurement);

        // BTreeMap keeps tags in key order, the canonical form
        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_line_protocol());
        }

        line.push(' ');
        line.push_str(&timestamp_ns.to_string());

        Ok(Some(line))
    }
}

/// Encode a batch, skipping points without fields.
pub fn encode_batch(points: &[Point]) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(points.len());
    for point in points {
        match point.to_line_protocol()? {
            Some(line) => lines.push(line),
            None => tracing::debug!(
                "Skipping point of measurement '{}' without non-null fields",
                point.measurement
            ),
        }
    }
    Ok(lines)
}

/// Measurement names escape commas, spaces and line-breaking whitespace.
fn escape_measurement(s: &str) -> String {
    escape_control(s).replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys escape commas, equals signs, spaces
/// and line-breaking whitespace.
fn escape_key(s: &str) -> String {
    escape_control(s)
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// A raw newline would end the line early; keep every point on one line.
fn escape_control(s: &str) -> String {
    s.replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}
