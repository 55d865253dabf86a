/// Wire types for the runner service JSON API.
///
/// The service is an external collaborator and its payloads are loose: most
/// fields may be absent or `null`, numbers arrive as JSON floats, and a few
/// numeric values (extrapolated throughput) are sent as strings. Every type
/// here deserializes with defaults so a partially-populated payload is still
/// usable.
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::catalog::{self, ConfigMap, TestConfig};

// ---------------------------------------------------------------------------
// Runner state
// ---------------------------------------------------------------------------

/// Status reported by the remote job runner.
///
/// Unrecognized status strings are read as `Idle`, so an unexpected server
/// value never leaves the monitor stuck in a busy phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum RunnerStatus {
    #[default]
    Idle,
    Warming,
    Running,
}

impl RunnerStatus {
    /// Whether a job occupies the runner.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Warming | Self::Running)
    }
}

impl From<String> for RunnerStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "warming" => Self::Warming,
            "running" => Self::Running,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Warming => write!(f, "warming"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Body of `GET /runner`.
///
/// Only `status` drives the monitor, so every field is read leniently: an
/// off-type value becomes `None` instead of failing the whole payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerPayload {
    #[serde(deserialize_with = "lenient_status")]
    pub status: RunnerStatus,
    #[serde(deserialize_with = "lenient_text")]
    pub test_name: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub started_at: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub warmup_secs: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub elapsed_secs: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub configured_duration: Option<f64>,
    pub last_result: Option<Value>,
    #[serde(deserialize_with = "lenient_text")]
    pub last_error: Option<String>,
    #[serde(deserialize_with = "lenient_configs")]
    pub configs: Option<Vec<ConfigEntry>>,
}

/// One persisted per-test override inside the runner payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigEntry {
    pub id: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub vus: Option<f64>,
}

impl ConfigEntry {
    /// Whole-number config; missing values fall back to the catalog default.
    fn to_config(&self) -> TestConfig {
        let default = catalog::resolve_config(&ConfigMap::new(), &self.id);
        TestConfig {
            duration: self.duration.map_or(default.duration, round_count),
            vus: self.vus.map_or(default.vus, round_count),
        }
    }
}

fn round_count(n: f64) -> u32 {
    // `as` saturates: negatives and NaN become 0.
    n.round() as u32
}

impl RunnerPayload {
    /// Split the payload into the runner snapshot and the config overrides
    /// (if the server sent any).
    pub fn into_parts(self) -> (RunnerSnapshot, Option<ConfigMap>) {
        let configs = self.configs.map(|entries| {
            entries
                .iter()
                .filter(|c| !c.id.is_empty())
                .map(|c| (c.id.clone(), c.to_config()))
                .collect()
        });

        let snapshot = RunnerSnapshot {
            status: self.status,
            test: self.test_name.filter(|t| !t.is_empty()),
            started_at: self.started_at,
            warmup_secs: self.warmup_secs.unwrap_or(0.0),
            elapsed_secs: self.elapsed_secs.unwrap_or(0.0),
            configured_duration: self.configured_duration.unwrap_or(0.0),
            last_result: self.last_result,
            last_error: self.last_error.filter(|e| !e.is_empty()),
        };

        (snapshot, configs)
    }
}

/// Read-only copy of the runner state as last reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunnerSnapshot {
    pub status: RunnerStatus,
    /// Test id the runner is (or was last) executing.
    pub test: Option<String>,
    /// Server-side start time, seconds since the Unix epoch.
    pub started_at: Option<f64>,
    pub warmup_secs: f64,
    pub elapsed_secs: f64,
    pub configured_duration: f64,
    pub last_result: Option<Value>,
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Lenient field readers
// ---------------------------------------------------------------------------

fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> Result<RunnerStatus, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => RunnerStatus::from(s),
        _ => RunnerStatus::Idle,
    })
}

/// Numbers, or numeric strings; anything else is `None`.
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Strings as-is, `{"message": ..}` objects by their message, other values
/// as compact JSON. Null and empty strings are `None`.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let text = match Value::deserialize(d)? {
        Value::Null => return Ok(None),
        Value::String(s) => s,
        Value::Object(map) => match map.get("message") {
            Some(Value::String(m)) => m.clone(),
            _ => Value::Object(map).to_string(),
        },
        other => other.to_string(),
    };
    Ok(Some(text).filter(|t| !t.is_empty()))
}

/// An array of config entries; malformed entries are dropped and a
/// non-array value counts as absent.
fn lenient_configs<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<Vec<ConfigEntry>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
        ),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// Body of `POST /runner`.
#[derive(Debug, Serialize)]
pub struct StartRequest<'a> {
    pub test: &'a str,
}

/// Body of `POST /TestConfig`.
#[derive(Debug, Serialize)]
pub struct SaveConfigRequest<'a> {
    pub id: &'a str,
    pub duration: u32,
    pub vus: u32,
}

/// How the runner answered a start request that reached it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Accepted,
    /// Non-2xx response with the raw text body.
    Rejected { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// Latest results
// ---------------------------------------------------------------------------

/// Body of `GET /bestresults`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BestResultsPayload {
    pub tests: Vec<LatestResult>,
}

/// Most recent completed-run summary for one test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatestResult {
    /// Test id this result belongs to.
    pub name: String,
    pub throughput: f64,
    pub run: Value,
    pub results: Option<ResultMetrics>,
}

/// Metrics block of a [`LatestResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultMetrics {
    pub throughput: Option<f64>,
    pub p50: Option<f64>,
    pub p99: Option<f64>,
    pub total: Option<f64>,
    pub errors: Option<f64>,
    pub extrapolated_throughput: Option<String>,
    pub summary: Option<String>,
}

impl LatestResult {
    /// Metrics, if the result carries a non-zero throughput.
    pub fn metrics(&self) -> Option<&ResultMetrics> {
        self.results
            .as_ref()
            .filter(|m| m.throughput.is_some_and(|t| t != 0.0))
    }

    /// Throughput to display: extrapolated when the server provided one,
    /// otherwise the measured throughput.
    pub fn display_throughput(&self) -> Option<f64> {
        let metrics = self.metrics()?;
        metrics
            .extrapolated_throughput
            .as_deref()
            .and_then(parse_leading_float)
            .or(metrics.throughput)
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Body of `GET /TestRun`: either a bare array or wrapped in `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HistoryPayload {
    List(Vec<HistoryRun>),
    Wrapped {
        #[serde(default)]
        data: Vec<HistoryRun>,
    },
}

impl HistoryPayload {
    /// Unwrap into runs sorted newest-first.
    pub fn into_sorted(self) -> Vec<HistoryRun> {
        let mut runs = match self {
            Self::List(runs) => runs,
            Self::Wrapped { data } => data,
        };
        sort_newest_first(&mut runs);
        runs
    }
}

/// An immutable record of a past run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryRun {
    pub id: String,
    pub test_name: String,
    pub timestamp: Option<String>,
    pub duration_secs: Option<f64>,
    /// Raw result blob as JSON text.
    pub results: Option<String>,
    pub summary: Option<String>,
    pub extrapolated_throughput: Option<String>,
}

impl HistoryRun {
    /// Throughput from the raw result blob; `0.0` when it is missing or not
    /// valid JSON.
    pub fn throughput(&self) -> f64 {
        let raw = self.results.as_deref().unwrap_or("{}");
        serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|v| v.get("throughput").and_then(|t| t.as_f64()))
            .unwrap_or(0.0)
    }

    /// Extrapolated throughput, if the run recorded one.
    pub fn extrapolated(&self) -> Option<f64> {
        self.extrapolated_throughput
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(parse_leading_float)
    }
}

/// Sort runs descending by timestamp. Timestamps are ISO-8601 strings, so
/// lexical order is chronological; runs without one sort last.
pub fn sort_newest_first(runs: &mut [HistoryRun]) {
    runs.sort_by(|a, b| {
        let a = a.timestamp.as_deref().unwrap_or("");
        let b = b.timestamp.as_deref().unwrap_or("");
        b.cmp(a)
    });
}

/// Parse the leading decimal number of a string (`"12345.6 req/s"` → 12345.6).
fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0)))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}
