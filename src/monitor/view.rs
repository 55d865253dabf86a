//! Dashboard view model: one card per catalog test, derived from monitor
//! state. Pure functions only; rendering lives in the CLI.

use serde::Serialize;

use super::RunMonitor;
use crate::catalog;
use crate::runner::{HistoryRun, RunnerApi, RunnerStatus};

/// Everything needed to draw one test card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Runner phase if this is the active test, otherwise idle.
    pub phase: RunnerStatus,
    /// The start control is disabled because another test is active.
    pub disabled: bool,
    pub selected: bool,
    /// `Warming 3s` / `12s / 30s`; `None` while idle (the Run control shows).
    pub timer: Option<String>,
    /// Running past the configured duration (display only, no grace).
    pub overdue: bool,
    pub throughput: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

impl CardView {
    pub fn throughput_label(&self) -> String {
        self.throughput
            .map(format_number)
            .unwrap_or_else(|| "—".to_string())
    }

    pub fn p50_label(&self) -> String {
        self.p50_ms.map(format_ms).unwrap_or_else(|| "—".to_string())
    }

    pub fn p99_label(&self) -> String {
        self.p99_ms.map(format_ms).unwrap_or_else(|| "—".to_string())
    }
}

/// Build cards for every catalog test.
pub fn cards<A: RunnerApi>(monitor: &RunMonitor<A>) -> Vec<CardView> {
    let phase = monitor.phase();
    let busy = phase.is_busy();
    let active = phase.test();

    catalog::all()
        .iter()
        .map(|test| {
            let is_active = busy && active == Some(test.id);
            let card_phase = if is_active {
                phase.status()
            } else {
                RunnerStatus::Idle
            };

            let elapsed = phase.elapsed_secs();
            let configured = phase.configured_duration();
            let overdue = card_phase == RunnerStatus::Running
                && configured > 0.0
                && elapsed > configured;

            let timer = match card_phase {
                RunnerStatus::Warming => Some(format!("Warming {:.0}s", phase.warmup_secs())),
                RunnerStatus::Running => Some(format!("{elapsed:.0}s / {configured}s")),
                RunnerStatus::Idle => None,
            };

            let latest = monitor.latest_results().get(test.id);
            let metrics = latest.and_then(|l| l.metrics());

            CardView {
                id: test.id.to_string(),
                name: test.name.to_string(),
                description: monitor.config_for(test.id).description(),
                phase: card_phase,
                disabled: busy && !is_active,
                selected: monitor.selected() == Some(test.id),
                timer,
                overdue,
                throughput: latest.and_then(|l| l.display_throughput()),
                p50_ms: metrics.map(|m| m.p50.unwrap_or(0.0)),
                p99_ms: metrics.map(|m| m.p99.unwrap_or(0.0)),
            }
        })
        .collect()
}

/// Toolbar badge, e.g. `Running: REST Reads`, when a test is active.
pub fn badge<A: RunnerApi>(monitor: &RunMonitor<A>) -> Option<String> {
    let phase = monitor.phase();
    let test = phase.test().filter(|_| phase.is_busy())?;
    let label = match phase.status() {
        RunnerStatus::Warming => "Warming",
        _ => "Running",
    };
    Some(format!("{label}: {}", catalog::display_name(test)))
}

/// Footer line, e.g. `5 tests with results`.
pub fn footer<A: RunnerApi>(monitor: &RunMonitor<A>) -> String {
    format!("{} tests with results", monitor.latest_results().len())
}

// ---------------------------------------------------------------------------
// History rows
// ---------------------------------------------------------------------------

/// One formatted row of the history table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub id: String,
    pub timestamp: String,
    pub throughput: String,
    pub extrapolated: String,
    pub duration: String,
    pub summary: String,
}

impl From<&HistoryRun> for HistoryRow {
    fn from(run: &HistoryRun) -> Self {
        Self {
            id: run.id.clone(),
            timestamp: format_timestamp(run.timestamp.as_deref().unwrap_or("")),
            throughput: format!("{} /s", format_number(run.throughput())),
            extrapolated: run
                .extrapolated()
                .map(|v| format!("{} /s", format_number(v)))
                .unwrap_or_else(|| "-".to_string()),
            duration: run
                .duration_secs
                .map(|d| format!("{d:.1}s"))
                .unwrap_or_else(|| "-".to_string()),
            summary: run
                .summary
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Compact request-rate formatting: `1.2M`, `45k`, `1.5k`, `950`.
pub fn format_number(n: f64) -> String {
    if n >= 1_000_000.0 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if n >= 10_000.0 {
        format!("{:.0}k", n / 1000.0)
    } else if n >= 1000.0 {
        format!("{:.1}k", n / 1000.0)
    } else {
        format!("{n:.0}")
    }
}

/// Latency formatting; zero means "no measurement".
pub fn format_ms(n: f64) -> String {
    if n == 0.0 {
        "-".to_string()
    } else {
        format!("{n:.2}ms")
    }
}

/// Render an RFC 3339 timestamp in local time; unparseable input is
/// returned as-is.
pub fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}
