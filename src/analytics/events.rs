//! Monitor event log: one JSON line per notable run-monitor event.
//!
//! Records start requests, rejections, finished runs and stale-state
//! overrides so `benchctl events` can summarize activity per test.
//!
//! Log file: `~/.benchctl/events.jsonl` (configurable via `[logging] path`).

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::schema::LoggingConfig;

// ---------------------------------------------------------------------------
// Event entry
// ---------------------------------------------------------------------------

/// Kind of monitor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StartRequested,
    StartRejected,
    StartBlocked,
    RunFinished,
    StaleOverride,
    PollError,
    ConfigSaved,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StartRequested => "start_requested",
            Self::StartRejected => "start_rejected",
            Self::StartBlocked => "start_blocked",
            Self::RunFinished => "run_finished",
            Self::StaleOverride => "stale_override",
            Self::PollError => "poll_error",
            Self::ConfigSaved => "config_saved",
        };
        f.write_str(s)
    }
}

/// A single entry in the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorEvent {
    pub timestamp: String,
    pub kind: EventKind,
    /// Test id the event concerns, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub test: Option<String>,
    /// Free-form detail (error text, elapsed seconds, ...).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

impl MonitorEvent {
    pub fn new(kind: EventKind, test: Option<&str>, detail: Option<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind,
            test: test.map(str::to_string),
            detail,
        }
    }
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Handle to the event log file.
///
/// A disabled log swallows every write. All writes are best-effort: a failing
/// disk never interferes with the run monitor.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    /// Build from the resolved `[logging]` section.
    pub fn from_config(config: &LoggingConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self {
            path: crate::config::expand_home(&config.path),
        }
    }

    /// Log that writes to an explicit file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an event.
    pub fn record(&self, kind: EventKind, test: Option<&str>, detail: Option<String>) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let _ = append_event(path, &MonitorEvent::new(kind, test, detail));
    }

    /// Read all events, silently skipping malformed lines.
    pub fn read_all(&self) -> Vec<MonitorEvent> {
        let Some(path) = self.path.as_deref() else {
            return Vec::new();
        };
        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<MonitorEvent>(&line).ok())
            .collect()
    }

    /// Read events from the last `days` days (all events if `None`).
    pub fn read_since_days(&self, days: Option<u32>) -> Vec<MonitorEvent> {
        let events = self.read_all();
        let Some(days) = days else {
            return events;
        };

        let cutoff = (Utc::now() - chrono::Duration::days(i64::from(days))).to_rfc3339();
        events
            .into_iter()
            .filter(|e| e.timestamp >= cutoff)
            .collect()
    }
}

fn append_event(path: &Path, event: &MonitorEvent) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(event)?;
    writeln!(file, "{json}")?;

    Ok(())
}
