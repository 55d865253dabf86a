/// Configuration schema and defaults for benchctl.
///
/// Defines the TOML-serializable configuration structure with three
/// sections: `[runner]`, `[logging]` and `[display]`.
///
/// Every field has a built-in default. Users only need to set the values
/// they want to override.
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level benchctl configuration.
///
/// Maps directly to the `~/.benchctl/config.toml` and `.benchctl.toml` file
/// schemas. All sections and fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub runner: RunnerConfig,
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
}

// ---------------------------------------------------------------------------
// [runner]
// ---------------------------------------------------------------------------

/// Connection and polling settings for the remote runner service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Base URL of the runner service; endpoint paths are appended to it.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Interval between status polls while a run is in flight.
    pub poll_interval_ms: u64,
    /// Seconds past the configured duration after which a `running` report
    /// is considered stale and the run is treated as finished.
    pub stale_grace_secs: u64,
    /// Number of history rows requested per test.
    pub history_limit: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9996/benchmarks".to_string(),
            timeout_ms: 5000,
            poll_interval_ms: 1000,
            stale_grace_secs: 10,
            history_limit: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Event log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether monitor events are appended to the event log.
    pub enabled: bool,
    /// Path to the JSONL event log. `~` is expanded to the home directory.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.benchctl/events.jsonl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [display]
// ---------------------------------------------------------------------------

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    /// Parse a format name, falling back to `Table` for anything unknown.
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s.map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Terminal output settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Default output format when `--format` is not given.
    pub format: OutputFormat,
}

// ---------------------------------------------------------------------------
// Annotated default file
// ---------------------------------------------------------------------------

impl BenchConfig {
    /// The annotated default config written by `benchctl config init`.
    pub fn default_toml() -> String {
        r#"# benchctl configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (BENCHCTL_*)
#   2. Project config (.benchctl.toml in current directory)
#   3. User global config (~/.benchctl/config.toml)
#   4. Built-in defaults

[runner]
base_url = "http://127.0.0.1:9996/benchmarks"
timeout_ms = 5000
poll_interval_ms = 1000   # status poll cadence while a run is in flight
stale_grace_secs = 10     # treat "running" as finished this long past the configured duration
history_limit = 10

[logging]
enabled = true
path = "~/.benchctl/events.jsonl"

[display]
format = "table"   # table | json | csv
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_parses_back() {
        let config: BenchConfig = toml::from_str(&BenchConfig::default_toml()).unwrap();
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: BenchConfig = toml::from_str(
            r#"
            [runner]
            base_url = "http://bench:1234"
            "#,
        )
        .unwrap();
        assert_eq!(config.runner.base_url, "http://bench:1234");
        assert_eq!(config.runner.poll_interval_ms, 1000);
        assert_eq!(config.runner.stale_grace_secs, 10);
        assert!(config.logging.enabled);
    }

    #[test]
    fn output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str_opt(Some("CSV")), OutputFormat::Csv);
        assert_eq!(
            OutputFormat::from_str_opt(Some("unknown")),
            OutputFormat::Table
        );
    }

    #[test]
    fn output_format_serializes_lowercase() {
        let config = BenchConfig {
            display: DisplayConfig {
                format: OutputFormat::Json,
            },
            ..Default::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains(r#"format = "json""#));
    }
}
