//! CLI command implementations.
//!
//! Provides subcommand handlers for:
//! - `benchctl list`: all test cards with config, phase and latest numbers
//! - `benchctl run <test>`: start a test and follow it until idle
//! - `benchctl watch`: follow an in-flight run
//! - `benchctl status`: one reconciled runner read
//! - `benchctl results` / `benchctl history <test>`: result tables
//! - `benchctl configure <test>`: persist a per-test override
//! - `benchctl events`: summary of the local event log
//! - `benchctl health`: check runner, config and event log
//! - `benchctl config show|init|set|reset`: configuration management

use anyhow::{Context, Result};
use colored::Colorize;

use crate::analytics::events::EventLog;
use crate::analytics::reporter::{self, ActivityReport};
use crate::catalog::{self, TestConfig};
use crate::config::{self, BenchConfig};
use crate::monitor::view::{self, CardView, HistoryRow};
use crate::monitor::{MonitorSettings, RunMonitor, StartResult, TickOutcome};
use crate::runner::{RunnerApi, RunnerClient, RunnerStatus};

pub use crate::config::schema::OutputFormat;

/// Build a monitor wired to the configured runner and event log.
pub fn monitor_from_config(cfg: &BenchConfig) -> RunMonitor<RunnerClient> {
    RunMonitor::new(
        RunnerClient::from_config(&cfg.runner),
        MonitorSettings::from_config(&cfg.runner),
        EventLog::from_config(&cfg.logging),
    )
}

/// One state read; fails when the runner is down or not ready.
fn ensure_reachable(monitor: &mut RunMonitor<RunnerClient>) -> Result<()> {
    if monitor.tick() == TickOutcome::NotReady {
        anyhow::bail!(
            "runner at {} is not reachable or not ready",
            monitor.api().base_url()
        );
    }
    Ok(())
}

/// Reject ids the catalog does not know before any request is made.
fn require_test(id: &str) -> Result<&'static catalog::TestDefinition> {
    catalog::find(id).with_context(|| {
        let known: Vec<_> = catalog::all().iter().map(|t| t.id).collect();
        format!("unknown test '{id}'. Known tests: {}", known.join(", "))
    })
}

// ---------------------------------------------------------------------------
// benchctl list
// ---------------------------------------------------------------------------

/// Show every test card.
pub fn run_list(cfg: &BenchConfig, format: OutputFormat) -> Result<()> {
    let mut monitor = monitor_from_config(cfg);
    monitor.refresh();
    let cards = view::cards(&monitor);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cards)?),
        OutputFormat::Csv => print_cards_csv(&cards),
        OutputFormat::Table => {
            print_toolbar(&monitor);
            print_cards_table(&cards);
            println!();
            println!("  {}", view::footer(&monitor).dimmed());
        }
    }

    Ok(())
}

fn print_toolbar<A: RunnerApi>(monitor: &RunMonitor<A>) {
    let title = format!("Benchmarks ({} tests)", catalog::all().len());
    match view::badge(monitor) {
        Some(badge) => println!("{}  {}", title.bold().cyan(), badge.green().bold()),
        None => println!("{}", title.bold().cyan()),
    }
    println!("{}", "=".repeat(86));
    if let Some(error) = monitor.error() {
        println!("  {} {}", "Error:".red().bold(), error.red());
    }
}

fn print_cards_table(cards: &[CardView]) {
    println!(
        "  {:<20} {:<24} {:<16} {:>8} {:>10} {:>10}",
        "Test", "Config", "State", "req/sec", "p50", "p99"
    );
    println!("  {}", "-".repeat(92));

    for card in cards {
        let line = format!(
            "  {:<20} {:<24} {:<16} {:>8} {:>10} {:>10}",
            truncate(&card.name, 20),
            card.description,
            card_state(card),
            card.throughput_label(),
            card.p50_label(),
            card.p99_label(),
        );

        if card.disabled {
            println!("{}", line.dimmed());
        } else if card.overdue {
            println!("{}", line.yellow());
        } else if card.phase.is_busy() {
            println!("{}", line.green());
        } else {
            println!("{line}");
        }
    }
}

fn card_state(card: &CardView) -> String {
    match (&card.timer, card.disabled) {
        (Some(timer), _) if card.overdue => format!("{timer} (overdue)"),
        (Some(timer), _) => timer.clone(),
        (None, true) => "disabled".to_string(),
        (None, false) => "ready".to_string(),
    }
}

fn print_cards_csv(cards: &[CardView]) {
    println!("id,name,duration_desc,phase,disabled,throughput,p50_ms,p99_ms");
    for c in cards {
        println!(
            "{},{},{},{},{},{},{},{}",
            c.id,
            c.name,
            c.description,
            c.phase,
            c.disabled,
            c.throughput.map(|v| format!("{v:.1}")).unwrap_or_default(),
            c.p50_ms.map(|v| format!("{v:.2}")).unwrap_or_default(),
            c.p99_ms.map(|v| format!("{v:.2}")).unwrap_or_default(),
        );
    }
}

// ---------------------------------------------------------------------------
// benchctl run / watch / status
// ---------------------------------------------------------------------------

/// Start a test and follow it until the runner is idle again.
pub fn run_start(cfg: &BenchConfig, test_id: &str) -> Result<()> {
    let def = require_test(test_id)?;
    let mut monitor = monitor_from_config(cfg);
    monitor.refresh();
    monitor.select(def.id);

    match monitor.start(def.id) {
        StartResult::Started => {
            println!(
                "{} {} ({})",
                "Started".green().bold(),
                def.name.bold(),
                monitor.config_for(def.id).description()
            );
        }
        StartResult::Blocked { running } => {
            anyhow::bail!(
                "runner is busy with '{}'; wait for it to finish",
                catalog::display_name(&running)
            );
        }
        StartResult::Rejected(message) | StartResult::Failed(message) => {
            anyhow::bail!("{message}");
        }
    }

    follow(&mut monitor)
}

/// Follow an in-flight run, if there is one.
pub fn run_watch(cfg: &BenchConfig) -> Result<()> {
    let mut monitor = monitor_from_config(cfg);
    monitor.attach();

    if !monitor.is_polling() {
        println!("{}", "Runner is idle.".yellow());
        return Ok(());
    }

    if let Some(test) = monitor.phase().test().map(str::to_string) {
        monitor.select(&test);
    }
    follow(&mut monitor)
}

fn follow(monitor: &mut RunMonitor<RunnerClient>) -> Result<()> {
    let outcome = monitor.run_until_idle(std::thread::sleep, |m, outcome| {
        if outcome == TickOutcome::Updated
            && let Some(line) = progress_line(m)
        {
            println!("  {}", line.dimmed());
        }
    });

    if matches!(outcome, TickOutcome::Finished { stale: true }) {
        println!(
            "{}",
            "Runner still reported running long past the configured duration; treating as finished."
                .yellow()
        );
    }
    println!("{}", "Run finished.".green().bold());

    if let Some(error) = monitor.error() {
        println!("  {} {}", "Error:".red().bold(), error.red());
    }

    if let Some(test) = monitor.selected().map(str::to_string) {
        if let Some(card) = view::cards(monitor).into_iter().find(|c| c.id == test) {
            println!();
            print_cards_table(std::slice::from_ref(&card));
        }
        println!();
        print_history_table(&test, monitor.history());
    }

    Ok(())
}

fn progress_line<A: RunnerApi>(monitor: &RunMonitor<A>) -> Option<String> {
    let phase = monitor.phase();
    let name = catalog::display_name(phase.test()?);
    match phase.status() {
        RunnerStatus::Warming => Some(format!("{name}: warming {:.0}s", phase.warmup_secs())),
        RunnerStatus::Running => Some(format!(
            "{name}: {:.0}s / {}s",
            phase.elapsed_secs(),
            phase.configured_duration()
        )),
        RunnerStatus::Idle => None,
    }
}

/// One reconciled read of the runner state.
pub fn run_status(cfg: &BenchConfig, format: OutputFormat) -> Result<()> {
    let mut monitor = monitor_from_config(cfg);
    ensure_reachable(&mut monitor)?;

    let phase = monitor.phase();
    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "status": phase.status(),
            "test": phase.test(),
            "warmup_secs": phase.warmup_secs(),
            "elapsed_secs": phase.elapsed_secs(),
            "configured_duration": phase.configured_duration(),
            "server": monitor.last_snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match progress_line(&monitor) {
        Some(line) => println!("{} {}", "●".green(), line),
        None => println!("{} idle", "○".dimmed()),
    }
    if let Some(snapshot) = monitor.last_snapshot()
        && snapshot.status != phase.status()
    {
        println!(
            "  {}",
            format!("(server reports {}; treated as stale)", snapshot.status).yellow()
        );
    }
    if let Some(error) = monitor.last_snapshot().and_then(|s| s.last_error.as_deref()) {
        println!("  {} {}", "Last error:".red().bold(), error);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// benchctl results / history
// ---------------------------------------------------------------------------

/// Latest results per test.
pub fn run_results(cfg: &BenchConfig, format: OutputFormat) -> Result<()> {
    let mut monitor = monitor_from_config(cfg);
    monitor.refresh_latest_results();

    if monitor.latest_results().is_empty() {
        println!("{}", "No results yet.".yellow());
        return Ok(());
    }

    let mut results: Vec<_> = monitor.latest_results().values().collect();
    results.sort_by(|a, b| a.name.cmp(&b.name));

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Csv => {
            println!("name,throughput,p50,p99,total,errors,extrapolated,summary");
            for r in results {
                let m = r.results.clone().unwrap_or_default();
                println!(
                    "{},{},{},{},{},{},{},\"{}\"",
                    r.name,
                    m.throughput.unwrap_or(r.throughput),
                    m.p50.unwrap_or(0.0),
                    m.p99.unwrap_or(0.0),
                    m.total.unwrap_or(0.0),
                    m.errors.unwrap_or(0.0),
                    m.extrapolated_throughput.unwrap_or_default(),
                    m.summary.unwrap_or_default().replace('"', "'"),
                );
            }
        }
        OutputFormat::Table => {
            println!("{}", "Latest Results".bold().cyan());
            println!("{}", "=".repeat(70));
            println!(
                "  {:<22} {:>10} {:>10} {:>10}  Summary",
                "Test", "req/sec", "p50", "p99"
            );
            println!("  {}", "-".repeat(68));
            for r in results {
                let metrics = r.metrics();
                println!(
                    "  {:<22} {:>10} {:>10} {:>10}  {}",
                    truncate(catalog::display_name(&r.name), 22),
                    r.display_throughput()
                        .map(view::format_number)
                        .unwrap_or_else(|| "—".to_string()),
                    metrics
                        .map(|m| view::format_ms(m.p50.unwrap_or(0.0)))
                        .unwrap_or_else(|| "—".to_string()),
                    metrics
                        .map(|m| view::format_ms(m.p99.unwrap_or(0.0)))
                        .unwrap_or_else(|| "—".to_string()),
                    metrics
                        .and_then(|m| m.summary.as_deref())
                        .unwrap_or("-")
                        .dimmed(),
                );
            }
        }
    }

    Ok(())
}

/// Run history for one test, newest first.
pub fn run_history(
    cfg: &BenchConfig,
    test_id: &str,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let def = require_test(test_id)?;
    let mut runner_cfg = cfg.runner.clone();
    if let Some(limit) = limit {
        runner_cfg.history_limit = limit;
    }
    let mut monitor = RunMonitor::new(
        RunnerClient::from_config(&runner_cfg),
        MonitorSettings::from_config(&runner_cfg),
        EventLog::from_config(&cfg.logging),
    );
    ensure_reachable(&mut monitor)?;
    monitor.select(def.id);
    let rows: Vec<HistoryRow> = monitor.history().iter().map(HistoryRow::from).collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&monitor.history())?),
        OutputFormat::Csv => {
            println!("id,timestamp,throughput,extrapolated,duration,summary");
            for r in &rows {
                println!(
                    "{},{},{},{},{},\"{}\"",
                    r.id,
                    r.timestamp,
                    r.throughput,
                    r.extrapolated,
                    r.duration,
                    r.summary.replace('"', "'")
                );
            }
        }
        OutputFormat::Table => print_history_table(def.id, monitor.history()),
    }

    Ok(())
}

fn print_history_table(test_id: &str, runs: &[crate::runner::HistoryRun]) {
    println!(
        "{}",
        format!("History: {} ({} runs)", test_id, runs.len())
            .bold()
            .cyan()
    );
    if runs.is_empty() {
        println!("  {}", "No runs recorded yet".dimmed());
        return;
    }

    println!(
        "  {:<20} {:>12} {:>14} {:>9}  Summary",
        "Timestamp", "Throughput", "Extrapolated", "Duration"
    );
    println!("  {}", "-".repeat(70));
    for row in runs.iter().map(HistoryRow::from) {
        println!(
            "  {:<20} {:>12} {:>14} {:>9}  {}",
            truncate(&row.timestamp, 20),
            row.throughput,
            row.extrapolated,
            row.duration,
            row.summary.dimmed(),
        );
    }
}

// ---------------------------------------------------------------------------
// benchctl configure
// ---------------------------------------------------------------------------

/// Persist a per-test duration / VU override on the runner.
pub fn run_configure(
    cfg: &BenchConfig,
    test_id: &str,
    duration: Option<u32>,
    vus: Option<u32>,
) -> Result<()> {
    let def = require_test(test_id)?;
    let mut monitor = monitor_from_config(cfg);
    monitor.refresh();

    let current = monitor.config_for(def.id);
    let updated = TestConfig {
        duration: duration.unwrap_or(current.duration),
        vus: vus.unwrap_or(current.vus),
    };
    if updated.duration == 0 || updated.vus == 0 {
        anyhow::bail!("duration and vus must be at least 1");
    }

    if !monitor.save_config(def.id, updated) {
        anyhow::bail!(
            "could not reach runner at {} to save config",
            monitor.api().base_url()
        );
    }

    println!(
        "{} {}: {}",
        "✓".green().bold(),
        def.name.bold(),
        monitor.config_for(def.id).description()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// benchctl events
// ---------------------------------------------------------------------------

/// Summarize the local event log.
pub fn run_events(cfg: &BenchConfig, days: Option<u32>, format: OutputFormat) -> Result<()> {
    let log = EventLog::from_config(&cfg.logging);
    let report = reporter::summarize(&log.read_since_days(days));

    if report.total_events == 0 {
        println!("{}", "No events recorded yet.".yellow());
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_events_json(&report)?,
        OutputFormat::Csv => {
            println!("test,starts,rejections,blocked,finished,stale_overrides,last_seen");
            for t in &report.tests {
                println!(
                    "{},{},{},{},{},{},{}",
                    t.test,
                    t.starts,
                    t.rejections,
                    t.blocked,
                    t.finished,
                    t.stale_overrides,
                    t.last_seen
                );
            }
        }
        OutputFormat::Table => {
            println!("{}", "Run Activity".bold().cyan());
            println!("{}", "=".repeat(72));
            println!(
                "  {} {}   {} {}",
                "Events:".bold(),
                report.total_events,
                "Poll errors:".bold(),
                report.poll_errors
            );
            println!();
            println!(
                "  {:<20} {:>6} {:>8} {:>8} {:>6}  Last seen",
                "Test", "Starts", "Rejected", "Finished", "Stale"
            );
            println!("  {}", "-".repeat(70));
            for t in &report.tests {
                println!(
                    "  {:<20} {:>6} {:>8} {:>8} {:>6}  {}",
                    truncate(catalog::display_name(&t.test), 20),
                    t.starts,
                    t.rejections,
                    t.finished,
                    t.stale_overrides,
                    view::format_timestamp(&t.last_seen).dimmed(),
                );
            }
        }
    }

    Ok(())
}

fn print_events_json(report: &ActivityReport) -> Result<()> {
    let value = serde_json::json!({
        "total_events": report.total_events,
        "poll_errors": report.poll_errors,
        "tests": report.tests.iter().map(|t| serde_json::json!({
            "test": t.test,
            "starts": t.starts,
            "rejections": t.rejections,
            "blocked": t.blocked,
            "finished": t.finished,
            "stale_overrides": t.stale_overrides,
            "last_seen": t.last_seen,
        })).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// benchctl health
// ---------------------------------------------------------------------------

/// Check runner reachability, config files and the event log.
pub fn run_health(cfg: &BenchConfig) -> Result<()> {
    println!("{}", "benchctl Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.benchctl/config.toml found"
        } else {
            "not found (run `benchctl config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".benchctl.toml found"
        } else {
            "none (optional)"
        },
    );

    let client = RunnerClient::from_config(&cfg.runner);
    let runner_ok = client.is_healthy();
    print_health_item(
        "Runner",
        runner_ok,
        &if runner_ok {
            format!("reachable at {}", client.base_url())
        } else {
            format!("not reachable at {}", client.base_url())
        },
    );

    let log = EventLog::from_config(&cfg.logging);
    let log_detail = match log.path() {
        None => "disabled".to_string(),
        Some(path) if path.exists() => format!("{} events", log.read_all().len()),
        Some(_) => "no events yet".to_string(),
    };
    print_health_item("Event log", cfg.logging.enabled, &log_detail);

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<16} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// benchctl config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective benchctl Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.benchctl/config.toml", global_exists);
    print_source(".benchctl.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "BENCHCTL_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.benchctl/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
