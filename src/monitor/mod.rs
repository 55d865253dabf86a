//! Run monitor: client side of the remote single-flight job runner.
//!
//! Lifecycle of one run:
//!
//! 1. [`RunMonitor::start`] sends the start request. When the runner accepts
//!    it the phase becomes `Warming` immediately (no poll confirmation) and a
//!    poll loop is begun.
//! 2. Each [`RunMonitor::tick`] fetches the runner state and folds it into
//!    the phase via [`state::reconcile`]. Transport failures and non-2xx
//!    answers are treated as "server not ready" and change nothing.
//! 3. When a tick observes idle (reported, or inferred from a stale
//!    `running` report) while polling, the loop stops and latest results and
//!    the selected test's history are fetched once.
//!
//! Only one poll loop exists at a time: beginning a new one tears the
//! previous handle down first.

pub mod state;
pub mod view;

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;

use crate::analytics::events::{EventKind, EventLog};
use crate::catalog::{self, ConfigMap, TestConfig};
use crate::config::schema::RunnerConfig;
use crate::runner::{HistoryRun, LatestResult, RunnerApi, RunnerSnapshot, StartOutcome};

pub use state::{LocalStart, Phase};

/// Message shown when the runner rejects a start with an empty body.
const START_REJECTED_FALLBACK: &str = "Failed to start test";

/// Label for a busy runner that did not name its test.
const UNNAMED_TEST: &str = "another test";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Tunables for the monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub stale_grace_secs: f64,
    pub history_limit: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

impl MonitorSettings {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            stale_grace_secs: config.stale_grace_secs as f64,
            history_limit: config.history_limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Identity of an active poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollHandle(u64);

/// Result of a start action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartResult {
    /// Accepted; the monitor is now warming and polling.
    Started,
    /// Another test occupies the runner; no request was sent.
    Blocked { running: String },
    /// The runner answered non-2xx; carries the surfaced message.
    Rejected(String),
    /// The request never completed; carries the surfaced message.
    Failed(String),
}

/// Result of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Runner unreachable or not ready; nothing changed.
    NotReady,
    /// Phase refreshed from the server.
    Updated,
    /// Idle observed while polling; the loop has stopped.
    Finished { stale: bool },
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Client-side state for the benchmark runner.
pub struct RunMonitor<A> {
    api: A,
    settings: MonitorSettings,
    events: EventLog,
    phase: Phase,
    last_snapshot: Option<RunnerSnapshot>,
    configs: ConfigMap,
    latest: HashMap<String, LatestResult>,
    history: Vec<HistoryRun>,
    selected: Option<String>,
    error: Option<String>,
    poll: Option<PollHandle>,
    next_poll_id: u64,
    poll_error_streak: usize,
}

impl<A: RunnerApi> RunMonitor<A> {
    pub fn new(api: A, settings: MonitorSettings, events: EventLog) -> Self {
        Self {
            api,
            settings,
            events,
            phase: Phase::Idle,
            last_snapshot: None,
            configs: ConfigMap::new(),
            latest: HashMap::new(),
            history: Vec::new(),
            selected: None,
            error: None,
            poll: None,
            next_poll_id: 0,
            poll_error_streak: 0,
        }
    }

    // -- Accessors --

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    /// Whether a start control is enabled. All are disabled while any test
    /// occupies the runner.
    pub fn can_start(&self) -> bool {
        !self.is_busy()
    }

    /// Last raw snapshot the server reported.
    pub fn last_snapshot(&self) -> Option<&RunnerSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn configs(&self) -> &ConfigMap {
        &self.configs
    }

    /// Effective config for a test (override, catalog default, fallback).
    pub fn config_for(&self, test_id: &str) -> TestConfig {
        catalog::resolve_config(&self.configs, test_id)
    }

    pub fn latest_results(&self) -> &HashMap<String, LatestResult> {
        &self.latest
    }

    pub fn history(&self) -> &[HistoryRun] {
        &self.history
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// User-visible error banner, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_some()
    }

    pub fn poll_handle(&self) -> Option<PollHandle> {
        self.poll
    }

    // -- Loading --

    /// Initial load: latest results plus one runner state read.
    pub fn refresh(&mut self) {
        self.refresh_latest_results();
        self.tick();
    }

    /// Load, and if a run is already in flight begin polling so its
    /// completion is observed.
    pub fn attach(&mut self) {
        self.refresh();
        if self.is_busy() && !self.is_polling() {
            self.begin_polling();
        }
    }

    /// Re-fetch latest aggregated results. Failures keep the current map.
    pub fn refresh_latest_results(&mut self) {
        if let Ok(Some(results)) = self.api.fetch_best_results() {
            self.latest = results.into_iter().map(|r| (r.name.clone(), r)).collect();
        }
    }

    /// Fetch history for a test. A transport failure clears the list; a
    /// non-2xx answer keeps it.
    pub fn refresh_history(&mut self, test_id: &str) {
        match self.api.fetch_history(test_id, self.settings.history_limit) {
            Ok(Some(runs)) => self.history = runs,
            Ok(None) => {}
            Err(_) => self.history.clear(),
        }
    }

    /// Toggle selection of a test. Selecting a different test loads its
    /// history; selecting the current one clears the selection.
    pub fn select(&mut self, test_id: &str) {
        if self.selected.as_deref() == Some(test_id) {
            self.selected = None;
            return;
        }
        self.selected = Some(test_id.to_string());
        self.refresh_history(test_id);
    }

    // -- Actions --

    /// Start a test on the runner.
    pub fn start(&mut self, test_id: &str) -> StartResult {
        if self.is_busy() {
            let running = self.phase.test().unwrap_or(UNNAMED_TEST).to_string();
            self.events.record(EventKind::StartBlocked, Some(test_id), Some(running.clone()));
            return StartResult::Blocked { running };
        }

        self.error = None;
        self.events.record(EventKind::StartRequested, Some(test_id), None);

        match self.api.start_test(test_id) {
            Ok(StartOutcome::Accepted) => {
                self.phase = Phase::Warming {
                    start: LocalStart {
                        test: test_id.to_string(),
                        started_at: Utc::now().timestamp_millis() as f64 / 1000.0,
                    },
                    snapshot: None,
                };
                self.begin_polling();
                StartResult::Started
            }
            Ok(StartOutcome::Rejected { status, body }) => {
                let message = if body.is_empty() {
                    START_REJECTED_FALLBACK.to_string()
                } else {
                    body
                };
                self.events.record(
                    EventKind::StartRejected,
                    Some(test_id),
                    Some(format!("{status}: {message}")),
                );
                self.error = Some(message.clone());
                StartResult::Rejected(message)
            }
            Err(e) => {
                let message = format!("Connection error: {e:#}");
                self.events.record(EventKind::StartRejected, Some(test_id), Some(message.clone()));
                self.error = Some(message.clone());
                StartResult::Failed(message)
            }
        }
    }

    /// Persist a per-test override. The local cache is updated once the
    /// request completes; transport failures are silent. Returns whether the
    /// request completed.
    pub fn save_config(&mut self, test_id: &str, config: TestConfig) -> bool {
        match self.api.save_test_config(test_id, &config) {
            Ok(()) => {
                self.configs.insert(test_id.to_string(), config);
                self.events.record(
                    EventKind::ConfigSaved,
                    Some(test_id),
                    Some(config.description()),
                );
                true
            }
            Err(_) => false,
        }
    }

    // -- Polling --

    /// One poll: read the runner state and reconcile.
    pub fn tick(&mut self) -> TickOutcome {
        let payload = match self.api.fetch_state() {
            Ok(Some(payload)) => payload,
            Ok(None) => return TickOutcome::NotReady,
            Err(e) => {
                if self.poll_error_streak == 0 {
                    self.events.record(EventKind::PollError, None, Some(format!("{e:#}")));
                }
                self.poll_error_streak += 1;
                return TickOutcome::NotReady;
            }
        };
        self.poll_error_streak = 0;

        let (snapshot, configs) = payload.into_parts();
        let previous_test = self.phase.test().map(str::to_string);
        let reconciled =
            state::reconcile(&self.phase, snapshot.clone(), self.settings.stale_grace_secs);

        if reconciled.stale_override {
            self.events.record(
                EventKind::StaleOverride,
                snapshot.test.as_deref(),
                Some(format!(
                    "elapsed {:.0}s > configured {:.0}s + {:.0}s",
                    snapshot.elapsed_secs,
                    snapshot.configured_duration,
                    self.settings.stale_grace_secs
                )),
            );
        }

        self.phase = reconciled.phase;
        self.last_snapshot = Some(snapshot);
        if let Some(configs) = configs {
            self.configs = configs;
        }

        if !self.phase.is_busy() && self.is_polling() {
            self.finish_run(previous_test.as_deref());
            return TickOutcome::Finished {
                stale: reconciled.stale_override,
            };
        }

        TickOutcome::Updated
    }

    /// Poll at the configured interval until idle is observed.
    ///
    /// `sleep` waits between ticks; `on_tick` is called after every tick.
    /// Returns immediately when no poll loop is active.
    pub fn run_until_idle(
        &mut self,
        mut sleep: impl FnMut(Duration),
        mut on_tick: impl FnMut(&Self, TickOutcome),
    ) -> TickOutcome {
        let mut last = TickOutcome::NotReady;
        while self.is_polling() {
            sleep(self.settings.poll_interval);
            last = self.tick();
            on_tick(self, last);
        }
        last
    }

    /// Begin a poll loop, tearing down any existing one first.
    fn begin_polling(&mut self) -> PollHandle {
        self.stop_polling();
        self.next_poll_id += 1;
        let handle = PollHandle(self.next_poll_id);
        self.poll = Some(handle);
        handle
    }

    fn stop_polling(&mut self) {
        self.poll = None;
    }

    /// Completion work after an observed idle transition.
    fn finish_run(&mut self, test: Option<&str>) {
        self.stop_polling();
        self.refresh_latest_results();
        if let Some(selected) = self.selected.clone() {
            self.refresh_history(&selected);
        }

        let server_error = self
            .last_snapshot
            .as_ref()
            .and_then(|s| s.last_error.clone());
        self.events.record(EventKind::RunFinished, test, server_error.clone());
        if let Some(error) = server_error {
            self.error = Some(error);
        }
    }
}
