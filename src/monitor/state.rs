/// Run phase and reconciliation of server reports against local state.
use crate::runner::{RunnerSnapshot, RunnerStatus};

/// A start the client issued and the runner accepted, before any poll has
/// confirmed it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalStart {
    pub test: String,
    /// Client clock at acceptance, seconds since the Unix epoch.
    pub started_at: f64,
}

/// Phase of the remote runner as presented to the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Phase {
    #[default]
    Idle,
    /// Optimistic local start, optionally refined by a server `warming` report.
    Warming {
        start: LocalStart,
        snapshot: Option<RunnerSnapshot>,
    },
    Running(RunnerSnapshot),
}

impl Phase {
    pub fn status(&self) -> RunnerStatus {
        match self {
            Self::Idle => RunnerStatus::Idle,
            Self::Warming { .. } => RunnerStatus::Warming,
            Self::Running(_) => RunnerStatus::Running,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.status().is_busy()
    }

    /// Test id occupying the runner.
    pub fn test(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Warming { start, snapshot } => snapshot
                .as_ref()
                .and_then(|s| s.test.as_deref())
                .or(Some(start.test.as_str())),
            Self::Running(snapshot) => snapshot.test.as_deref(),
        }
    }

    pub fn warmup_secs(&self) -> f64 {
        match self {
            Self::Warming {
                snapshot: Some(s), ..
            } => s.warmup_secs,
            _ => 0.0,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        match self {
            Self::Running(s) => s.elapsed_secs,
            _ => 0.0,
        }
    }

    pub fn configured_duration(&self) -> f64 {
        match self {
            Self::Running(s) => s.configured_duration,
            Self::Warming {
                snapshot: Some(s), ..
            } => s.configured_duration,
            _ => 0.0,
        }
    }
}

/// Whether a `running` report has outlived its configured duration plus the
/// grace window. A non-positive configured duration never goes stale.
pub fn is_stale(snapshot: &RunnerSnapshot, grace_secs: f64) -> bool {
    snapshot.status == RunnerStatus::Running
        && snapshot.configured_duration > 0.0
        && snapshot.elapsed_secs > snapshot.configured_duration + grace_secs
}

/// Result of folding a server report into the current phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub phase: Phase,
    /// The server claimed `running` but the report was stale.
    pub stale_override: bool,
}

/// Fold a server snapshot into the current phase.
///
/// The server's status wins, except that a stale `running` report is read as
/// idle. A server `warming` report keeps the local start (if any) and
/// attaches the snapshot.
pub fn reconcile(current: &Phase, snapshot: RunnerSnapshot, grace_secs: f64) -> Reconciled {
    if is_stale(&snapshot, grace_secs) {
        return Reconciled {
            phase: Phase::Idle,
            stale_override: true,
        };
    }

    let phase = match snapshot.status {
        RunnerStatus::Idle => Phase::Idle,
        RunnerStatus::Running => Phase::Running(snapshot),
        RunnerStatus::Warming => {
            let start = match current {
                Phase::Warming { start, .. } if snapshot_matches(&snapshot, &start.test) => {
                    start.clone()
                }
                _ => LocalStart {
                    test: snapshot.test.clone().unwrap_or_default(),
                    started_at: snapshot.started_at.unwrap_or(0.0),
                },
            };
            Phase::Warming {
                start,
                snapshot: Some(snapshot),
            }
        }
    };

    Reconciled {
        phase,
        stale_override: false,
    }
}

fn snapshot_matches(snapshot: &RunnerSnapshot, test: &str) -> bool {
    snapshot.test.as_deref().is_none_or(|t| t == test)
}
