//! Event log reporter: per-test activity summary for `benchctl events`.

use std::collections::HashMap;

use crate::analytics::events::{EventKind, MonitorEvent};

/// Aggregated activity for a single test id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestActivity {
    pub test: String,
    pub starts: usize,
    pub rejections: usize,
    pub blocked: usize,
    pub finished: usize,
    pub stale_overrides: usize,
    /// Timestamp of the most recent event for this test.
    pub last_seen: String,
}

/// Summary over the whole event log window.
#[derive(Debug, Default)]
pub struct ActivityReport {
    pub total_events: usize,
    pub poll_errors: usize,
    /// Sorted by number of starts, most active first.
    pub tests: Vec<TestActivity>,
}

/// Summarize events per test.
pub fn summarize(events: &[MonitorEvent]) -> ActivityReport {
    let mut by_test: HashMap<&str, TestActivity> = HashMap::new();
    let mut poll_errors = 0;

    for event in events {
        if event.kind == EventKind::PollError {
            poll_errors += 1;
        }

        let Some(test) = event.test.as_deref() else {
            continue;
        };

        let entry = by_test.entry(test).or_insert_with(|| TestActivity {
            test: test.to_string(),
            ..Default::default()
        });

        match event.kind {
            EventKind::StartRequested => entry.starts += 1,
            EventKind::StartRejected => entry.rejections += 1,
            EventKind::StartBlocked => entry.blocked += 1,
            EventKind::RunFinished => entry.finished += 1,
            EventKind::StaleOverride => entry.stale_overrides += 1,
            EventKind::PollError | EventKind::ConfigSaved => {}
        }

        if event.timestamp > entry.last_seen {
            entry.last_seen = event.timestamp.clone();
        }
    }

    let mut tests: Vec<TestActivity> = by_test.into_values().collect();
    tests.sort_by(|a, b| b.starts.cmp(&a.starts).then_with(|| a.test.cmp(&b.test)));

    ActivityReport {
        total_events: events.len(),
        poll_errors,
        tests,
    }
}
