//! Runner service API.
//!
//! The runner service is the remote HTTP collaborator that owns the job
//! runner: it starts load tests, reports their state and stores results.
//! [`RunnerApi`] is the seam the run monitor talks through; [`RunnerClient`]
//! is the production implementation over `ureq`.
//!
//! Return conventions shared by every method:
//! - `Ok(Some(_))`: 2xx with a parsed body
//! - `Ok(None)`: the server answered with a non-2xx status
//! - `Err(_)`: transport failure or an unparseable body

pub mod client;
pub mod types;

use anyhow::Result;

use crate::catalog::TestConfig;

pub use client::RunnerClient;
pub use types::{
    HistoryRun, LatestResult, ResultMetrics, RunnerPayload, RunnerSnapshot, RunnerStatus,
    StartOutcome,
};

/// Operations the run monitor needs from the runner service.
pub trait RunnerApi {
    /// `GET /runner`
    fn fetch_state(&self) -> Result<Option<RunnerPayload>>;

    /// `POST /runner {test}`
    fn start_test(&self, test_id: &str) -> Result<StartOutcome>;

    /// `POST /TestConfig {id, duration, vus}`. Completes with `Ok(())` for
    /// any HTTP status; only transport failures are errors.
    fn save_test_config(&self, test_id: &str, config: &TestConfig) -> Result<()>;

    /// `GET /bestresults`
    fn fetch_best_results(&self) -> Result<Option<Vec<LatestResult>>>;

    /// `GET /TestRun?testName==<id>&limit=<n>`, sorted newest-first.
    fn fetch_history(&self, test_id: &str, limit: usize) -> Result<Option<Vec<HistoryRun>>>;
}
