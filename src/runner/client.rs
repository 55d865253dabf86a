/// Synchronous HTTP client for the runner service.
///
/// Built from the resolved [`RunnerConfig`] and reused for the lifetime of a
/// single `benchctl` invocation. Every request carries the configured
/// timeout so a hung server cannot stall a poll tick indefinitely.
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use super::RunnerApi;
use super::types::{
    BestResultsPayload, HistoryPayload, HistoryRun, LatestResult, RunnerPayload,
    SaveConfigRequest, StartOutcome, StartRequest,
};
use crate::catalog::TestConfig;
use crate::config::schema::RunnerConfig;

/// Blocking runner service client.
#[derive(Debug, Clone)]
pub struct RunnerClient {
    base_url: String,
    timeout: Duration,
}

impl RunnerClient {
    /// Build a client from the resolved config.
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(&config.base_url, Duration::from_millis(config.timeout_ms))
    }

    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the runner answers `GET /runner` with a parseable body.
    ///
    /// Uses a short timeout (3 s) so `benchctl health` returns promptly when
    /// the service is down.
    pub fn is_healthy(&self) -> bool {
        let url = self.url("/runner");
        match ureq::get(&url).timeout(Duration::from_secs(3)).call() {
            Ok(resp) => resp.into_json::<RunnerPayload>().is_ok(),
            Err(_) => false,
        }
    }

    fn url(&self, path: &str) -> String {
        // "localhost" may resolve to ::1 first; most runners only bind IPv4.
        format!("{}{}", self.base_url, path).replace("://localhost", "://127.0.0.1")
    }

    /// GET a JSON body. Non-2xx statuses map to `Ok(None)`.
    fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<Option<T>> {
        match ureq::get(url).timeout(self.timeout).call() {
            Ok(resp) => {
                let body = resp
                    .into_json()
                    .with_context(|| format!("failed to parse {what} response"))?;
                Ok(Some(body))
            }
            Err(ureq::Error::Status(_, _)) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("{what} request failed")),
        }
    }
}

impl RunnerApi for RunnerClient {
    fn fetch_state(&self) -> Result<Option<RunnerPayload>> {
        self.get_json(&self.url("/runner"), "runner state")
    }

    fn start_test(&self, test_id: &str) -> Result<StartOutcome> {
        let url = self.url("/runner");
        let result = ureq::post(&url)
            .timeout(self.timeout)
            .send_json(&StartRequest { test: test_id });

        match result {
            Ok(_) => Ok(StartOutcome::Accepted),
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Ok(StartOutcome::Rejected { status, body })
            }
            Err(e) => Err(e).context("start request failed"),
        }
    }

    fn save_test_config(&self, test_id: &str, config: &TestConfig) -> Result<()> {
        let url = self.url("/TestConfig");
        let body = SaveConfigRequest {
            id: test_id,
            duration: config.duration,
            vus: config.vus,
        };

        match ureq::post(&url).timeout(self.timeout).send_json(&body) {
            Ok(_) | Err(ureq::Error::Status(_, _)) => Ok(()),
            Err(e) => Err(e).context("test config request failed"),
        }
    }

    fn fetch_best_results(&self) -> Result<Option<Vec<LatestResult>>> {
        let payload: Option<BestResultsPayload> =
            self.get_json(&self.url("/bestresults"), "best results")?;
        Ok(payload.map(|p| p.tests))
    }

    fn fetch_history(&self, test_id: &str, limit: usize) -> Result<Option<Vec<HistoryRun>>> {
        // The runner's query syntax uses `==` for equality.
        let url = self.url(&format!("/TestRun?testName=={test_id}&limit={limit}"));
        let payload: Option<HistoryPayload> = self.get_json(&url, "history")?;
        Ok(payload.map(HistoryPayload::into_sorted))
    }
}
