//! Client for a remote single-flight benchmark runner.
//!
//! Starts load tests on the runner service, polls their state, reconciles
//! stale server reports and fetches results and history when a run ends.

pub mod analytics;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod monitor;
pub mod runner;
