/// Built-in benchmark catalog.
///
/// The set of load tests the runner knows how to execute is fixed at build
/// time. Each entry names the load-generator binary that backs it and the
/// duration / virtual-user defaults used until the server reports an override.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Duration used for ids that are not in the catalog.
const FALLBACK_DURATION_SECS: u32 = 60;

/// Virtual users used for ids that are not in the catalog.
const FALLBACK_VUS: u32 = 50;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An immutable catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestDefinition {
    pub id: &'static str,
    pub name: &'static str,
    /// Load-generator executable the runner spawns for this test.
    pub binary: &'static str,
    /// Default run length in seconds.
    pub duration: u32,
    /// Default number of virtual users.
    pub vus: u32,
}

/// Per-test run parameters, overridable by the user and persisted by the
/// runner service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    pub duration: u32,
    pub vus: u32,
}

impl TestConfig {
    /// Short human description, e.g. `30s Duration. 50 VUs.`
    pub fn description(&self) -> String {
        format!("{}s Duration. {} VUs.", self.duration, self.vus)
    }
}

impl From<&TestDefinition> for TestConfig {
    fn from(def: &TestDefinition) -> Self {
        Self {
            duration: def.duration,
            vus: def.vus,
        }
    }
}

/// Cached per-test overrides keyed by test id.
pub type ConfigMap = HashMap<String, TestConfig>;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

const fn def(id: &'static str, name: &'static str, binary: &'static str) -> TestDefinition {
    TestDefinition {
        id,
        name,
        binary,
        duration: 30,
        vus: 50,
    }
}

pub static TESTS: &[TestDefinition] = &[
    def("rest-read", "REST Reads", "load-rest"),
    def("rest-write", "REST Writes", "load-rest"),
    def("rest-update", "REST Update", "load-rest"),
    def("rest-join", "REST Join", "load-rest"),
    def("graphql-read", "GraphQL Reads", "load-graphql"),
    def("graphql-mutation", "GraphQL Mutations", "load-graphql"),
    def("graphql-join", "GraphQL Join", "load-graphql"),
    def("vector-embed", "Vector Embed", "load-vector"),
    def("vector-search", "Vector Search", "load-vector"),
    def("ws", "WebSocket", "load-realtime"),
    def("sse", "SSE Streaming", "load-realtime"),
    def("blob-retrieval", "150k Blob Retrieval", "load-blob"),
];

/// All catalog entries in display order.
pub fn all() -> &'static [TestDefinition] {
    TESTS
}

/// Look up a catalog entry by id.
pub fn find(id: &str) -> Option<&'static TestDefinition> {
    TESTS.iter().find(|t| t.id == id)
}

/// Display name for a test id, falling back to the id itself.
pub fn display_name(id: &str) -> &str {
    find(id).map(|t| t.name).unwrap_or(id)
}

/// Resolve the effective config for a test id.
///
/// Precedence: cached server override, then the catalog default, then a
/// fixed fallback for ids the catalog does not know.
pub fn resolve_config(configs: &ConfigMap, id: &str) -> TestConfig {
    if let Some(cfg) = configs.get(id) {
        return *cfg;
    }
    match find(id) {
        Some(def) => TestConfig::from(def),
        None => TestConfig {
            duration: FALLBACK_DURATION_SECS,
            vus: FALLBACK_VUS,
        },
    }
}
