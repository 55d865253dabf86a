/// Runner client tests against a scripted local HTTP server.
use std::io::Read;
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tiny_http::{Header, Response, Server, StatusCode};

use benchctl::analytics::events::EventLog;
use benchctl::catalog::TestConfig;
use benchctl::monitor::{MonitorSettings, RunMonitor, StartResult, TickOutcome};
use benchctl::runner::{RunnerApi, RunnerClient, RunnerStatus, StartOutcome};

// ---------------------------------------------------------------------------
// Fake runner server
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Recorded {
    method: String,
    url: String,
    body: String,
}

/// Serve the given `(status, body)` responses in order, one per request,
/// then stop. The join handle yields every request that was received.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Recorded>>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let mut request = server.recv().unwrap();
            let mut buf = String::new();
            let _ = request.as_reader().read_to_string(&mut buf);
            seen.push(Recorded {
                method: request.method().to_string(),
                url: request.url().to_string(),
                body: buf,
            });
            let header = Header::from_bytes("Content-Type", "application/json").unwrap();
            let resp = Response::from_string(body)
                .with_status_code(StatusCode(status))
                .with_header(header);
            let _ = request.respond(resp);
        }
        seen
    });

    (format!("http://127.0.0.1:{port}/benchmarks"), handle)
}

fn client(base_url: &str) -> RunnerClient {
    RunnerClient::new(base_url, Duration::from_secs(2))
}

/// A base URL nothing listens on.
fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/benchmarks")
}

// ---------------------------------------------------------------------------
// GET /runner
// ---------------------------------------------------------------------------

#[test]
fn fetch_state_parses_payload_and_configs() {
    let (url, server) = serve(vec![(
        200,
        r#"{
            "status": "running",
            "testName": "ws",
            "startedAt": 1700000000.5,
            "elapsedSecs": 12.4,
            "configuredDuration": 30,
            "lastError": "",
            "configs": [{"id": "ws", "duration": 60, "vus": 5}]
        }"#,
    )]);

    let payload = client(&url).fetch_state().unwrap().unwrap();
    let (snapshot, configs) = payload.into_parts();

    assert_eq!(snapshot.status, RunnerStatus::Running);
    assert_eq!(snapshot.test.as_deref(), Some("ws"));
    assert_eq!(snapshot.elapsed_secs, 12.4);
    assert_eq!(snapshot.configured_duration, 30.0);
    assert!(snapshot.last_error.is_none(), "empty error is absent");
    let configs = configs.unwrap();
    assert_eq!(
        configs["ws"],
        TestConfig {
            duration: 60,
            vus: 5
        }
    );

    let seen = server.join().unwrap();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].url, "/benchmarks/runner");
}

#[test]
fn fetch_state_non_2xx_is_not_ready() {
    let (url, server) = serve(vec![(503, "starting up")]);
    assert!(client(&url).fetch_state().unwrap().is_none());
    server.join().unwrap();
}

#[test]
fn fetch_state_malformed_body_is_error() {
    let (url, server) = serve(vec![(200, "<html>proxy error</html>")]);
    assert!(client(&url).fetch_state().is_err());
    server.join().unwrap();
}

#[test]
fn unreachable_runner_is_transport_error() {
    let client = client(&dead_url());
    assert!(client.fetch_state().is_err());
    assert!(client.start_test("ws").is_err());
    assert!(!client.is_healthy());
}

// ---------------------------------------------------------------------------
// POST /runner and /TestConfig
// ---------------------------------------------------------------------------

#[test]
fn start_test_posts_test_id() {
    let (url, server) = serve(vec![(200, "{}")]);

    let outcome = client(&url).start_test("rest-read").unwrap();
    assert_eq!(outcome, StartOutcome::Accepted);

    let seen = server.join().unwrap();
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].url, "/benchmarks/runner");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body, serde_json::json!({"test": "rest-read"}));
}

#[test]
fn start_test_rejection_carries_status_and_body() {
    let (url, server) = serve(vec![(500, "queue full")]);

    let outcome = client(&url).start_test("rest-read").unwrap();
    assert_eq!(
        outcome,
        StartOutcome::Rejected {
            status: 500,
            body: "queue full".to_string()
        }
    );
    server.join().unwrap();
}

#[test]
fn save_test_config_completes_on_any_status() {
    let (url, server) = serve(vec![(200, "{}"), (400, "bad vus")]);
    let client = client(&url);
    let cfg = TestConfig {
        duration: 45,
        vus: 200,
    };

    assert!(client.save_test_config("graphql-read", &cfg).is_ok());
    assert!(client.save_test_config("graphql-read", &cfg).is_ok());

    let seen = server.join().unwrap();
    assert_eq!(seen[0].url, "/benchmarks/TestConfig");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"id": "graphql-read", "duration": 45, "vus": 200})
    );
}

// ---------------------------------------------------------------------------
// Results and history
// ---------------------------------------------------------------------------

#[test]
fn best_results_parse_and_non_2xx() {
    let (url, server) = serve(vec![
        (
            200,
            r#"{"tests": [{"name": "ws", "throughput": 812.5, "run": {},
                "results": {"throughput": 812.5, "p50": 1.5, "p99": 9.25}}]}"#,
        ),
        (404, "not found"),
    ]);
    let client = client(&url);

    let results = client.fetch_best_results().unwrap().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "ws");
    assert_eq!(results[0].metrics().and_then(|m| m.p99), Some(9.25));

    assert!(client.fetch_best_results().unwrap().is_none());
    server.join().unwrap();
}

#[test]
fn history_query_and_newest_first_order() {
    let (url, server) = serve(vec![
        (
            200,
            r#"{"data": [
                {"id": "old", "timestamp": "2024-01-05T10:00:00Z"},
                {"id": "new", "timestamp": "2024-03-01T08:30:00Z"},
                {"id": "mid", "timestamp": "2024-02-11T12:00:00Z"}
            ]}"#,
        ),
        (200, r#"[{"id": "a", "timestamp": "2024-01-01T00:00:00Z"}, {"id": "b"}]"#),
    ]);
    let client = client(&url);

    let runs = client.fetch_history("ws", 5).unwrap().unwrap();
    let ids: Vec<_> = runs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);

    let runs = client.fetch_history("sse", 10).unwrap().unwrap();
    let ids: Vec<_> = runs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"], "plain array accepted; missing timestamp last");

    let seen = server.join().unwrap();
    assert_eq!(seen[0].url, "/benchmarks/TestRun?testName==ws&limit=5");
    assert_eq!(seen[1].url, "/benchmarks/TestRun?testName==sse&limit=10");
}

// ---------------------------------------------------------------------------
// Monitor over HTTP
// ---------------------------------------------------------------------------

#[test]
fn monitor_run_over_http() {
    let (url, server) = serve(vec![
        (200, "{}"),
        (200, r#"{"status": "running", "testName": "sse", "elapsedSecs": 1, "configuredDuration": 30}"#),
        (200, r#"{"status": "idle", "testName": "sse"}"#),
        (200, r#"{"tests": []}"#),
    ]);
    let settings = MonitorSettings {
        poll_interval: Duration::from_millis(1),
        ..MonitorSettings::default()
    };
    let mut monitor = RunMonitor::new(client(&url), settings, EventLog::disabled());

    assert_eq!(monitor.start("sse"), StartResult::Started);
    let last = monitor.run_until_idle(thread::sleep, |_, _| {});

    assert_eq!(last, TickOutcome::Finished { stale: false });
    assert!(!monitor.is_busy());

    let seen = server.join().unwrap();
    let urls: Vec<_> = seen.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "/benchmarks/runner",
            "/benchmarks/runner",
            "/benchmarks/runner",
            "/benchmarks/bestresults"
        ]
    );
}
