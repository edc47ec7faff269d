use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mb_core::config::Config;
use mb_core::planning::PlanningStore;
use mb_daemon::daemon::Daemon;
use mb_harness::memory_sink::MemorySink;
use serde_json::{json, Value};

#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl MemorySink for RecordingSink {
    async fn persist(&self, entity_type: &str, data: &Value) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push((entity_type.to_string(), data.clone()));
        true
    }
}

/// Spin up an API server on a random port, return the base URL.
async fn start_test_server() -> (String, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let store = PlanningStore::new_in_memory().await.unwrap();
    let daemon = Daemon::with_parts(Config::default(), store, sink.clone());
    let router = daemon.router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to ephemeral port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{addr}"), sink)
}

#[tokio::test]
async fn health_endpoint() {
    let (base, _) = start_test_server().await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-request-id"].len(), 32);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn outcomes_flow_into_metrics() {
    let (base, _) = start_test_server().await;
    let client = reqwest::Client::new();

    for _ in 0..8 {
        let resp = client
            .post(format!("{base}/api/mama-bear/outcomes"))
            .json(&json!({"success": true, "processing_time": 1.0, "model_used": "A"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);
    }
    for _ in 0..2 {
        client
            .post(format!("{base}/api/mama-bear/outcomes"))
            .json(&json!({"error": "quota exceeded"}))
            .send()
            .await
            .unwrap();
    }

    let body: Value = reqwest::get(format!("{base}/api/mama-bear/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["current_metrics"]["requests_total"], 10);
    assert!(body["current_metrics"]["hourly_stats"].is_object());

    let report = &body["daily_report"];
    assert_eq!(report["period"], "24h");
    assert_eq!(report["summary"]["total_requests"], 10);
    assert_eq!(report["summary"]["success_rate"], 80.0);
    assert_eq!(report["model_performance"]["A"]["usage_count"], 8);
    assert_eq!(report["model_performance"]["A"]["usage_percentage"], 80.0);
    assert_eq!(report["billing_distribution"]["unknown"]["usage_count"], 8);
    assert_eq!(report["model_health"]["A"]["status"], "healthy");
}

#[tokio::test]
async fn malformed_outcome_is_bad_request() {
    let (base, _) = start_test_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/mama-bear/outcomes"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (base, _) = start_test_server().await;
    let resp = reqwest::get(format!("{base}/api/mama-bear/nope"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "no route for /api/mama-bear/nope");
}

#[tokio::test]
async fn status_reports_uptime_health_and_quota() {
    let (base, _) = start_test_server().await;
    let client = reqwest::Client::new();
    client
        .post(format!("{base}/api/mama-bear/outcomes"))
        .json(&json!({"success": true, "model_used": "gemini-pro"}))
        .send()
        .await
        .unwrap();

    let body: Value = reqwest::get(format!("{base}/api/mama-bear/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert!(body["status"]["uptime_seconds"].is_u64());
    assert_eq!(body["status"]["model_health"]["gemini-pro"]["successes"], 1);
    assert_eq!(body["status"]["quota_usage"]["gemini-pro"], 1.0);
}

#[tokio::test]
async fn create_and_list_logs() {
    let (base, sink) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/podplay-planning/podplay_logs"))
        .json(&json!({"message": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_i64().unwrap();

    let logs: Vec<Value> = reqwest::get(format!("{base}/podplay-planning/podplay_logs"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["id"], id);
    assert_eq!(logs[0]["level"], "INFO");
    assert_eq!(logs[0]["context"], "");

    // Mirroring is spawned; give it a moment.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let calls = sink.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "log");
    assert_eq!(calls[0].1["id"], id);
    assert_eq!(calls[0].1["message"], "hello");
}

#[tokio::test]
async fn missing_required_fields_are_rejected() {
    let (base, _) = start_test_server().await;
    let client = reqwest::Client::new();

    for (path, body) in [
        ("podplay_logs", json!({"level": "WARN"})),
        ("podplay_tasks", json!({"status": "done"})),
        ("podplay_plans", json!({"steps": "1"})),
        ("podplay_context_snapshots", json!({})),
    ] {
        let resp = client
            .post(format!("{base}/podplay-planning/{path}"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{path}");
    }
}

#[tokio::test]
async fn tasks_plans_and_snapshots_round_trip() {
    let (base, _) = start_test_server().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/podplay-planning/podplay_tasks"))
        .json(&json!({"title": "wire up quota"}))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{base}/podplay-planning/podplay_plans"))
        .json(&json!({"description": "release", "steps": "tag; publish"}))
        .send()
        .await
        .unwrap();
    client
        .post(format!("{base}/podplay-planning/podplay_context_snapshots"))
        .json(&json!({"snapshot": "{\"open_files\":3}"}))
        .send()
        .await
        .unwrap();

    let tasks: Vec<Value> = reqwest::get(format!("{base}/podplay-planning/podplay_tasks"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tasks[0]["title"], "wire up quota");
    assert_eq!(tasks[0]["status"], "pending");

    let plans: Vec<Value> = reqwest::get(format!("{base}/podplay-planning/podplay_plans"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(plans[0]["steps"], "tag; publish");

    let snaps: Vec<Value> =
        reqwest::get(format!("{base}/podplay-planning/podplay_context_snapshots"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    assert_eq!(snaps.len(), 1);
}
