//! Health and metrics endpoints

use axum_test::TestServer;
use candlecast::core::http::{create_router, AppState, HealthStatus};
use candlecast::core::scheduler::SchedulerState;
use candlecast::metrics::Metrics;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::test_utils::ts;

fn test_server(health: HealthStatus) -> (TestServer, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
    let state = AppState::new(Arc::new(RwLock::new(health)), metrics.clone());
    let server = TestServer::new(create_router(state)).expect("start test server");
    (server, metrics)
}

#[tokio::test]
async fn health_endpoint_reports_scheduler_state() {
    let (server, _) = test_server(HealthStatus {
        status: "degraded".to_string(),
        scheduler_state: SchedulerState::Running,
        last_cycle_at: Some(ts("2024-01-10T05:00:00Z")),
        last_cycle_failures: 2,
    });

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["service"], "candlecast-worker");
    assert_eq!(body["scheduler_state"], "running");
    assert_eq!(body["last_cycle_failures"], 2);
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert!(body["last_cycle_at"].as_str().unwrap().starts_with("2024-01-10T05:00:00"));
}

#[tokio::test]
async fn health_endpoint_before_first_cycle() {
    let (server, _) = test_server(HealthStatus::default());

    let body: Value = server.get("/health").await.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["scheduler_state"], "idle");
    assert!(body["last_cycle_at"].is_null());
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let (server, metrics) = test_server(HealthStatus::default());
    metrics.cycles_total.inc();

    server.get("/health").await;
    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    assert!(body.contains("pipeline_cycles_total 1"), "{}", body);
    assert!(body.contains("http_requests_total"), "Expected Prometheus metrics output");
}
