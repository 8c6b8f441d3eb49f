//! Integration tests for the control and read API
//!
//! A real server is bound to a random local port and driven over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use montool::api::{ApiState, spawn_api_server};
use montool::config::ApiSettings;
use montool::storage::{MemoryBackend, ServerDirectory};
use montool::{ServerId, ServerStatus};
use serde_json::Value;

use crate::helpers::*;

const TOKEN: &str = "test-token";

async fn spawn_test_api(
    backend: Arc<MemoryBackend>,
    executor: Arc<ScriptedExecutor>,
    vault: Arc<montool::vault::Vault>,
) -> SocketAddr {
    let engine = test_engine(backend, vault, executor);
    let settings = ApiSettings {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        enable_cors: true,
    };

    spawn_api_server(&settings, Some(TOKEN.to_string()), ApiState::new(engine))
        .await
        .unwrap()
}

async fn setup() -> (SocketAddr, Arc<MemoryBackend>, Arc<ScriptedExecutor>) {
    let vault = test_vault();
    let backend = seeded_backend(&[(1, "10.0.0.1", 1), (2, "10.0.0.2", 2)], &vault).await;
    let executor = Arc::new(ScriptedExecutor::always("10.0.0.1", reference_stats()));
    let addr = spawn_test_api(backend.clone(), executor.clone(), vault).await;
    (addr, backend, executor)
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let (addr, _, _) = setup().await;

    let response = client()
        .get(format!("http://{addr}/api/v1/health"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_endpoint_needs_no_token() {
    let (addr, _, _) = setup().await;

    let response = client()
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_required() {
    let (addr, _, _) = setup().await;
    let url = format!("http://{addr}/api/v1/servers");

    let missing = client().get(&url).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let malformed = client()
        .get(&url)
        .header("Authorization", TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);

    let wrong = client().get(&url).bearer_auth("nope").send().await.unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_servers() {
    let (addr, backend, _) = setup().await;
    backend
        .update_status(ServerId(1), ServerStatus::Excellent)
        .await
        .unwrap();

    let json: Value = client()
        .get(format!("http://{addr}/api/v1/servers"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["count"], 2);
    // newest first
    assert_eq!(json["servers"][0]["id"], 2);
    assert_eq!(json["servers"][1]["address"], "10.0.0.1");
    assert_eq!(json["servers"][1]["status"], "excellent");
    assert_eq!(json["servers"][1]["status_label"], "🌟Excellent");
    assert_eq!(json["servers"][1]["os"], "Linux");
}

#[tokio::test]
async fn test_stats_unknown_before_first_poll() {
    let (addr, _, _) = setup().await;

    let response = client()
        .get(format!("http://{addr}/api/v1/servers/2/stats"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["free_memory_mb"], "unknown");
    assert_eq!(json["free_disk_gb"], "unknown");
    assert_eq!(json["cpu_load"], "unknown");
    assert_eq!(json["status"], "unknown");
}

#[tokio::test]
async fn test_start_poll_read_stop() {
    let (addr, _, executor) = setup().await;
    let monitoring = format!("http://{addr}/api/v1/servers/1/monitoring");

    let response = client()
        .post(&monitoring)
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = response.json().await.unwrap();
    assert_eq!(json["monitoring"], true);
    assert!(json["token"].is_string());

    let mut stats = Value::Null;
    for _ in 0..50 {
        stats = client()
            .get(format!("http://{addr}/api/v1/servers/1/stats"))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if stats["free_memory_mb"] != "unknown" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stats["free_memory_mb"], 2048);
    assert_eq!(stats["free_disk_gb"], 15.5);
    assert_eq!(stats["cpu_load"], "0.42");
    assert_eq!(stats["cpu_load_kind"], "load_average");
    assert_eq!(executor.calls(), 1);

    for _ in 0..2 {
        let response = client()
            .delete(&monitoring)
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = response.json().await.unwrap();
        assert_eq!(json["monitoring"], false);
    }
}

#[tokio::test]
async fn test_unknown_server_is_not_found() {
    let (addr, _, _) = setup().await;

    let start = client()
        .post(format!("http://{addr}/api/v1/servers/99/monitoring"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(start.status(), StatusCode::NOT_FOUND);
    let json: Value = start.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("99"));

    let stats = client()
        .get(format!("http://{addr}/api/v1/servers/99/stats"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(stats.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_numeric_id_rejected() {
    let (addr, _, _) = setup().await;

    let response = client()
        .get(format!("http://{addr}/api/v1/servers/abc/stats"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
