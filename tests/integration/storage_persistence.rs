//! SQLite backed engine state
//!
//! Registry, cache and status live in the database file, so they survive a
//! restart and are shared by every process opening the same file.

use std::sync::Arc;
use std::time::Duration;

use montool::config::{PollerConfig, StorageConfig};
use montool::engine::Engine;
use montool::storage::sqlite::SqliteBackend;
use montool::storage::{self, MonitoringRegistry, ServerDirectory, StatsCache, Stores};
use montool::{Owner, OwnerId, ServerId, ServerStatus};
use tempfile::tempdir;

use crate::helpers::*;

async fn seeded_sqlite(path: &std::path::Path, vault: &montool::vault::Vault) -> SqliteBackend {
    let backend = SqliteBackend::new(path).await.unwrap();
    backend
        .insert_owner(&Owner {
            id: OwnerId(1),
            chat_id: None,
        })
        .await
        .unwrap();
    backend
        .insert_server(&test_server(1, "10.0.0.1", 1, vault))
        .await
        .unwrap();
    backend
}

#[tokio::test]
async fn test_engine_over_sqlite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("engine.db");
    let vault = test_vault();
    let backend = Arc::new(seeded_sqlite(&path, &vault).await);
    let executor = Arc::new(ScriptedExecutor::always("10.0.0.1", reference_stats()));
    let engine = Engine::new(
        Stores::from_backend(backend.clone()),
        vault,
        executor.clone(),
        PollerConfig::default(),
    );

    let token = engine.start_polling(ServerId(1)).await.unwrap();

    let mut cached = None;
    for _ in 0..50 {
        cached = engine.cached_stats(ServerId(1)).await.unwrap();
        if cached.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(cached, Some(reference_stats()));
    assert!(backend.is_current(ServerId(1), &token).await.unwrap());

    engine.stop_polling(ServerId(1)).await.unwrap();
    assert!(!backend.is_current(ServerId(1), &token).await.unwrap());
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reopen.db");
    let vault = test_vault();

    let token = {
        let backend = seeded_sqlite(&path, &vault).await;
        backend
            .update_status(ServerId(1), ServerStatus::Poor)
            .await
            .unwrap();
        backend
            .put(ServerId(1), &reference_stats(), Duration::from_secs(3600))
            .await
            .unwrap();
        let token = backend.start(ServerId(1)).await.unwrap();
        backend.close().await;
        token
    };

    let stores = storage::open(&StorageConfig::Sqlite { path: path.clone() })
        .await
        .unwrap();

    let server = stores.directory.fetch_server(ServerId(1)).await.unwrap().unwrap();
    assert_eq!(server.status, ServerStatus::Poor);
    assert_eq!(
        stores.cache.get(ServerId(1)).await.unwrap(),
        Some(reference_stats())
    );
    assert!(stores.registry.is_current(ServerId(1), &token).await.unwrap());
}

#[tokio::test]
async fn test_stop_from_another_process() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let vault = test_vault();
    let worker = Arc::new(seeded_sqlite(&path, &vault).await);
    let controller = SqliteBackend::new(&path).await.unwrap();

    let token = worker.start(ServerId(1)).await.unwrap();
    assert!(controller.is_current(ServerId(1), &token).await.unwrap());

    // a second start elsewhere supersedes the worker's loop
    let newer = controller.start(ServerId(1)).await.unwrap();
    assert!(!worker.is_current(ServerId(1), &token).await.unwrap());
    assert!(worker.is_current(ServerId(1), &newer).await.unwrap());

    controller.stop(ServerId(1)).await.unwrap();
    assert!(!worker.is_current(ServerId(1), &newer).await.unwrap());
}

#[tokio::test]
async fn test_memory_backend_from_config() {
    let stores = storage::open(&StorageConfig::None).await.unwrap();
    assert!(stores.directory.list_servers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleted_server_row_releases_registry_entry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("deleted.db");
    let vault = test_vault();
    let backend = Arc::new(seeded_sqlite(&path, &vault).await);
    let engine = Engine::new(
        Stores::from_backend(backend.clone()),
        vault,
        Arc::new(ScriptedExecutor::always("10.0.0.1", reference_stats())),
        PollerConfig {
            interval_secs: 1,
            ..PollerConfig::default()
        },
    );

    let token = engine.start_polling(ServerId(1)).await.unwrap();

    // a collaborator deletes the row without touching the registry
    let pool = sqlx::SqlitePool::connect(&format!("sqlite://{}", path.display()))
        .await
        .unwrap();
    sqlx::query("DELETE FROM servers WHERE id = ?")
        .bind(1i64)
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let mut released = false;
    for _ in 0..50 {
        if !backend.is_current(ServerId(1), &token).await.unwrap() {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(released, "registry entry of the deleted server was kept");
}
