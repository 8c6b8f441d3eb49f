//! Concurrent start and stop triggers
//!
//! Collaborators may fire start and stop for the same server from several
//! requests at once; the registry must still converge to at most one loop.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use montool::ServerId;
use montool::storage::{MemoryBackend, MonitoringRegistry};

use crate::helpers::*;

#[tokio::test]
async fn test_concurrent_starts_leave_one_current_token() {
    let backend = Arc::new(MemoryBackend::new());

    let tokens = join_all((0..20).map(|_| backend.start(ServerId(1)))).await;
    let tokens: Vec<_> = tokens.into_iter().map(Result::unwrap).collect();

    let mut current = 0;
    for token in &tokens {
        if backend.is_current(ServerId(1), token).await.unwrap() {
            current += 1;
        }
    }
    assert_eq!(current, 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_engine_starts_converge() {
    let vault = test_vault();
    let backend = seeded_backend(&[(1, "10.0.0.1", 1)], &vault).await;
    let executor = Arc::new(ScriptedExecutor::always("10.0.0.1", reference_stats()));
    let engine = test_engine(backend, vault, executor.clone());

    let started = join_all((0..5).map(|_| engine.start_polling(ServerId(1)))).await;
    assert!(started.iter().all(Result::is_ok));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(executor.calls(), 5);

    // after one check only a single loop is left
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(executor.calls(), 6);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(executor.calls(), 7);

    engine.stop_polling(ServerId(1)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_servers_poll_independently() {
    let vault = test_vault();
    let servers: Vec<(i64, String)> = (1..=10).map(|id| (id, format!("10.0.1.{id}"))).collect();
    let refs: Vec<(i64, &str, i64)> = servers
        .iter()
        .map(|(id, address)| (*id, address.as_str(), 1))
        .collect();
    let backend = seeded_backend(&refs, &vault).await;

    let executor = Arc::new(ScriptedExecutor::new(
        servers
            .iter()
            .map(|(_, address)| (address.clone(), Script::Stats(reference_stats()))),
    ));
    let engine = test_engine(backend, vault, executor.clone());

    for id in 1..=10 {
        engine.start_polling(ServerId(id)).await.unwrap();
    }
    engine.stop_polling(ServerId(3)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;

    assert_eq!(executor.calls_for("10.0.1.3"), 1);
    for (_, address) in servers.iter().filter(|(id, _)| *id != 3) {
        assert_eq!(executor.calls_for(address), 2, "{address}");
    }
}
