//! End-to-end tests of the per-server polling loop
//!
//! Time is paused, so the 30 s interval and the 3600 s TTL elapse instantly
//! and deterministically.

use std::sync::Arc;
use std::time::Duration;

use montool::ServerId;
use montool::storage::{MonitoringRegistry, StatsCache};
use pretty_assertions::assert_eq;

use crate::helpers::*;

const S: ServerId = ServerId(1);

#[tokio::test(start_paused = true)]
async fn test_poll_caches_stats_and_stops() {
    let vault = test_vault();
    let backend = seeded_backend(&[(1, "10.0.0.1", 1)], &vault).await;
    let executor = Arc::new(ScriptedExecutor::always("10.0.0.1", reference_stats()));
    let engine = test_engine(backend.clone(), vault, executor.clone());

    engine.start_polling(S).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(backend.get(S).await.unwrap(), Some(reference_stats()));
    assert_eq!(engine.cached_stats(S).await.unwrap(), Some(reference_stats()));
    assert_eq!(executor.calls(), 1);

    engine.stop_polling(S).await.unwrap();

    // the loop notices at its next check and never collects again
    tokio::time::sleep(Duration::from_secs(3598)).await;
    assert_eq!(executor.calls(), 1);
    assert_eq!(backend.get(S).await.unwrap(), Some(reference_stats()));

    // the single write expires 3600 s after it was made
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.get(S).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_polls_every_thirty_seconds() {
    let vault = test_vault();
    let backend = seeded_backend(&[(1, "10.0.0.1", 1)], &vault).await;
    let executor = Arc::new(ScriptedExecutor::always("10.0.0.1", reference_stats()));
    let engine = test_engine(backend, vault, executor.clone());

    engine.start_polling(S).await.unwrap();

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(executor.calls(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(executor.calls(), 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(executor.calls(), 4);

    engine.stop_polling(S).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_double_start_converges_to_one_loop() {
    let vault = test_vault();
    let backend = seeded_backend(&[(1, "10.0.0.1", 1)], &vault).await;
    let executor = Arc::new(ScriptedExecutor::always("10.0.0.1", reference_stats()));
    let engine = test_engine(backend.clone(), vault, executor.clone());

    let first = engine.start_polling(S).await.unwrap();
    let second = engine.start_polling(S).await.unwrap();
    assert!(!backend.is_current(S, &first).await.unwrap());
    assert!(backend.is_current(S, &second).await.unwrap());

    // both loops poll once, then only the newer one survives its check
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(executor.calls(), 2);

    tokio::time::sleep(Duration::from_secs(94)).await;
    assert_eq!(executor.calls(), 5);

    engine.stop_polling(S).await.unwrap();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(executor.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let vault = test_vault();
    let backend = seeded_backend(&[(1, "10.0.0.1", 1)], &vault).await;
    let executor = Arc::new(ScriptedExecutor::always("10.0.0.1", reference_stats()));
    let engine = test_engine(backend, vault, executor.clone());

    engine.start_polling(S).await.unwrap();
    engine.stop_polling(S).await.unwrap();
    engine.start_polling(S).await.unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    // two polls at t=0, then the restarted loop alone at 30 and 60
    assert_eq!(executor.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_loop_is_noop() {
    let vault = test_vault();
    let backend = seeded_backend(&[(1, "10.0.0.1", 1)], &vault).await;
    let executor = Arc::new(ScriptedExecutor::empty());
    let engine = test_engine(backend, vault, executor.clone());

    engine.stop_polling(S).await.unwrap();
    engine.stop_polling(ServerId(404)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(executor.calls(), 0);
}
