//! Lifecycle state machine tests: start, restart, drain isolation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use futures_util::future::join_all;
use pool_warden::{Lifecycle, PoolHandle, PoolReadiness};
use pool_warden_testing::{
    MockDirect, MockPool, init_tracing, manager, manager_with, test_config, test_target,
};

fn lifecycle(pool: &MockPool) -> Lifecycle<pool_warden_testing::MockPoolFactory> {
    init_tracing();
    Lifecycle::new(PoolHandle::new(pool.factory(), &test_target(), 4), false)
}

// =============================================================================
// start()
// =============================================================================

#[tokio::test]
async fn test_new_lifecycle_is_initializing_and_untouched() {
    let pool = MockPool::new();
    let lifecycle = lifecycle(&pool);

    assert_eq!(lifecycle.readiness(), PoolReadiness::Initializing);
    assert_eq!(pool.constructions(), 0);
    assert_eq!(pool.init_calls(), 0);
}

#[tokio::test]
async fn test_start_settles_available() {
    let pool = MockPool::new();
    let lifecycle = lifecycle(&pool);

    assert_eq!(lifecycle.start().await, Some(PoolReadiness::Available));
    assert_eq!(lifecycle.readiness(), PoolReadiness::Available);
    assert_eq!(pool.max_size(), 4);
}

#[tokio::test]
async fn test_start_settles_unavailable_on_init_failure() {
    let pool = MockPool::new();
    pool.script(|s| s.init_fails = true);
    let lifecycle = lifecycle(&pool);

    assert_eq!(lifecycle.start().await, Some(PoolReadiness::Unavailable));
    assert_eq!(lifecycle.readiness(), PoolReadiness::Unavailable);
}

#[tokio::test]
async fn test_restart_during_cold_start_is_ignored() {
    let pool = MockPool::new();
    let lifecycle = lifecycle(&pool);

    assert!(lifecycle.request_restart().is_none());
    assert!(lifecycle.restart().await.is_none());
    assert_eq!(pool.take_idle_calls(), 0);
}

#[tokio::test]
async fn test_concurrent_cold_starts_initialize_once() {
    let pool = MockPool::new();
    let lifecycle = lifecycle(&pool);

    let gate = pool.gate_init();
    let first = tokio::spawn({
        let lifecycle = lifecycle.clone();
        async move { lifecycle.start().await }
    });
    tokio::task::yield_now().await;

    assert_eq!(lifecycle.start().await, None);
    gate.add_permits(1);
    assert_eq!(first.await.unwrap(), Some(PoolReadiness::Available));
    pool.ungate_init();

    assert_eq!(pool.init_calls(), 1);
    assert_eq!(lifecycle.readiness(), PoolReadiness::Available);
}

#[tokio::test]
async fn test_start_during_restart_is_skipped() {
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;
    pool.seed_idle(2);

    let gate = pool.gate_init();
    let restart = manager.restart().expect("pool was available");
    let start = tokio::spawn({
        let lifecycle = manager.lifecycle().clone();
        async move { lifecycle.start().await }
    });
    gate.add_permits(2);

    assert_eq!(start.await.unwrap(), None);
    assert_eq!(restart.await.unwrap(), PoolReadiness::Available);
    pool.ungate_init();

    assert_eq!(manager.readiness(), PoolReadiness::Available);
    assert_eq!(pool.init_calls(), 2, "only the restart reinitialized");
    assert_eq!(pool.take_idle_calls(), 1);
    assert_eq!(pool.close_log().total(), 2);
}

#[tokio::test]
async fn test_start_after_settling_reinitializes() {
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;

    assert_eq!(
        manager.lifecycle().start().await,
        Some(PoolReadiness::Available)
    );
    assert_eq!(pool.init_calls(), 2);
    assert_eq!(pool.take_idle_calls(), 0);
}

#[test]
fn test_restart_outside_runtime_is_skipped() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = runtime.block_on(manager(&pool, &direct));

    assert!(manager.restart().is_none());
    assert_eq!(manager.readiness(), PoolReadiness::Available);
    assert_eq!(manager.stats().restarts_requested, 0);
}

// =============================================================================
// restart()
// =============================================================================

#[tokio::test]
async fn test_restart_drains_then_reinitializes() {
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;
    pool.seed_idle(2);

    assert_eq!(manager.restart_now().await, Some(PoolReadiness::Available));
    assert_eq!(pool.idle_len(), 0);
    assert_eq!(pool.close_log().total(), 2);
    assert_eq!(pool.init_calls(), 2);
    assert_eq!(pool.constructions(), 1, "primitive is reused by default");

    let stats = manager.stats();
    assert_eq!(stats.restarts_requested, 1);
    assert_eq!(stats.restarts_completed, 1);
}

#[tokio::test]
async fn test_restart_moves_unavailable_to_available() {
    let pool = MockPool::new();
    pool.script(|s| s.init_fails = true);
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;
    assert_eq!(manager.readiness(), PoolReadiness::Unavailable);

    pool.script(|s| s.init_fails = false);
    assert_eq!(manager.restart_now().await, Some(PoolReadiness::Available));
    assert!(manager.is_available());
}

#[tokio::test]
async fn test_redundant_background_restarts_drain_once() {
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;
    pool.seed_idle(3);

    let gate = pool.gate_init();
    let handles: Vec<_> = (0..10).map(|_| manager.restart()).collect();

    let started: Vec<_> = handles.into_iter().flatten().collect();
    assert_eq!(started.len(), 1);
    assert_eq!(manager.readiness(), PoolReadiness::Initializing);

    gate.add_permits(1);
    for handle in started {
        assert_eq!(handle.await.unwrap(), PoolReadiness::Available);
    }
    pool.ungate_init();

    assert_eq!(pool.take_idle_calls(), 1);
    assert_eq!(pool.close_log().total(), 3);
    assert_eq!(manager.stats().restarts_requested, 1);
}

#[tokio::test]
async fn test_concurrent_inline_restarts_settle_once() {
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;

    let gate = pool.gate_init();
    let (results, ()) = tokio::join!(
        join_all((0..8).map(|_| manager.restart_now())),
        async {
            tokio::task::yield_now().await;
            gate.add_permits(1);
        }
    );
    pool.ungate_init();

    let settled: Vec<_> = results.into_iter().flatten().collect();
    assert_eq!(settled, vec![PoolReadiness::Available]);
    assert_eq!(pool.take_idle_calls(), 1);
    assert_eq!(manager.readiness(), PoolReadiness::Available);
}

// =============================================================================
// Drain failure isolation
// =============================================================================

#[tokio::test]
async fn test_failing_close_does_not_abort_drain() {
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;

    pool.seed_idle(1);
    pool.script(|s| s.close_fails = true);
    pool.seed_idle(1);
    pool.script(|s| s.close_fails = false);
    pool.seed_idle(1);

    assert_eq!(manager.restart_now().await, Some(PoolReadiness::Available));
    assert_eq!(pool.close_log().total(), 3, "every idle connection was attempted");
    assert_eq!(pool.idle_len(), 0);
}

#[tokio::test]
async fn test_unreadable_idle_set_still_reinitializes() {
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;
    pool.script(|s| s.take_idle_fails = true);

    assert_eq!(manager.restart_now().await, Some(PoolReadiness::Available));
    assert_eq!(pool.init_calls(), 2);
}

#[tokio::test]
async fn test_panicking_close_does_not_wedge_restart() {
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;

    pool.script(|s| s.close_panics = true);
    pool.seed_idle(1);
    pool.script(|s| s.close_panics = false);

    assert_eq!(manager.restart_now().await, Some(PoolReadiness::Available));
    assert_eq!(manager.stats().restarts_completed, 1);
}

// =============================================================================
// Primitive replacement
// =============================================================================

#[tokio::test]
async fn test_replace_on_restart_rebuilds_primitive() {
    let pool = MockPool::new();
    let direct = MockDirect::new();
    let manager = manager_with(test_config().replace_on_restart(true), &pool, &direct).await;
    assert_eq!(pool.constructions(), 1);

    assert_eq!(manager.restart_now().await, Some(PoolReadiness::Available));
    assert_eq!(pool.constructions(), 2);
    assert!(manager.lifecycle().handle().is_constructed());
}

#[tokio::test]
async fn test_failed_construction_recovers_on_restart() {
    let pool = MockPool::new();
    pool.script(|s| s.construct_fails = true);
    let direct = MockDirect::new();
    let manager = manager(&pool, &direct).await;
    assert_eq!(manager.readiness(), PoolReadiness::Unavailable);
    assert_eq!(pool.init_calls(), 0);

    pool.script(|s| s.construct_fails = false);
    assert_eq!(manager.restart_now().await, Some(PoolReadiness::Available));
    assert_eq!(pool.constructions(), 1);
}
