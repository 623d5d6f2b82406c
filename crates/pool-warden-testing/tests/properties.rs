//! Property tests for readiness gating, probe classification, restart
//! guarding and best-effort counts.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use pool_warden::{Connection, LivenessProbe, PoolReadiness, ProbeConfig, Row, Value};
use pool_warden_testing::{MockDirect, MockPool, Origin, ProbeReply, manager, wait_settled};
use proptest::prelude::*;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

// Case count follows PROPTEST_CASES; see `cargo xtask proptest`.
proptest! {
    /// No acquisition reaches `open` while the pool cannot initialize.
    #[test]
    fn prop_unavailable_pool_is_never_opened(calls in 1usize..20, yield_between in any::<bool>()) {
        block_on(async {
            let pool = MockPool::new();
            pool.script(|s| s.init_fails = true);
            let direct = MockDirect::new();
            let manager = manager(&pool, &direct).await;

            for _ in 0..calls {
                let conn = manager.get_connection().await.unwrap();
                assert_eq!(conn.origin(), Origin::Direct);
                if yield_between {
                    wait_settled(&manager).await;
                }
            }

            assert_eq!(pool.open_calls(), 0);
            assert_eq!(direct.opens(), calls);
        });
    }

    /// Any probe value other than the expected literal is rejected, and the
    /// rejected connection is closed exactly once.
    #[test]
    fn prop_wrong_probe_value_closes_once(value in any::<i64>().prop_filter("live value", |v| *v != 1)) {
        block_on(async {
            let pool = MockPool::new();
            pool.script(|s| s.reply = ProbeReply::Value(value));
            let direct = MockDirect::new();
            let manager = manager(&pool, &direct).await;

            let conn = manager.get_connection().await.unwrap();
            assert_eq!(conn.origin(), Origin::Direct);
            assert_eq!(pool.close_log().times_closed(1), 1);
            assert_eq!(manager.stats().stale_rejections, 1);
        });
    }

    /// Result sets with anything but exactly one row are not live.
    #[test]
    fn prop_row_count_other_than_one_is_not_live(
        values in proptest::collection::vec(any::<i64>(), 0..6)
            .prop_filter("single row", |v| v.len() != 1)
    ) {
        let probe = LivenessProbe::new(ProbeConfig::default());
        let rows: Vec<Row> = values.iter().map(|v| Row::new().with("1", Value::Int(*v))).collect();
        prop_assert!(probe.classify(&rows).is_err());
    }

    /// Any number of restart requests during one cycle start exactly one
    /// restart, drain once, and settle in a terminal state.
    #[test]
    fn prop_redundant_restarts_settle_once(requests in 1usize..16, init_fails in any::<bool>(), idle in 0usize..4) {
        block_on(async {
            let pool = MockPool::new();
            let direct = MockDirect::new();
            let manager = manager(&pool, &direct).await;
            pool.seed_idle(idle);
            pool.script(|s| s.init_fails = init_fails);

            let gate = pool.gate_init();
            let started: Vec<_> = (0..requests).filter_map(|_| manager.restart()).collect();
            assert_eq!(started.len(), 1);
            assert_eq!(manager.readiness(), PoolReadiness::Initializing);

            gate.add_permits(1);
            let mut settled = Vec::new();
            for handle in started {
                settled.push(handle.await.unwrap());
            }
            pool.ungate_init();

            let expected = if init_fails {
                PoolReadiness::Unavailable
            } else {
                PoolReadiness::Available
            };
            assert_eq!(settled, vec![expected]);
            assert_eq!(manager.readiness(), expected);
            assert_eq!(pool.take_idle_calls(), 1);
            assert_eq!(pool.close_log().total(), idle);
        });
    }

    /// Counts are consistent when readable and all zero when not; neither
    /// lookup ever fails.
    #[test]
    fn prop_counts_are_consistent_or_zero(
        acquire in 0usize..4,
        release in 0usize..4,
        unreadable in any::<bool>(),
    ) {
        block_on(async {
            let pool = MockPool::new();
            let direct = MockDirect::new();
            let manager = manager(&pool, &direct).await;

            let mut held = Vec::new();
            for _ in 0..acquire {
                held.push(manager.get_connection().await.unwrap());
            }
            let release = release.min(held.len());
            for conn in held.drain(..release) {
                conn.close().await.unwrap();
            }
            pool.script(|s| s.counts_fail = unreadable);

            let counts = manager.connection_counts();
            assert_eq!(counts.total, counts.used + counts.available);
            if unreadable {
                assert_eq!(counts.total, 0);
                assert!(!manager.has_active_connections());
            } else {
                assert_eq!(counts.used, acquire - release);
                assert_eq!(counts.available, release);
                assert_eq!(manager.has_active_connections(), acquire > release);
            }
        });
    }
}
