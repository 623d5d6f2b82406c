//! # pool-warden-testing
//!
//! Test infrastructure for pool-warden.
//!
//! Provides scripted stand-ins for the driver collaborators so the
//! acquisition pipeline and lifecycle can be exercised without a database:
//!
//! - [`MockPool`] / [`MockPoolFactory`]: in-memory pool primitive with
//!   idle/in-use sets per target and switchable failures
//! - [`MockDirect`]: direct provider that can be told to fail
//! - [`MockConnection`]: connection with a scripted probe reply and a shared
//!   [`CloseLog`] so tests can assert each connection is closed exactly once
//!
//! The pool-warden integration tests live in this crate's `tests/`
//! directory, which keeps pool-warden free of a dev-dependency cycle.

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod mock_connection;
mod mock_direct;
mod mock_pool;

pub use mock_connection::{CloseLog, MockConnection, Origin, ProbeReply};
pub use mock_direct::{DIRECT_ID_BASE, MockDirect};
pub use mock_pool::{MockPool, MockPoolFactory, OpenBehavior, Script};

use pool_warden::{ConnectionTarget, PoolConfig, PoolManager, PoolReadiness};

/// Manager type built by [`manager`].
pub type MockManager = PoolManager<MockPoolFactory, MockDirect>;

/// Route tracing output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Target used by the integration tests.
pub fn test_target() -> ConnectionTarget {
    ConnectionTarget::new()
        .host("db.test")
        .port(50000)
        .database("sample")
        .credentials("app", "secret")
}

/// Configuration used by the integration tests.
pub fn test_config() -> PoolConfig {
    PoolConfig::new(test_target()).max_size(4)
}

/// Build a manager over `pool` and `direct` with [`test_config`].
pub async fn manager(pool: &MockPool, direct: &MockDirect) -> MockManager {
    manager_with(test_config(), pool, direct).await
}

/// Build a manager over `pool` and `direct` with `config`.
///
/// # Panics
///
/// Panics when `config` is invalid.
#[allow(clippy::expect_used)]
pub async fn manager_with(config: PoolConfig, pool: &MockPool, direct: &MockDirect) -> MockManager {
    init_tracing();
    PoolManager::new(config, pool.factory(), direct.clone())
        .await
        .expect("test configuration is valid")
}

/// Yield until readiness leaves `Initializing`, returning where it settled.
///
/// Background restarts run on the test's runtime, so they only make
/// progress while the test yields.
///
/// # Panics
///
/// Panics if readiness does not settle within a bounded number of yields.
#[allow(clippy::panic)]
pub async fn wait_settled(manager: &MockManager) -> PoolReadiness {
    for _ in 0..1_000 {
        let readiness = manager.readiness();
        if readiness != PoolReadiness::Initializing {
            return readiness;
        }
        tokio::task::yield_now().await;
    }
    panic!("pool readiness did not settle");
}
