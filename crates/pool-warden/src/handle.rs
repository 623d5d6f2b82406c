//! Thin wrapper around the driver's pool primitive.
//!
//! The handle owns the target descriptor and the maximum size, builds the
//! primitive lazily through its [`PoolFactory`], and turns every primitive
//! call into either a [`PoolError`] or a best-effort answer. It never
//! touches readiness; that belongs to the lifecycle module.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::RwLock;

use crate::config::ConnectionTarget;
use crate::connection::{Connection, OpenFailure, PoolFactory, PoolPrimitive, close_quietly};
use crate::error::{DriverError, PoolError};
use crate::status::ConnectionCounts;

type PoolOf<F> = <F as PoolFactory>::Pool;
type ConnOf<F> = <PoolOf<F> as PoolPrimitive>::Connection;

/// Outcome of [`PoolHandle::drain_idle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Idle connections closed cleanly.
    pub closed: usize,
    /// Idle connections whose close failed (logged and dropped).
    pub failed: usize,
}

impl DrainReport {
    /// Number of idle connections the drain found.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.closed + self.failed
    }
}

/// Handle to the single pool primitive.
pub struct PoolHandle<F: PoolFactory> {
    factory: F,
    pool: RwLock<Option<Arc<PoolOf<F>>>>,
    descriptor: String,
    masked: String,
    max_size: u32,
}

impl<F: PoolFactory> PoolHandle<F> {
    /// Create a handle. The primitive itself is built on first
    /// [`initialize`](Self::initialize).
    pub fn new(factory: F, target: &ConnectionTarget, max_size: u32) -> Self {
        Self {
            factory,
            pool: RwLock::new(None),
            descriptor: target.to_connection_string(),
            masked: target.masked(),
            max_size,
        }
    }

    /// Configured maximum size.
    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Target descriptor with the password masked.
    #[must_use]
    pub fn target_masked(&self) -> &str {
        &self.masked
    }

    /// Whether the primitive has been constructed.
    #[must_use]
    pub fn is_constructed(&self) -> bool {
        self.pool.read().is_some()
    }

    fn current(&self) -> Option<Arc<PoolOf<F>>> {
        self.pool.read().clone()
    }

    fn get_or_create(&self) -> Result<Arc<PoolOf<F>>, PoolError> {
        let mut slot = self.pool.write();
        if let Some(pool) = slot.as_ref() {
            return Ok(pool.clone());
        }

        let pool = Arc::new(self.factory.create().map_err(PoolError::Initialization)?);
        pool.set_max_size(self.max_size);
        *slot = Some(pool.clone());

        tracing::debug!(max = self.max_size, "pool primitive constructed");
        Ok(pool)
    }

    /// Build the primitive if needed, then (re)run its initialization.
    ///
    /// Safe to call repeatedly.
    pub async fn initialize(&self) -> Result<(), PoolError> {
        let pool = self.get_or_create()?;
        pool.init(self.max_size, &self.descriptor)
            .await
            .map_err(PoolError::Initialization)
    }

    /// Request one connection from the primitive.
    ///
    /// A connection handed back together with an error is closed before the
    /// error is returned.
    pub async fn acquire_raw(&self) -> Result<ConnOf<F>, PoolError> {
        let Some(pool) = self.current() else {
            return Err(PoolError::ExhaustedOrClosed(DriverError::new(
                "pool primitive not constructed",
            )));
        };

        match pool.open(&self.descriptor).await {
            Ok(conn) => Ok(conn),
            Err(OpenFailure { error, partial }) => {
                if let Some(conn) = partial {
                    close_quietly(conn, "pool open failed").await;
                }
                Err(PoolError::ExhaustedOrClosed(error))
            }
        }
    }

    /// Close every idle connection for the target.
    ///
    /// Each close is independent; failures and panics are logged and
    /// counted, never propagated. Only failing to enumerate the idle set is
    /// an error.
    pub async fn drain_idle(&self) -> Result<DrainReport, PoolError> {
        let mut report = DrainReport::default();
        let Some(pool) = self.current() else {
            return Ok(report);
        };

        let idle = pool.take_idle(&self.descriptor).map_err(PoolError::Drain)?;
        for conn in idle {
            match AssertUnwindSafe(conn.close()).catch_unwind().await {
                Ok(Ok(())) => report.closed += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(error = %e, "failed to close idle connection during drain");
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::error!("idle connection panicked while closing during drain");
                }
            }
        }

        tracing::debug!(
            closed = report.closed,
            failed = report.failed,
            "idle connections drained"
        );
        Ok(report)
    }

    /// Pooled connection counts. Zero on any lookup failure.
    #[must_use]
    pub fn counts(&self) -> ConnectionCounts {
        let Some(pool) = self.current() else {
            return ConnectionCounts::default();
        };

        match (
            pool.in_use_count(&self.descriptor),
            pool.idle_count(&self.descriptor),
        ) {
            (Ok(used), Ok(available)) => ConnectionCounts::new(used, available),
            (Err(e), _) | (_, Err(e)) => {
                tracing::debug!(error = %e, "pool counts unavailable");
                ConnectionCounts::default()
            }
        }
    }

    /// Whether any pooled connection is checked out. False when the
    /// primitive cannot be read.
    #[must_use]
    pub fn has_active_connections(&self) -> bool {
        self.current()
            .and_then(|pool| pool.in_use_count(&self.descriptor).ok())
            .is_some_and(|used| used > 0)
    }

    /// Drop the primitive so the next [`initialize`](Self::initialize)
    /// builds a fresh one.
    pub(crate) fn discard(&self) {
        if self.pool.write().take().is_some() {
            tracing::debug!("pool primitive discarded");
        }
    }
}

impl<F: PoolFactory> std::fmt::Debug for PoolHandle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("target", &self.masked)
            .field("max_size", &self.max_size)
            .field("constructed", &self.is_constructed())
            .finish()
    }
}
