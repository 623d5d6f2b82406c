//! Pool status snapshots and acquisition statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of pooled connection counts for the target.
///
/// Best-effort: when the primitive cannot be read, every field is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionCounts {
    /// Connections currently handed out.
    pub used: usize,
    /// Idle connections ready for reuse.
    pub available: usize,
    /// `used + available`.
    pub total: usize,
}

impl ConnectionCounts {
    /// Build a snapshot from in-use and idle counts.
    #[must_use]
    pub fn new(used: usize, available: usize) -> Self {
        Self {
            used,
            available,
            total: used.saturating_add(available),
        }
    }

    /// Percentage of `max` currently in use.
    #[must_use]
    pub fn utilization(&self, max: u32) -> f64 {
        if max == 0 {
            return 0.0;
        }
        (self.used as f64 / f64::from(max)) * 100.0
    }

    /// Whether the pool holds `max` or more connections.
    #[must_use]
    pub fn is_at_capacity(&self, max: u32) -> bool {
        self.total >= max as usize
    }
}

/// Internal counters for the acquisition pipeline.
#[derive(Debug, Default)]
pub(crate) struct AtomicAcquisitionStats {
    pool_hits: AtomicU64,
    gated: AtomicU64,
    pool_failures: AtomicU64,
    stale_rejections: AtomicU64,
    direct_fallbacks: AtomicU64,
    direct_failures: AtomicU64,
    restarts_requested: AtomicU64,
    restarts_completed: AtomicU64,
}

impl AtomicAcquisitionStats {
    pub(crate) fn record_pool_hit(&self) {
        self.pool_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_gated(&self) {
        self.gated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pool_failure(&self) {
        self.pool_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale(&self) {
        self.stale_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_direct(&self, ok: bool) {
        if ok {
            self.direct_fallbacks.fetch_add(1, Ordering::Relaxed);
        } else {
            self.direct_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_restart_requested(&self) {
        self.restarts_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_restart_completed(&self) {
        self.restarts_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> AcquisitionStats {
        AcquisitionStats {
            pool_hits: self.pool_hits.load(Ordering::Relaxed),
            gated: self.gated.load(Ordering::Relaxed),
            pool_failures: self.pool_failures.load(Ordering::Relaxed),
            stale_rejections: self.stale_rejections.load(Ordering::Relaxed),
            direct_fallbacks: self.direct_fallbacks.load(Ordering::Relaxed),
            direct_failures: self.direct_failures.load(Ordering::Relaxed),
            restarts_requested: self.restarts_requested.load(Ordering::Relaxed),
            restarts_completed: self.restarts_completed.load(Ordering::Relaxed),
        }
    }
}

/// Counters collected since the manager was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    /// Connections served from the pool.
    pub pool_hits: u64,
    /// Acquisitions that skipped the pool because it was not available.
    pub gated: u64,
    /// Pool opens that failed.
    pub pool_failures: u64,
    /// Pooled connections rejected by the liveness probe.
    pub stale_rejections: u64,
    /// Connections served by the direct provider.
    pub direct_fallbacks: u64,
    /// Direct opens that failed.
    pub direct_failures: u64,
    /// Restarts actually started (redundant requests are not counted).
    pub restarts_requested: u64,
    /// Restarts that ran to completion.
    pub restarts_completed: u64,
}

impl AcquisitionStats {
    /// Total `get_connection` calls that returned a connection.
    #[must_use]
    pub fn served(&self) -> u64 {
        self.pool_hits + self.direct_fallbacks
    }

    /// Fraction of served connections that came from the pool (0.0 to 1.0).
    #[must_use]
    pub fn pool_hit_rate(&self) -> f64 {
        let served = self.served();
        if served == 0 {
            return 1.0;
        }
        self.pool_hits as f64 / served as f64
    }
}
