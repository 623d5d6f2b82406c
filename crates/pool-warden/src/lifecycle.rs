//! Pool lifecycle state machine.
//!
//! Every readiness transition happens here:
//!
//! ```text
//!                 start()
//!   Initializing ─────────┬──────────▶ Available
//!        ▲                └──────────▶ Unavailable
//!        │ restart()                        │
//!        └──────────────────────────────────┘
//! ```
//!
//! Both `start()` and a restart first claim the cycle under the state lock,
//! flipping readiness to `Initializing`. Only the claiming call settles
//! readiness; every other start or restart request is a no-op until that
//! cycle finishes, so concurrent callers never drain twice or settle over
//! each other.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::connection::PoolFactory;
use crate::handle::PoolHandle;
use crate::readiness::PoolReadiness;
use crate::status::AtomicAcquisitionStats;

/// Drives initialization and restarts of the pool primitive.
///
/// Cloning is cheap; clones share the same state.
pub struct Lifecycle<F: PoolFactory> {
    inner: Arc<LifecycleInner<F>>,
}

struct LifecycleInner<F: PoolFactory> {
    handle: PoolHandle<F>,
    state: Mutex<CycleState>,
    replace_on_restart: bool,
    stats: AtomicAcquisitionStats,
}

struct CycleState {
    readiness: PoolReadiness,
    /// Set while a start or restart owns the cycle.
    running: bool,
}

impl<F: PoolFactory> Clone for Lifecycle<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: PoolFactory> Lifecycle<F> {
    /// Wrap a handle. Readiness starts as `Initializing`; call
    /// [`start`](Self::start) to settle it.
    pub fn new(handle: PoolHandle<F>, replace_on_restart: bool) -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                handle,
                state: Mutex::new(CycleState {
                    readiness: PoolReadiness::Initializing,
                    running: false,
                }),
                replace_on_restart,
                stats: AtomicAcquisitionStats::default(),
            }),
        }
    }

    /// The pool handle.
    #[must_use]
    pub fn handle(&self) -> &PoolHandle<F> {
        &self.inner.handle
    }

    /// Current readiness.
    #[must_use]
    pub fn readiness(&self) -> PoolReadiness {
        self.inner.state.lock().readiness
    }

    pub(crate) fn stats(&self) -> &AtomicAcquisitionStats {
        &self.inner.stats
    }

    /// Settle readiness and release the cycle claim.
    fn settle(&self, next: PoolReadiness) {
        let mut state = self.inner.state.lock();
        let prev = state.readiness;
        if !prev.can_transition_to(next) {
            tracing::warn!(from = %prev, to = %next, "unexpected readiness transition");
        }
        state.readiness = next;
        state.running = false;
        drop(state);

        if prev != next {
            tracing::info!(from = %prev, to = %next, "pool readiness changed");
        }
    }

    /// Claim the cycle for an initial start. Fails while another start or
    /// restart owns it.
    fn begin_start(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.running {
            return false;
        }
        state.running = true;
        state.readiness = PoolReadiness::Initializing;
        true
    }

    /// Claim the cycle for a restart. Fails while any cycle is running, and
    /// during a cold start that has not settled yet.
    fn begin_restart(&self) -> bool {
        let mut state = self.inner.state.lock();
        let prev = state.readiness;
        if state.running || prev == PoolReadiness::Initializing {
            return false;
        }
        state.running = true;
        state.readiness = PoolReadiness::Initializing;
        drop(state);

        self.inner.stats.record_restart_requested();
        tracing::info!(from = %prev, "pool restart started");
        true
    }

    /// Initialize the pool and settle readiness.
    ///
    /// Sets `Initializing`, runs [`PoolHandle::initialize`], then settles on
    /// `Available` or `Unavailable`. Initialization errors are logged, never
    /// returned; callers discover them through readiness.
    ///
    /// Returns `None` without touching the pool when a start or restart is
    /// already running.
    pub async fn start(&self) -> Option<PoolReadiness> {
        if !self.begin_start() {
            tracing::debug!("pool start skipped, cycle already running");
            return None;
        }
        Some(self.initialize_and_settle().await)
    }

    /// Run initialization for a claimed cycle.
    async fn initialize_and_settle(&self) -> PoolReadiness {
        let next = match self.inner.handle.initialize().await {
            Ok(()) => {
                tracing::info!(
                    target_db = %self.inner.handle.target_masked(),
                    max = self.inner.handle.max_size(),
                    "connection pool initialized"
                );
                PoolReadiness::Available
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    target_db = %self.inner.handle.target_masked(),
                    "connection pool unavailable"
                );
                PoolReadiness::Unavailable
            }
        };

        self.settle(next);
        next
    }

    /// Schedule a restart on the Tokio runtime and return immediately.
    ///
    /// Readiness is `Initializing` by the time this returns. Returns `None`
    /// when a restart (or the initial start) is already in progress, or when
    /// called outside a Tokio runtime; in the latter case nothing changes.
    pub fn request_restart(&self) -> Option<JoinHandle<PoolReadiness>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("pool restart skipped, no Tokio runtime");
            return None;
        };
        if !self.begin_restart() {
            tracing::debug!("pool restart already in progress");
            return None;
        }

        let this = self.clone();
        Some(runtime.spawn(async move { this.run_restart().await }))
    }

    /// Restart inline and return the settled readiness, or `None` when a
    /// restart is already in progress.
    pub async fn restart(&self) -> Option<PoolReadiness> {
        if !self.begin_restart() {
            tracing::debug!("pool restart already in progress");
            return None;
        }
        Some(self.run_restart().await)
    }

    async fn run_restart(&self) -> PoolReadiness {
        let drained = AssertUnwindSafe(self.inner.handle.drain_idle())
            .catch_unwind()
            .await;

        match drained {
            Ok(Ok(report)) => {
                tracing::debug!(
                    closed = report.closed,
                    failed = report.failed,
                    "drain finished"
                );
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "drain failed, reinitializing anyway");
            }
            Err(_) => {
                tracing::error!("drain panicked, reinitializing anyway");
            }
        }

        if self.inner.replace_on_restart {
            self.inner.handle.discard();
        }

        let settled = self.initialize_and_settle().await;
        self.inner.stats.record_restart_completed();
        tracing::info!(readiness = %settled, "pool restart finished");
        settled
    }
}

impl<F: PoolFactory> std::fmt::Debug for Lifecycle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("readiness", &self.readiness())
            .field("handle", &self.inner.handle)
            .finish()
    }
}
