//! Connection acquisition.
//!
//! [`PoolManager::get_connection`] tries the pool first and falls back to a
//! direct connection:
//!
//! 1. If readiness is not `Available`, the pool is skipped without touching
//!    the primitive.
//! 2. Otherwise a connection is taken from the primitive and probed. A live
//!    connection is returned.
//! 3. On any pool-path failure a restart is requested when the pool is
//!    `Unavailable`, or when it is `Available` with nothing checked out
//!    (every idle connection is presumed stale). No restart is requested
//!    while one is already running.
//! 4. The direct provider is tried. Its error is the only one a caller sees.

use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::connection::{DirectProvider, PoolFactory, PoolPrimitive};
use crate::error::{Error, PoolError, Result};
use crate::handle::PoolHandle;
use crate::lifecycle::Lifecycle;
use crate::probe::LivenessProbe;
use crate::readiness::PoolReadiness;
use crate::status::{AcquisitionStats, ConnectionCounts};

/// Connection type produced by a factory's primitive.
pub type ConnectionOf<F> = <<F as PoolFactory>::Pool as PoolPrimitive>::Connection;

/// Owner of the single logical pool and entry point for acquisitions.
///
/// # Example
///
/// ```rust,ignore
/// use pool_warden::{ConnectionTarget, PoolManager};
///
/// let target = ConnectionTarget::from_connection_string(
///     "DATABASE=sample;HOSTNAME=db.local;PORT=50000;PROTOCOL=TCPIP;UID=app;PWD=secret;",
/// )?;
///
/// let manager = PoolManager::builder(driver_pool_factory, driver_direct)
///     .target(target)
///     .max_size(20)
///     .build()
///     .await?;
///
/// let conn = manager.get_connection().await?;
/// println!("{:?}", manager.connection_counts());
/// ```
pub struct PoolManager<F: PoolFactory, D> {
    config: PoolConfig,
    lifecycle: Lifecycle<F>,
    probe: LivenessProbe,
    direct: D,
    descriptor: String,
}

impl<F, D> PoolManager<F, D>
where
    F: PoolFactory,
    D: DirectProvider<Connection = ConnectionOf<F>>,
{
    /// Create a builder.
    #[must_use]
    pub fn builder(factory: F, direct: D) -> PoolManagerBuilder<F, D> {
        PoolManagerBuilder::new(factory, direct)
    }

    /// Validate `config`, build the pool handle and run the first start.
    ///
    /// A pool that fails to initialize does not fail construction; the
    /// manager starts `Unavailable` and serves direct connections until a
    /// restart succeeds.
    pub async fn new(config: PoolConfig, factory: F, direct: D) -> Result<Self> {
        config.validate()?;

        let handle = PoolHandle::new(factory, &config.target, config.max_size);
        let lifecycle = Lifecycle::new(handle, config.replace_on_restart);
        let readiness = match lifecycle.start().await {
            Some(readiness) => readiness,
            None => lifecycle.readiness(),
        };

        tracing::info!(
            target_db = %config.target,
            max = config.max_size,
            readiness = %readiness,
            "pool manager created"
        );

        Ok(Self {
            probe: LivenessProbe::new(config.probe.clone()),
            descriptor: config.target.to_connection_string(),
            config,
            lifecycle,
            direct,
        })
    }

    /// Get a connection, from the pool when possible and directly otherwise.
    ///
    /// Fails only when the direct provider fails; the error carries its
    /// cause.
    ///
    /// Restarts requested from here run as Tokio tasks. Outside a Tokio
    /// runtime the restart is skipped with a warning and the connection is
    /// still served.
    pub async fn get_connection(&self) -> Result<ConnectionOf<F>> {
        match self.acquire_pooled().await {
            Ok(conn) => {
                self.lifecycle.stats().record_pool_hit();
                tracing::trace!("served pooled connection");
                return Ok(conn);
            }
            Err(e) if e.is_gated() => {
                tracing::debug!(reason = %e, "pool skipped, using direct connection");
            }
            Err(e) => {
                tracing::warn!(error = %e, "pool acquisition failed, using direct connection");
            }
        }

        self.restart_if_stale();
        self.acquire_direct().await
    }

    async fn acquire_pooled(&self) -> std::result::Result<ConnectionOf<F>, PoolError> {
        let stats = self.lifecycle.stats();

        let readiness = self.lifecycle.readiness();
        if !readiness.accepts_acquisitions() {
            stats.record_gated();
            return Err(PoolError::Gated(readiness));
        }

        let conn = self
            .lifecycle
            .handle()
            .acquire_raw()
            .await
            .inspect_err(|_| stats.record_pool_failure())?;

        self.probe.validate(conn).await.map_err(|failure| {
            stats.record_stale();
            PoolError::Stale(failure)
        })
    }

    /// Request a restart after a failed pool attempt, if warranted.
    fn restart_if_stale(&self) {
        let readiness = self.lifecycle.readiness();
        let restart = match readiness {
            PoolReadiness::Initializing => false,
            PoolReadiness::Unavailable => true,
            PoolReadiness::Available => !self.lifecycle.handle().has_active_connections(),
        };

        if restart {
            tracing::info!(readiness = %readiness, "requesting pool restart");
            // The restart only affects later acquisitions.
            let _ = self.lifecycle.request_restart();
        }
    }

    async fn acquire_direct(&self) -> Result<ConnectionOf<F>> {
        let stats = self.lifecycle.stats();
        match self.direct.open(&self.descriptor).await {
            Ok(conn) => {
                stats.record_direct(true);
                tracing::debug!("served direct connection");
                Ok(conn)
            }
            Err(e) => {
                stats.record_direct(false);
                tracing::error!(
                    error = %e,
                    target_db = %self.config.target,
                    "direct connection failed"
                );
                Err(Error::NoConnection { source: e })
            }
        }
    }

    /// Pooled connection counts. Never fails; zero when unknown.
    #[must_use]
    pub fn connection_counts(&self) -> ConnectionCounts {
        self.lifecycle.handle().counts()
    }

    /// Whether any pooled connection is checked out. Never fails.
    #[must_use]
    pub fn has_active_connections(&self) -> bool {
        self.lifecycle.handle().has_active_connections()
    }

    /// Current pool readiness.
    #[must_use]
    pub fn readiness(&self) -> PoolReadiness {
        self.lifecycle.readiness()
    }

    /// Whether the pool currently accepts acquisitions.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.readiness().accepts_acquisitions()
    }

    /// Acquisition counters since creation.
    #[must_use]
    pub fn stats(&self) -> AcquisitionStats {
        self.lifecycle.stats().snapshot()
    }

    /// Schedule a restart in the background. `None` if one is running or
    /// when called outside a Tokio runtime.
    pub fn restart(&self) -> Option<JoinHandle<PoolReadiness>> {
        self.lifecycle.request_restart()
    }

    /// Restart and wait for readiness to settle. `None` if one is running.
    pub async fn restart_now(&self) -> Option<PoolReadiness> {
        self.lifecycle.restart().await
    }

    /// The lifecycle state machine.
    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle<F> {
        &self.lifecycle
    }

    /// The configuration the manager was built with.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<F: PoolFactory, D> std::fmt::Debug for PoolManager<F, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("target", &self.config.target)
            .field("max_size", &self.config.max_size)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

/// Builder for [`PoolManager`].
pub struct PoolManagerBuilder<F, D> {
    config: PoolConfig,
    factory: F,
    direct: D,
}

impl<F, D> PoolManagerBuilder<F, D>
where
    F: PoolFactory,
    D: DirectProvider<Connection = ConnectionOf<F>>,
{
    /// Create a builder with default configuration.
    pub fn new(factory: F, direct: D) -> Self {
        Self {
            config: PoolConfig::default(),
            factory,
            direct,
        }
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the connection target.
    #[must_use]
    pub fn target(mut self, target: crate::config::ConnectionTarget) -> Self {
        self.config.target = target;
        self
    }

    /// Set the maximum pool size.
    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.config.max_size = max_size;
        self
    }

    /// Set the liveness probe.
    #[must_use]
    pub fn probe(mut self, probe: crate::config::ProbeConfig) -> Self {
        self.config.probe = probe;
        self
    }

    /// Rebuild the primitive on every restart.
    #[must_use]
    pub fn replace_on_restart(mut self, enabled: bool) -> Self {
        self.config.replace_on_restart = enabled;
        self
    }

    /// Build the manager and run the first start.
    pub async fn build(self) -> Result<PoolManager<F, D>> {
        PoolManager::new(self.config, self.factory, self.direct).await
    }
}
