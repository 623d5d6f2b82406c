//! Error types.
//!
//! Pool-path failures ([`PoolError`]) are absorbed by the acquisition
//! pipeline and only ever logged. The one failure a caller of
//! [`PoolManager::get_connection`](crate::PoolManager::get_connection) sees is
//! [`Error::NoConnection`], carrying the direct provider's error.

use thiserror::Error;

use crate::readiness::PoolReadiness;

/// Result type for public pool-warden operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error reported by an external collaborator (pool primitive, direct
/// provider, or connection).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Human-readable description from the driver.
    pub message: String,
    /// SQLSTATE code, if the driver supplied one.
    pub sqlstate: Option<String>,
}

impl DriverError {
    /// Create a driver error with no SQLSTATE.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sqlstate: None,
        }
    }

    /// Attach a SQLSTATE code.
    #[must_use]
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }
}

/// Public error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Neither the pool nor the direct provider produced a connection.
    #[error("no connection obtainable: {source}")]
    NoConnection {
        /// Error from the direct provider, the last tier tried.
        #[source]
        source: DriverError,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Maximum pool size must be at least one.
    #[error("max pool size must be greater than zero")]
    ZeroMaxSize,

    /// The connection target has no host.
    #[error("connection target has no host")]
    MissingHost,

    /// The connection target has no database name.
    #[error("connection target has no database")]
    MissingDatabase,

    /// The liveness probe statement is empty.
    #[error("probe statement is empty")]
    EmptyProbeStatement,

    /// A connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),
}

/// Failures on the pool path.
///
/// None of these reach the public caller; the acquisition pipeline logs them
/// and falls back to a direct connection.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The primitive failed to initialize or reinitialize.
    #[error("pool initialization failed: {0}")]
    Initialization(#[source] DriverError),

    /// The pool was not accepting acquisitions.
    #[error("pool is {0}")]
    Gated(PoolReadiness),

    /// The primitive failed to hand back a connection.
    #[error("pool exhausted or closed: {0}")]
    ExhaustedOrClosed(#[source] DriverError),

    /// A pooled connection failed its liveness probe.
    #[error("stale connection: {0}")]
    Stale(#[from] ProbeFailure),

    /// Idle connections could not be enumerated for draining.
    #[error("drain failed: {0}")]
    Drain(#[source] DriverError),
}

impl PoolError {
    /// Whether this failure came from the liveness probe.
    #[must_use]
    pub fn is_staleness(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    /// Whether the pool primitive was never called.
    #[must_use]
    pub fn is_gated(&self) -> bool {
        matches!(self, Self::Gated(_))
    }
}

/// Reasons a connection was classified NOT LIVE.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ProbeFailure {
    /// The probe query itself failed.
    #[error("probe query failed: {0}")]
    Query(#[source] DriverError),

    /// The probe returned no rows.
    #[error("probe returned no rows")]
    NoRows,

    /// The probe returned more than one row.
    #[error("probe returned {0} rows, expected 1")]
    TooManyRows(usize),

    /// The probe row lacked the expected column.
    #[error("probe row has no column '{0}'")]
    MissingColumn(String),

    /// The probe row carried an unexpected value.
    #[error("probe returned {actual}, expected {expected}")]
    UnexpectedValue {
        /// Value the probe expects.
        expected: crate::row::Value,
        /// Value actually returned.
        actual: crate::row::Value,
    },
}
