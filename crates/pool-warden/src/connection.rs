//! Collaborator traits.
//!
//! pool-warden never opens sockets itself. The physical pool, the direct
//! (unpooled) connector and the connections they produce are supplied by
//! the driver through these traits:
//!
//! - [`Connection`]: a usable session that can run a query and be closed
//! - [`PoolPrimitive`]: the driver's own pool, with idle/in-use sets per target
//! - [`PoolFactory`]: builds a fresh primitive
//! - [`DirectProvider`]: opens one connection outside any pool

use async_trait::async_trait;

use crate::error::DriverError;
use crate::row::Row;

/// A database session.
#[async_trait]
pub trait Connection: Sized + Send + 'static {
    /// Run a statement and return its rows.
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DriverError>;

    /// Close the session. For pooled connections the primitive decides
    /// whether that returns it to the idle set.
    async fn close(self) -> Result<(), DriverError>;
}

/// Failed [`PoolPrimitive::open`].
///
/// Some drivers hand back a connection object together with the error. It is
/// carried here so the caller can close it instead of leaking it.
#[derive(Debug)]
pub struct OpenFailure<C> {
    /// Error reported by the primitive.
    pub error: DriverError,
    /// Half-open connection returned alongside the error, if any.
    pub partial: Option<C>,
}

impl<C> OpenFailure<C> {
    /// A failure with no connection attached.
    pub fn new(error: DriverError) -> Self {
        Self {
            error,
            partial: None,
        }
    }

    /// A failure that still handed back a connection.
    pub fn with_partial(error: DriverError, partial: C) -> Self {
        Self {
            error,
            partial: Some(partial),
        }
    }
}

/// The driver-owned pool primitive.
///
/// Sets are keyed by the connection descriptor string.
#[async_trait]
pub trait PoolPrimitive: Send + Sync + 'static {
    /// Connection type produced by this pool.
    type Connection: Connection;

    /// Configure the maximum number of connections.
    fn set_max_size(&self, max_size: u32);

    /// (Re)initialize the pool against `target`.
    async fn init(&self, max_size: u32, target: &str) -> Result<(), DriverError>;

    /// Take one connection from the pool.
    async fn open(&self, target: &str) -> Result<Self::Connection, OpenFailure<Self::Connection>>;

    /// Number of idle connections for `target`.
    fn idle_count(&self, target: &str) -> Result<usize, DriverError>;

    /// Number of in-use connections for `target`.
    fn in_use_count(&self, target: &str) -> Result<usize, DriverError>;

    /// Detach and return every idle connection for `target`, leaving its
    /// idle set empty.
    fn take_idle(&self, target: &str) -> Result<Vec<Self::Connection>, DriverError>;
}

/// Builds pool primitives.
pub trait PoolFactory: Send + Sync + 'static {
    /// Primitive type built by this factory.
    type Pool: PoolPrimitive;

    /// Construct a new, uninitialized primitive.
    fn create(&self) -> Result<Self::Pool, DriverError>;
}

impl<P, F> PoolFactory for F
where
    P: PoolPrimitive,
    F: Fn() -> Result<P, DriverError> + Send + Sync + 'static,
{
    type Pool = P;

    fn create(&self) -> Result<P, DriverError> {
        self()
    }
}

/// Opens connections outside any pool.
#[async_trait]
pub trait DirectProvider: Send + Sync + 'static {
    /// Connection type produced; must match the pool's so callers can treat
    /// both uniformly.
    type Connection: Connection;

    /// Open a single connection to `target`.
    async fn open(&self, target: &str) -> Result<Self::Connection, DriverError>;
}

/// Close a connection, logging instead of failing.
pub(crate) async fn close_quietly<C: Connection>(conn: C, reason: &'static str) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, reason = reason, "failed to close connection");
    }
}
