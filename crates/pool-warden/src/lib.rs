//! # pool-warden
//!
//! Lifecycle management for a single bounded database connection pool.
//!
//! The driver supplies the physical pool, a direct connector and the
//! connections themselves (see [`connection`]). pool-warden wraps them with
//! one acquisition entry point that keeps working when the pool goes stale,
//! fails to initialize, or is still starting up.
//!
//! ## Features
//!
//! - Explicit readiness state: `Initializing`, `Available`, `Unavailable`
//! - Liveness probe on every pooled connection before it is handed out
//! - Direct (unpooled) fallback whenever the pool cannot serve
//! - Background drain-and-restart when the pool looks stale, guarded so
//!   redundant requests are harmless
//! - Best-effort connection counts that never fail
//!
//! ## Example
//!
//! ```rust,ignore
//! use pool_warden::{ConnectionTarget, PoolConfig, PoolManager};
//!
//! let config = PoolConfig::new(
//!     ConnectionTarget::new()
//!         .host("db.local")
//!         .database("sample")
//!         .credentials("app", "secret"),
//! )
//! .max_size(20);
//!
//! let manager = PoolManager::new(config, driver_pool_factory, driver_direct).await?;
//!
//! // Pooled if possible, direct otherwise.
//! let conn = manager.get_connection().await?;
//!
//! let counts = manager.connection_counts();
//! println!("used={} idle={}", counts.used, counts.available);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod manager;
pub mod probe;
pub mod readiness;
pub mod row;
pub mod status;

// Configuration
pub use config::{ConnectionTarget, PoolConfig, ProbeConfig};

// Collaborator traits
pub use connection::{Connection, DirectProvider, OpenFailure, PoolFactory, PoolPrimitive};

// Error types
pub use error::{ConfigError, DriverError, Error, PoolError, ProbeFailure, Result};

// Pool types
pub use handle::{DrainReport, PoolHandle};
pub use lifecycle::Lifecycle;
pub use manager::{ConnectionOf, PoolManager, PoolManagerBuilder};
pub use probe::LivenessProbe;
pub use readiness::PoolReadiness;
pub use row::{Row, Value};
pub use status::{AcquisitionStats, ConnectionCounts};
