//! Scripted connection.

#![allow(clippy::panic)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pool_warden::{Connection, DriverError, Row};

use crate::mock_pool::PoolState;

/// Where a mock connection came from. Only tests look at this; the code
/// under test never can.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Handed out by [`MockPool`](crate::MockPool).
    Pooled,
    /// Opened by [`MockDirect`](crate::MockDirect).
    Direct,
}

/// What a connection answers to the liveness probe.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeReply {
    /// One row `{"1": 1}`.
    Live,
    /// One row `{"1": value}`.
    Value(i64),
    /// No rows.
    Empty,
    /// Two live-looking rows.
    Duplicated,
    /// The query fails.
    Error(String),
}

impl ProbeReply {
    pub(crate) fn rows(&self) -> Result<Vec<Row>, DriverError> {
        match self {
            Self::Live => Ok(vec![Row::new().with("1", 1)]),
            Self::Value(v) => Ok(vec![Row::new().with("1", *v)]),
            Self::Empty => Ok(Vec::new()),
            Self::Duplicated => Ok(vec![Row::new().with("1", 1), Row::new().with("1", 1)]),
            Self::Error(msg) => Err(DriverError::new(msg.clone())),
        }
    }
}

/// Shared record of every close, by connection id.
#[derive(Debug, Default)]
pub struct CloseLog {
    closed: Mutex<Vec<u64>>,
}

impl CloseLog {
    pub(crate) fn record(&self, id: u64) {
        self.closed.lock().push(id);
    }

    /// How many times connection `id` was closed.
    pub fn times_closed(&self, id: u64) -> usize {
        self.closed.lock().iter().filter(|c| **c == id).count()
    }

    /// Total closes recorded.
    pub fn total(&self) -> usize {
        self.closed.lock().len()
    }
}

/// A connection whose probe answer and close behavior are scripted.
#[derive(Debug)]
pub struct MockConnection {
    pub(crate) id: u64,
    pub(crate) origin: Origin,
    pub(crate) reply: ProbeReply,
    pub(crate) close_fails: bool,
    pub(crate) close_panics: bool,
    pub(crate) queries: usize,
    pub(crate) log: Arc<CloseLog>,
    /// Set while the connection belongs to a pool; closing returns it there.
    pub(crate) home: Option<(Arc<PoolState>, String)>,
}

impl MockConnection {
    /// Connection id, unique per pool or direct provider.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Where the connection came from.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Queries run on this connection so far.
    pub fn queries(&self) -> usize {
        self.queries
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&mut self, _sql: &str) -> Result<Vec<Row>, DriverError> {
        self.queries += 1;
        self.reply.rows()
    }

    async fn close(mut self) -> Result<(), DriverError> {
        self.log.record(self.id);

        if self.close_panics {
            panic!("scripted close panic on connection {}", self.id);
        }
        if self.close_fails {
            return Err(DriverError::new(format!("close failed on connection {}", self.id)));
        }

        if let Some((state, target)) = self.home.take() {
            state.check_in(&target, self);
        }
        Ok(())
    }
}
