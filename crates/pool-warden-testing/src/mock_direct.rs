//! Scripted direct provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use pool_warden::{DirectProvider, DriverError};

use crate::mock_connection::{CloseLog, MockConnection, Origin, ProbeReply};

/// Ids of direct connections start here so they never collide with pooled
/// ones in assertions.
pub const DIRECT_ID_BASE: u64 = 1_000_000;

#[derive(Debug, Default)]
struct DirectState {
    fails: AtomicBool,
    opens: AtomicUsize,
    next_id: AtomicU64,
    last_target: Mutex<Option<String>>,
    log: Arc<CloseLog>,
}

/// [`DirectProvider`] that opens unpooled mock connections.
#[derive(Debug, Clone, Default)]
pub struct MockDirect {
    state: Arc<DirectState>,
}

impl MockDirect {
    /// A provider that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that always fails.
    pub fn failing() -> Self {
        let direct = Self::default();
        direct.set_failing(true);
        direct
    }

    /// Toggle failure.
    pub fn set_failing(&self, fails: bool) {
        self.state.fails.store(fails, Ordering::SeqCst);
    }

    /// Calls to `open`, successful or not.
    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    /// Target passed to the last `open`.
    pub fn last_target(&self) -> Option<String> {
        self.state.last_target.lock().clone()
    }

    /// Close log of direct connections.
    pub fn close_log(&self) -> Arc<CloseLog> {
        self.state.log.clone()
    }
}

#[async_trait]
impl DirectProvider for MockDirect {
    type Connection = MockConnection;

    async fn open(&self, target: &str) -> Result<MockConnection, DriverError> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        *self.state.last_target.lock() = Some(target.to_string());

        if self.state.fails.load(Ordering::SeqCst) {
            return Err(
                DriverError::new("SQL30082N security processing failed").with_sqlstate("08001"),
            );
        }

        Ok(MockConnection {
            id: DIRECT_ID_BASE + self.state.next_id.fetch_add(1, Ordering::SeqCst),
            origin: Origin::Direct,
            reply: ProbeReply::Live,
            close_fails: false,
            close_panics: false,
            queries: 0,
            log: self.state.log.clone(),
            home: None,
        })
    }
}
