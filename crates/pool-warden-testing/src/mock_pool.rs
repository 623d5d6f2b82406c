//! In-memory pool primitive with scripted failures.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use pool_warden::{DriverError, OpenFailure, PoolFactory, PoolPrimitive};
use tokio::sync::Semaphore;

use crate::mock_connection::{CloseLog, MockConnection, Origin, ProbeReply};

/// How [`MockPool::open`](PoolPrimitive::open) behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenBehavior {
    /// Reuse an idle connection or create one, up to the max size.
    #[default]
    Healthy,
    /// Fail with no connection.
    Fail,
    /// Fail but still hand back a connection object.
    FailWithPartial,
}

/// Scripted behavior of a [`MockPool`].
#[derive(Debug, Clone)]
pub struct Script {
    /// Factory `create` fails.
    pub construct_fails: bool,
    /// `init` fails.
    pub init_fails: bool,
    /// `open` behavior.
    pub open: OpenBehavior,
    /// Probe reply of newly created connections.
    pub reply: ProbeReply,
    /// Newly created connections fail to close.
    pub close_fails: bool,
    /// Newly created connections panic on close.
    pub close_panics: bool,
    /// `idle_count`/`in_use_count` fail.
    pub counts_fail: bool,
    /// `take_idle` fails.
    pub take_idle_fails: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            construct_fails: false,
            init_fails: false,
            open: OpenBehavior::Healthy,
            reply: ProbeReply::Live,
            close_fails: false,
            close_panics: false,
            counts_fail: false,
            take_idle_fails: false,
        }
    }
}

#[derive(Debug, Default)]
struct TargetSets {
    idle: Vec<MockConnection>,
    in_use: HashSet<u64>,
}

/// Shared state behind every clone of a [`MockPool`].
#[derive(Debug, Default)]
pub(crate) struct PoolState {
    sets: Mutex<HashMap<String, TargetSets>>,
    script: Mutex<Script>,
    init_gate: Mutex<Option<Arc<Semaphore>>>,
    initialized_target: Mutex<Option<String>>,
    log: Arc<CloseLog>,
    next_id: AtomicU64,
    max_size: AtomicU32,
    constructions: AtomicUsize,
    init_calls: AtomicUsize,
    open_calls: AtomicUsize,
    take_idle_calls: AtomicUsize,
}

impl PoolState {
    fn new_connection(self: &Arc<Self>, script: &Script, home: Option<String>) -> MockConnection {
        MockConnection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            origin: Origin::Pooled,
            reply: script.reply.clone(),
            close_fails: script.close_fails,
            close_panics: script.close_panics,
            queries: 0,
            log: self.log.clone(),
            home: home.map(|target| (self.clone(), target)),
        }
    }

    /// Return a closed pooled connection to the idle set.
    pub(crate) fn check_in(&self, target: &str, conn: MockConnection) {
        let mut sets = self.sets.lock();
        let entry = sets.entry(target.to_string()).or_default();
        entry.in_use.remove(&conn.id);
        entry.idle.push(conn);
    }
}

/// In-memory [`PoolPrimitive`].
///
/// Clones share state, so a test can keep one clone for scripting and
/// assertions while the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockPool {
    state: Arc<PoolState>,
}

impl MockPool {
    /// Create a healthy pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory handing out clones of this pool.
    pub fn factory(&self) -> MockPoolFactory {
        MockPoolFactory { pool: self.clone() }
    }

    /// Change the script.
    pub fn script(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.state.script.lock());
    }

    /// Make `init` wait for a permit on the returned semaphore.
    pub fn gate_init(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.state.init_gate.lock() = Some(gate.clone());
        gate
    }

    /// Remove the `init` gate.
    pub fn ungate_init(&self) {
        if let Some(gate) = self.state.init_gate.lock().take() {
            gate.close();
        }
    }

    /// Add `n` idle connections for the last initialized target.
    pub fn seed_idle(&self, n: usize) -> Vec<u64> {
        let Some(target) = self.initialized_target() else {
            return Vec::new();
        };
        let script = self.state.script.lock().clone();
        let mut sets = self.state.sets.lock();
        let entry = sets.entry(target).or_default();
        (0..n)
            .map(|_| {
                let conn = self.state.new_connection(&script, None);
                let id = conn.id;
                entry.idle.push(conn);
                id
            })
            .collect()
    }

    /// Change the probe reply of every idle connection, as if the database
    /// had dropped them.
    pub fn poison_idle(&self, reply: ProbeReply) {
        for sets in self.state.sets.lock().values_mut() {
            for conn in &mut sets.idle {
                conn.reply = reply.clone();
            }
        }
    }

    /// Target passed to the last successful `init`.
    pub fn initialized_target(&self) -> Option<String> {
        self.state.initialized_target.lock().clone()
    }

    /// Idle connections for the last initialized target.
    pub fn idle_len(&self) -> usize {
        self.len_with(|s| s.idle.len())
    }

    /// In-use connections for the last initialized target.
    pub fn in_use_len(&self) -> usize {
        self.len_with(|s| s.in_use.len())
    }

    fn len_with(&self, f: impl Fn(&TargetSets) -> usize) -> usize {
        let Some(target) = self.initialized_target() else {
            return 0;
        };
        self.state.sets.lock().get(&target).map_or(0, f)
    }

    /// Close log shared by every connection of this pool.
    pub fn close_log(&self) -> Arc<CloseLog> {
        self.state.log.clone()
    }

    /// Max size last configured.
    pub fn max_size(&self) -> u32 {
        self.state.max_size.load(Ordering::SeqCst)
    }

    /// Times the factory built this pool.
    pub fn constructions(&self) -> usize {
        self.state.constructions.load(Ordering::SeqCst)
    }

    /// Calls to `init`.
    pub fn init_calls(&self) -> usize {
        self.state.init_calls.load(Ordering::SeqCst)
    }

    /// Calls to `open`.
    pub fn open_calls(&self) -> usize {
        self.state.open_calls.load(Ordering::SeqCst)
    }

    /// Calls to `take_idle`.
    pub fn take_idle_calls(&self) -> usize {
        self.state.take_idle_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoolPrimitive for MockPool {
    type Connection = MockConnection;

    fn set_max_size(&self, max_size: u32) {
        self.state.max_size.store(max_size, Ordering::SeqCst);
    }

    async fn init(&self, max_size: u32, target: &str) -> Result<(), DriverError> {
        self.state.init_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.state.init_gate.lock().clone();
        if let Some(gate) = gate {
            // A closed gate lets everything through.
            let _permit = gate.acquire().await;
        }

        if self.state.script.lock().init_fails {
            return Err(DriverError::new("SQL30081N communication error").with_sqlstate("08001"));
        }

        self.state.max_size.store(max_size, Ordering::SeqCst);
        *self.state.initialized_target.lock() = Some(target.to_string());
        Ok(())
    }

    async fn open(&self, target: &str) -> Result<MockConnection, OpenFailure<MockConnection>> {
        self.state.open_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.state.script.lock().clone();

        match script.open {
            OpenBehavior::Fail => {
                return Err(OpenFailure::new(DriverError::new("SQL1224N pool closed")));
            }
            OpenBehavior::FailWithPartial => {
                let partial = self.state.new_connection(&script, None);
                return Err(OpenFailure::with_partial(
                    DriverError::new("SQL1224N connection reset"),
                    partial,
                ));
            }
            OpenBehavior::Healthy => {}
        }

        let max = self.state.max_size.load(Ordering::SeqCst) as usize;
        let mut sets = self.state.sets.lock();
        let entry = sets.entry(target.to_string()).or_default();

        let mut conn = match entry.idle.pop() {
            Some(conn) => conn,
            None if entry.in_use.len() < max => self.state.new_connection(&script, None),
            None => {
                return Err(OpenFailure::new(DriverError::new(format!(
                    "pool exhausted ({max} in use)"
                ))));
            }
        };

        entry.in_use.insert(conn.id);
        conn.home = Some((self.state.clone(), target.to_string()));
        Ok(conn)
    }

    fn idle_count(&self, target: &str) -> Result<usize, DriverError> {
        if self.state.script.lock().counts_fail {
            return Err(DriverError::new("pool state unreadable"));
        }
        Ok(self.state.sets.lock().get(target).map_or(0, |s| s.idle.len()))
    }

    fn in_use_count(&self, target: &str) -> Result<usize, DriverError> {
        if self.state.script.lock().counts_fail {
            return Err(DriverError::new("pool state unreadable"));
        }
        Ok(self.state.sets.lock().get(target).map_or(0, |s| s.in_use.len()))
    }

    fn take_idle(&self, target: &str) -> Result<Vec<MockConnection>, DriverError> {
        self.state.take_idle_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.script.lock().take_idle_fails {
            return Err(DriverError::new("idle set unreadable"));
        }
        Ok(self
            .state
            .sets
            .lock()
            .get_mut(target)
            .map(|s| std::mem::take(&mut s.idle))
            .unwrap_or_default())
    }
}

/// [`PoolFactory`] returning clones of one [`MockPool`].
#[derive(Debug, Clone)]
pub struct MockPoolFactory {
    pool: MockPool,
}

impl PoolFactory for MockPoolFactory {
    type Pool = MockPool;

    fn create(&self) -> Result<MockPool, DriverError> {
        if self.pool.state.script.lock().construct_fails {
            return Err(DriverError::new("pool construction failed"));
        }
        self.pool.state.constructions.fetch_add(1, Ordering::SeqCst);
        Ok(self.pool.clone())
    }
}
