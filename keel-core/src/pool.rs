use crate::{Connection, DbConf, Driver, Error, Result};
use std::{
    fmt::{self, Debug},
    ops::{Deref, DerefMut},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

struct PoolState {
    idle: Vec<Box<dyn Connection>>,
    /// Connections currently alive, idle or handed out.
    open: usize,
    closed: bool,
}

/// Bounded set of physical connections shared by every unit of work.
///
/// At most `max_open` connections exist at any time. `acquire` reuses an idle
/// one, opens a new one while under the limit, otherwise waits for a release
/// until the acquire timeout expires.
pub struct Pool {
    driver: Box<dyn Driver>,
    max_open: usize,
    acquire_timeout: Duration,
    state: Mutex<PoolState>,
    released: Condvar,
}

impl Pool {
    /// Opens the first connection right away so that a wrong configuration is
    /// reported here rather than on the first statement.
    pub fn new(driver: Box<dyn Driver>, conf: &DbConf) -> Result<Arc<Self>> {
        let first = driver.connect().map_err(|e| {
            let e = e.context(format!(
                "While opening the first {} connection to `{}`",
                driver.name(),
                conf.location
            ));
            log::error!("{:#}", e);
            e
        })?;
        log::debug!(
            "Opened {} pool on `{}` (max_open {})",
            driver.name(),
            conf.location,
            conf.max_open
        );
        Ok(Arc::new(Self {
            driver,
            max_open: conf.max_open.max(1),
            acquire_timeout: conf.acquire_timeout,
            state: Mutex::new(PoolState {
                idle: vec![first],
                open: 1,
                closed: false,
            }),
            released: Condvar::new(),
        }))
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut state = self.lock();
        loop {
            if state.closed {
                let error = Error::msg(format!("The {} pool is shut down", self.driver.name()));
                log::error!("{:#}", error);
                return Err(error);
            }
            if let Some(connection) = state.idle.pop() {
                return Ok(PooledConnection::new(self.clone(), connection));
            }
            if state.open < self.max_open {
                state.open += 1;
                drop(state);
                return match self.driver.connect() {
                    Ok(connection) => Ok(PooledConnection::new(self.clone(), connection)),
                    Err(e) => {
                        self.forget();
                        let e = e.context(format!("While opening a {} connection", self.driver.name()));
                        log::error!("{:#}", e);
                        Err(e)
                    }
                };
            }
            let now = Instant::now();
            if now >= deadline {
                let error = Error::msg(format!(
                    "Timed out after {}ms waiting for a {} connection ({} in use)",
                    self.acquire_timeout.as_millis(),
                    self.driver.name(),
                    state.open
                ));
                log::error!("{:#}", error);
                return Err(error);
            }
            state = self
                .released
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn release(&self, connection: Box<dyn Connection>) {
        let mut state = self.lock();
        if state.closed {
            state.open -= 1;
            drop(state);
            drop(connection);
        } else {
            state.idle.push(connection);
            drop(state);
        }
        self.released.notify_one();
    }

    /// A connection handed out is gone for good (broken or failed to open).
    fn forget(&self) {
        let mut state = self.lock();
        state.open = state.open.saturating_sub(1);
        drop(state);
        self.released.notify_one();
    }

    /// Closes the idle connections and refuses further acquires. Connections
    /// still handed out are closed when released. Calling it again does nothing.
    pub fn shutdown(&self) {
        let idle = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.open -= idle.len();
            idle
        };
        log::debug!(
            "Shutting down the {} pool, closing {} idle connections",
            self.driver.name(),
            idle.len()
        );
        drop(idle);
        self.released.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn idle_count(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn open_count(&self) -> usize {
        self.lock().open
    }
}

impl Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Pool")
            .field("driver", &self.driver.name())
            .field("max_open", &self.max_open)
            .field("open", &state.open)
            .field("idle", &state.idle.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// A connection on loan from a [`Pool`], given back when dropped.
pub struct PooledConnection {
    pool: Arc<Pool>,
    connection: Option<Box<dyn Connection>>,
}

impl PooledConnection {
    fn new(pool: Arc<Pool>, connection: Box<dyn Connection>) -> Self {
        Self {
            pool,
            connection: Some(connection),
        }
    }

    /// Closes the connection instead of returning it to the pool.
    pub fn discard(mut self) {
        if let Some(connection) = self.connection.take() {
            drop(connection);
            self.pool.forget();
        }
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;
    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(connection) => connection.as_ref(),
            None => unreachable!("the connection is only taken when the guard is consumed"),
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.connection {
            Some(connection) => connection.as_mut(),
            None => unreachable!("the connection is only taken when the guard is consumed"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}
