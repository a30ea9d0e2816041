use crate::{
    Connection, DbConf, Driver, Error, LogTraceSink, NoopTraceSink, Pool, PooledConnection, Result,
    RowLabeled, RowsAffected, SqlWriter, TraceSink, Value, fingerprint, truncate_long,
};
use std::{
    fmt::{self, Debug},
    sync::Arc,
    time::Instant,
};

/// What the unit of work needs from its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Plain connection, each statement autocommits.
    None,
    /// Plain connection, the caller only reads.
    ReadOnly,
    /// A transaction is begun together with the connection acquisition.
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// No connection held yet.
    Created,
    /// Holding a plain connection.
    Active,
    /// Holding a connection with an open transaction.
    InTransaction,
    /// A statement failed inside the transaction, which was rolled back.
    Failed,
    Completed,
}

/// Entry point of the engine: the connection pool plus the trace sink every
/// unit of work reports to.
#[derive(Clone)]
pub struct Datasource {
    pool: Arc<Pool>,
    trace: Arc<dyn TraceSink>,
}

impl Datasource {
    /// Creates the pool. Statements are traced through the `log` facade when
    /// `log_sql` is set in the configuration.
    pub fn new(driver: Box<dyn Driver>, conf: &DbConf) -> Result<Self> {
        let trace: Arc<dyn TraceSink> = if conf.log_sql {
            Arc::new(LogTraceSink)
        } else {
            Arc::new(NoopTraceSink)
        };
        Ok(Self {
            pool: Pool::new(driver, conf)?,
            trace,
        })
    }

    pub fn with_trace_sink(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    pub fn writer(&self) -> &dyn SqlWriter {
        self.pool.driver().sql_writer()
    }

    /// A new unit of work. The caller must call [`UnitOfWork::complete`],
    /// prefer [`Datasource::scoped`] which does it on every path.
    pub fn unit_of_work(&self, mode: TxMode, trace_id: impl Into<String>) -> UnitOfWork {
        UnitOfWork {
            pool: self.pool.clone(),
            trace: self.trace.clone(),
            mode,
            trace_id: trace_id.into(),
            state: UnitState::Created,
            connection: None,
            shard_key: None,
        }
    }

    /// Runs `f` inside a unit of work and completes it with the outcome of
    /// `f`: commit on `Ok`, rollback on `Err`.
    ///
    /// ```rust,ignore
    /// let count = datasource.scoped(TxMode::ReadOnly, "report", |uow| {
    ///     Dao::new(&USER).count(uow, Some(&Matcher::new().eq("active", true)))
    /// })?;
    /// ```
    pub fn scoped<R>(
        &self,
        mode: TxMode,
        trace_id: impl Into<String>,
        f: impl FnOnce(&mut UnitOfWork) -> Result<R>,
    ) -> Result<R> {
        let mut uow = self.unit_of_work(mode, trace_id);
        let result = f(&mut uow);
        let completed = uow.complete(&result);
        match (result, completed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(completion)) => {
                log::error!(
                    "[{}] Completion failed after an error: {:#}",
                    uow.trace_id,
                    completion
                );
                Err(e)
            }
        }
    }

    /// Closes the idle connections, see [`Pool::shutdown`].
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

impl Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datasource")
            .field("pool", &self.pool)
            .finish()
    }
}

/// A sequence of statements sharing one connection and, in [`TxMode::Write`],
/// one transaction.
///
/// The connection is acquired by the first statement and given back exactly
/// once by [`UnitOfWork::complete`]. Not meant to be shared between threads.
pub struct UnitOfWork {
    pool: Arc<Pool>,
    trace: Arc<dyn TraceSink>,
    mode: TxMode,
    trace_id: String,
    state: UnitState,
    connection: Option<PooledConnection>,
    shard_key: Option<Value>,
}

impl UnitOfWork {
    pub fn mode(&self) -> TxMode {
        self.mode
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == UnitState::Completed
    }

    pub fn writer(&self) -> &dyn SqlWriter {
        self.pool.driver().sql_writer()
    }

    /// Key handed to the sharding strategy of every entity resolved through
    /// this unit of work.
    pub fn set_shard_key(&mut self, key: impl Into<Value>) {
        self.shard_key = Some(key.into());
    }

    pub fn clear_shard_key(&mut self) {
        self.shard_key = None;
    }

    pub fn shard_key(&self) -> Option<&Value> {
        self.shard_key.as_ref()
    }

    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowsAffected> {
        self.run(sql, params, |c, sql, params| c.execute(sql, params))
    }

    pub fn fetch(&mut self, sql: &str, params: &[Value]) -> Result<Vec<RowLabeled>> {
        self.run(sql, params, |c, sql, params| c.fetch(sql, params))
    }

    fn run<R>(
        &mut self,
        sql: &str,
        params: &[Value],
        f: impl FnOnce(&mut dyn Connection, &str, &[Value]) -> Result<R>,
    ) -> Result<R> {
        self.ensure_connection()?;
        let Some(connection) = self.connection.as_mut() else {
            return Err(Error::msg(format!(
                "[{}] Unit of work holds no connection",
                self.trace_id
            )));
        };
        let fingerprint = if self.trace.enabled() {
            let (json, fingerprint) = fingerprint(sql, params);
            self.trace.before(&self.trace_id, sql, &json, &fingerprint);
            Some(fingerprint)
        } else {
            None
        };
        let start = Instant::now();
        let result = f(&mut **connection, sql, params);
        if let Some(fingerprint) = fingerprint {
            self.trace.after(&self.trace_id, &fingerprint, start.elapsed());
        }
        result.map_err(|e| {
            let e = e.context(format!(
                "[{}] While executing `{}`",
                self.trace_id,
                truncate_long!(sql)
            ));
            log::error!("{:#}", e);
            if self.state == UnitState::InTransaction {
                self.rollback();
                self.state = UnitState::Failed;
            }
            e
        })
    }

    fn ensure_connection(&mut self) -> Result<()> {
        match self.state {
            UnitState::Active | UnitState::InTransaction => Ok(()),
            UnitState::Created => {
                let mut connection = self.pool.acquire().map_err(|e| {
                    e.context(format!("[{}] While acquiring a connection", self.trace_id))
                })?;
                if self.mode == TxMode::Write {
                    let mut sql = String::new();
                    self.writer().write_transaction_begin(&mut sql);
                    log::debug!("[{}] {}", self.trace_id, sql);
                    connection.execute(&sql, &[]).map_err(|e| {
                        let e = e.context(format!(
                            "[{}] While beginning the transaction",
                            self.trace_id
                        ));
                        log::error!("{:#}", e);
                        e
                    })?;
                    self.state = UnitState::InTransaction;
                } else {
                    self.state = UnitState::Active;
                }
                self.connection = Some(connection);
                Ok(())
            }
            UnitState::Failed => {
                let error = Error::msg(format!(
                    "[{}] The transaction was rolled back after an error, no further statement can run",
                    self.trace_id
                ));
                log::error!("{:#}", error);
                Err(error)
            }
            UnitState::Completed => {
                let error = Error::msg(format!(
                    "[{}] Unit of work already completed",
                    self.trace_id
                ));
                log::error!("{:#}", error);
                Err(error)
            }
        }
    }

    /// Rolls the open transaction back. A connection whose rollback fails is
    /// not returned to the pool.
    fn rollback(&mut self) {
        let mut sql = String::new();
        self.writer().write_transaction_rollback(&mut sql);
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        log::debug!("[{}] {}", self.trace_id, sql);
        if let Err(e) = connection.execute(&sql, &[]) {
            log::error!("[{}] Rollback failed: {:#}", self.trace_id, e);
            if let Some(connection) = self.connection.take() {
                connection.discard();
            }
        }
    }

    fn commit(&mut self) -> Result<()> {
        let mut sql = String::new();
        self.writer().write_transaction_commit(&mut sql);
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };
        log::debug!("[{}] {}", self.trace_id, sql);
        connection.execute(&sql, &[]).map_err(|e| {
            let e = e.context(format!("[{}] While committing", self.trace_id));
            log::error!("{:#}", e);
            e
        })?;
        Ok(())
    }

    /// Ends the unit of work with the outcome observed by the caller.
    ///
    /// Commits an open transaction when `outcome` is `Ok`, rolls it back
    /// otherwise, then releases the connection. A successful outcome after a
    /// statement already rolled the transaction back is reported as an error.
    /// Completing twice is rejected and leaves everything untouched.
    pub fn complete<T>(&mut self, outcome: &Result<T>) -> Result<()> {
        let result = match self.state {
            UnitState::Completed => {
                let error = Error::msg(format!(
                    "[{}] Unit of work completed twice",
                    self.trace_id
                ));
                log::warn!("{:#}", error);
                return Err(error);
            }
            UnitState::InTransaction if outcome.is_ok() => {
                let committed = self.commit();
                if committed.is_err() {
                    self.rollback();
                }
                committed
            }
            UnitState::InTransaction => {
                self.rollback();
                Ok(())
            }
            UnitState::Failed if outcome.is_ok() => {
                let error = Error::msg(format!(
                    "[{}] The transaction was rolled back after an earlier error, nothing was committed",
                    self.trace_id
                ));
                log::error!("{:#}", error);
                Err(error)
            }
            UnitState::Created | UnitState::Active | UnitState::Failed => Ok(()),
        };
        self.connection = None;
        self.state = UnitState::Completed;
        result
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitState::Completed || self.connection.is_none() {
            return;
        }
        log::error!(
            "[{}] Unit of work dropped without being completed, rolling back",
            self.trace_id
        );
        let _ = self.complete::<()>(&Err(Error::msg("unit of work dropped")));
    }
}

impl Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("mode", &self.mode)
            .field("trace_id", &self.trace_id)
            .field("state", &self.state)
            .field("shard_key", &self.shard_key)
            .finish()
    }
}
