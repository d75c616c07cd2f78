//! The polymorphic database gateway
//!
//! [`Database`] is the per-worker capability set (lifecycle + DDL +
//! sessions); [`Session`] is the query surface scenarios drive in their
//! inner loop. SQL backends share one generic implementation over a small
//! [`SqlDriver`] seam, so adding a backend means writing a driver and a DDL
//! substitution column, nothing else. Search backends and ClickHouse carry
//! their own session types.
//!
//! # Transactions
//!
//! [`transact`] opens a transaction, runs the closure, commits on `Ok` and
//! rolls back otherwise. On Cassandra, Elasticsearch, and OpenSearch the
//! begin/commit pair is a no-op: the closure runs bare and consumers must
//! tolerate partial effects there. At most one transaction may be open per
//! session; a nested `begin` is a programmer error and panics.

use crate::catalog;
use crate::dialect::Dialect;
use crate::params::rewrite_placeholders;
use crate::query::sql as sql_query;
use crate::schema::sql as sql_schema;
use async_trait::async_trait;
use dashmap::DashMap;
use dbmark_core::{Error, Result, Rows, SelectCtrl, TableSpec, Value};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Bulk-insert rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// One INSERT with one bound parameter per value
    #[default]
    Parameterized,
    /// Values rendered inline with dialect-aware quoting; for drivers that
    /// cannot prepare a statement with the required argument count
    Interpolated,
}

/// Point-in-time gateway statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DbStats {
    /// Live physical connections held by this gateway
    pub open_connections: u32,
    /// Statements executed through this gateway
    pub queries: u64,
}

/// Shared counters behind [`DbStats`]
#[derive(Debug, Default)]
pub struct StatsCounter {
    open: AtomicU32,
    queries: AtomicU64,
}

impl StatsCounter {
    /// Fresh counter set
    pub fn new() -> Arc<Self> {
        Arc::new(StatsCounter::default())
    }

    /// Record a connection opening
    pub fn connection_opened(&self) {
        self.open.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closing
    pub fn connection_closed(&self) {
        self.open.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record one executed statement
    pub fn query_executed(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot
    pub fn snapshot(&self) -> DbStats {
        DbStats {
            open_connections: self.open.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
        }
    }
}

/// Per-worker database gateway capability set
#[async_trait]
pub trait Database: Send + Sync {
    /// Backend dialect
    fn dialect(&self) -> Dialect;

    /// Liveness probe
    async fn ping(&self) -> Result<()>;

    /// Gateway statistics
    fn stats(&self) -> DbStats;

    /// Whether the table (or, on search backends, its lifecycle policy)
    /// exists
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Create the table and its secondary indexes; idempotent
    async fn create_table(&self, spec: &TableSpec) -> Result<()>;

    /// Drop the table, or truncate it when `use_truncate` is set
    async fn drop_table(&self, table: &str, use_truncate: bool) -> Result<()>;

    /// Execute raw migration DDL (placeholders substituted per dialect)
    async fn apply_migration(&self, name: &str, ddl: &str) -> Result<()>;

    /// Create a secondary index over the columns
    async fn create_index(&self, table: &str, columns: &[&str]) -> Result<()>;

    /// Drop an index by name
    async fn drop_index(&self, table: &str, index: &str) -> Result<()>;

    /// Create a sequence (or its emulation)
    async fn create_sequence(&self, name: &str) -> Result<()>;

    /// Drop a sequence
    async fn drop_sequence(&self, name: &str) -> Result<()>;

    /// Open a query session sharing this gateway's connection
    fn session(&self) -> Box<dyn Session>;

    /// Session without placeholder normalization: statements pass to the
    /// driver untouched. For scenarios that hand-write dialect SQL.
    fn raw_session(&self) -> Box<dyn Session> {
        self.session()
    }

    /// Release backend resources early. Dropping the gateway does the same;
    /// this exists for callers that want the teardown on an explicit edge.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Query surface driven by worker functions
#[async_trait]
pub trait Session: Send + Sync {
    /// Backend dialect
    fn dialect(&self) -> Dialect;

    /// Execute a mutating statement; returns affected-row count where the
    /// backend reports one
    async fn exec(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a reading statement
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Rows>;

    /// First row of a reading statement
    async fn query_row(&self, sql: &str, params: &[Value]) -> Result<Option<Vec<Value>>> {
        let rows = self.query(sql, params).await?;
        Ok(rows.rows.into_iter().next())
    }

    /// Structured select against a registered table.
    ///
    /// On search backends the empty rowset is also returned when the target
    /// index is missing (HTTP 404); callers cannot distinguish that from an
    /// optimized-away predicate.
    async fn select(&self, table: &str, ctrl: &SelectCtrl) -> Result<Rows>;

    /// Insert many rows in one round-trip
    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
        mode: InsertMode,
    ) -> Result<u64>;

    /// Update rows matched by the control's WHERE
    async fn update(&self, table: &str, set: &[(String, Value)], ctrl: &SelectCtrl) -> Result<u64>;

    /// Statement warm-up hint; drivers with statement caches prepare here
    async fn prepare(&self, _sql: &str) -> Result<()> {
        Ok(())
    }

    /// Open a transaction where the dialect supports one.
    ///
    /// # Panics
    ///
    /// When a transaction is already open on this session.
    async fn begin(&self) -> Result<()>;

    /// Commit the open transaction (no-op where unsupported)
    async fn commit(&self) -> Result<()>;

    /// Roll back the open transaction (no-op where unsupported)
    async fn rollback(&self) -> Result<()>;

    /// Whether a transaction is open on this session
    fn in_transaction(&self) -> bool;
}

/// Run `body` inside a transaction: commit on `Ok`, roll back on `Err`.
///
/// Backends without transactions run the closure bare. Conflict errors are
/// surfaced to the caller; this layer never retries.
pub async fn transact<'a, F>(session: &'a dyn Session, body: F) -> Result<()>
where
    F: FnOnce(&'a dyn Session) -> BoxFuture<'a, Result<()>> + Send + 'a,
{
    session.begin().await?;
    match body(session).await {
        Ok(()) => session.commit().await,
        Err(err) => {
            if let Err(rb) = session.rollback().await {
                debug!(error = %rb, "rollback after failed transaction body");
            }
            Err(err)
        }
    }
}

/// Map a driver-reported execution error to the harness taxonomy: conflict
/// shapes surface as `TransactionConflict`, everything else as
/// `TransientQuery`.
pub fn classify_exec_error(message: impl Into<String>) -> Error {
    let message = message.into();
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("deadlock")
        || lowered.contains("serialization")
        || lowered.contains("could not serialize")
        || lowered.contains("conflict")
    {
        Error::TransactionConflict(message)
    } else {
        Error::TransientQuery(message)
    }
}

// ---------------------------------------------------------------------------
// Generic SQL gateway
// ---------------------------------------------------------------------------

/// Low-level driver seam the generic SQL gateway is built over
#[async_trait]
pub trait SqlDriver: Send + Sync {
    /// Execute a statement already in dialect form
    async fn exec_raw(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run a query already in dialect form
    async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Rows>;
}

/// [`Database`] implementation shared by the SQL backends
pub struct SqlDatabase {
    driver: Arc<dyn SqlDriver>,
    dialect: Dialect,
    stats: Arc<StatsCounter>,
    index_seq: DashMap<String, u32>,
}

impl SqlDatabase {
    /// Gateway over a connected driver
    pub fn new(driver: Arc<dyn SqlDriver>, dialect: Dialect, stats: Arc<StatsCounter>) -> Self {
        SqlDatabase {
            driver,
            dialect,
            stats,
            index_seq: DashMap::new(),
        }
    }

    async fn exec_ddl(&self, context: &str, sql: &str) -> Result<()> {
        debug!(dialect = %self.dialect, sql, "ddl");
        self.stats.query_executed();
        self.driver
            .exec_raw(sql, &[])
            .await
            .map_err(|e| Error::Migration(format!("{context}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Database for SqlDatabase {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn ping(&self) -> Result<()> {
        self.driver.query_raw("SELECT 1", &[]).await.map(|_| ())
    }

    fn stats(&self) -> DbStats {
        self.stats.snapshot()
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let (probe, takes_param) = sql_schema::table_exists_sql(self.dialect);
        if probe.is_empty() {
            return Ok(false);
        }
        let rows = if takes_param {
            let sql = rewrite_placeholders(self.dialect, probe);
            self.driver
                .query_raw(&sql, &[Value::String(table.to_string())])
                .await?
        } else {
            let sql = probe.replace("{table}", table);
            self.driver.query_raw(&sql, &[]).await?
        };
        match rows.scalar() {
            None => Ok(false),
            Some(Value::I64(0)) | Some(Value::U64(0)) => Ok(false),
            Some(_) => Ok(true),
        }
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<()> {
        catalog::register(spec);
        if self.table_exists(&spec.name).await? {
            return Ok(());
        }
        let create = sql_schema::create_table_sql(self.dialect, spec)?;
        self.exec_ddl(&spec.name, &create).await?;
        for stmt in sql_schema::create_index_sql(self.dialect, spec) {
            self.exec_ddl(&spec.name, &stmt).await?;
        }
        Ok(())
    }

    async fn drop_table(&self, table: &str, use_truncate: bool) -> Result<()> {
        let sql = sql_schema::drop_table_sql(self.dialect, table, use_truncate);
        self.exec_ddl(table, &sql).await?;
        if !use_truncate {
            catalog::forget(table);
        }
        Ok(())
    }

    async fn apply_migration(&self, name: &str, ddl: &str) -> Result<()> {
        let substituted = sql_schema::substitute_placeholders(self.dialect, ddl);
        for stmt in sql_schema::split_migration(self.dialect, &substituted) {
            self.exec_ddl(name, &stmt).await?;
        }
        Ok(())
    }

    async fn create_index(&self, table: &str, columns: &[&str]) -> Result<()> {
        let first = columns
            .first()
            .ok_or_else(|| Error::Migration("index over no columns".into()))?;
        let seq = {
            let mut entry = self.index_seq.entry(table.to_string()).or_insert(0);
            let seq = *entry;
            *entry += 1;
            seq
        };
        let name = sql_schema::index_name(table, first, seq);
        let sql = format!("CREATE INDEX {name} ON {table} ({})", columns.join(", "));
        self.exec_ddl(table, &sql).await
    }

    async fn drop_index(&self, table: &str, index: &str) -> Result<()> {
        let sql = match self.dialect {
            Dialect::MySql => format!("DROP INDEX {index} ON {table}"),
            Dialect::SqlServer => format!("DROP INDEX {table}.{index}"),
            _ => format!("DROP INDEX IF EXISTS {index}"),
        };
        self.exec_ddl(table, &sql).await
    }

    async fn create_sequence(&self, name: &str) -> Result<()> {
        for stmt in sql_schema::create_sequence_sql(self.dialect, name)? {
            self.exec_ddl(name, &stmt).await?;
        }
        Ok(())
    }

    async fn drop_sequence(&self, name: &str) -> Result<()> {
        let sql = sql_schema::drop_sequence_sql(self.dialect, name)?;
        self.exec_ddl(name, &sql).await
    }

    fn session(&self) -> Box<dyn Session> {
        Box::new(SqlSession {
            driver: self.driver.clone(),
            dialect: self.dialect,
            stats: self.stats.clone(),
            tx_open: AtomicBool::new(false),
            normalize: true,
        })
    }

    fn raw_session(&self) -> Box<dyn Session> {
        Box::new(SqlSession {
            driver: self.driver.clone(),
            dialect: self.dialect,
            stats: self.stats.clone(),
            tx_open: AtomicBool::new(false),
            normalize: false,
        })
    }
}

/// [`Session`] implementation shared by the SQL backends
pub struct SqlSession {
    driver: Arc<dyn SqlDriver>,
    dialect: Dialect,
    stats: Arc<StatsCounter>,
    tx_open: AtomicBool,
    normalize: bool,
}

impl SqlSession {
    fn normalized(&self, sql: &str) -> String {
        if self.normalize {
            rewrite_placeholders(self.dialect, sql)
        } else {
            sql.to_string()
        }
    }

    async fn run_exec(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let rewritten = self.normalized(sql);
        debug!(dialect = %self.dialect, sql = %rewritten, "exec");
        self.stats.query_executed();
        self.driver.exec_raw(&rewritten, params).await
    }

    async fn run_query(&self, sql: &str, params: &[Value]) -> Result<Rows> {
        let rewritten = self.normalized(sql);
        debug!(dialect = %self.dialect, sql = %rewritten, "query");
        self.stats.query_executed();
        self.driver.query_raw(&rewritten, params).await
    }
}

#[async_trait]
impl Session for SqlSession {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn exec(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.run_exec(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Rows> {
        self.run_query(sql, params).await
    }

    async fn select(&self, table: &str, ctrl: &SelectCtrl) -> Result<Rows> {
        match sql_query::build_select(self.dialect, table, ctrl)? {
            None => Ok(Rows::empty()),
            Some(q) => self.run_query(&q.sql, &q.params).await,
        }
    }

    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
        mode: InsertMode,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        match mode {
            InsertMode::Parameterized => {
                let sql = sql_query::build_insert(self.dialect, table, columns, rows.len())?;
                let params: Vec<Value> = rows.iter().flatten().cloned().collect();
                self.run_exec(&sql, &params).await
            }
            InsertMode::Interpolated => {
                let sql =
                    sql_query::build_insert_interpolated(self.dialect, table, columns, rows)?;
                self.run_exec(&sql, &[]).await
            }
        }
    }

    async fn update(&self, table: &str, set: &[(String, Value)], ctrl: &SelectCtrl) -> Result<u64> {
        match sql_query::build_update(self.dialect, table, set, ctrl)? {
            None => Ok(0),
            Some(q) => self.run_exec(&q.sql, &q.params).await,
        }
    }

    async fn begin(&self) -> Result<()> {
        if !self.dialect.supports_transactions() {
            return Ok(());
        }
        if self.tx_open.swap(true, Ordering::SeqCst) {
            panic!("nested transaction begin on a {} session", self.dialect);
        }
        let stmt = match self.dialect {
            Dialect::SqlServer => "BEGIN TRANSACTION",
            _ => "BEGIN",
        };
        self.run_exec(stmt, &[]).await.map(|_| ())
    }

    async fn commit(&self) -> Result<()> {
        if !self.dialect.supports_transactions() {
            return Ok(());
        }
        if !self.tx_open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.run_exec("COMMIT", &[]).await.map(|_| ())
    }

    async fn rollback(&self) -> Result<()> {
        if !self.dialect.supports_transactions() {
            return Ok(());
        }
        if !self.tx_open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.run_exec("ROLLBACK", &[]).await.map(|_| ())
    }

    fn in_transaction(&self) -> bool {
        self.tx_open.load(Ordering::SeqCst)
    }
}
