//! Database access layer for the dbmark harness
//!
//! A dialect-polymorphic gateway over relational engines (PostgreSQL,
//! MySQL, SQL Server, SQLite, ClickHouse, Cassandra) and search engines
//! (Elasticsearch, OpenSearch). One [`Database`] per worker, acquired
//! through [`registry::connection_pool`] and parked in the worker-keyed
//! [`pool`] between runs.
//!
//! # Architecture
//!
//! ```text
//! scenario code
//!      │  SelectCtrl / SQL-with-$N / TableSpec
//! ┌────┴─────────────────────────────────────┐
//! │ Session  (select, bulk_insert, update,   │
//! │           exec, query, transact)         │
//! ├──────────────────────────────────────────┤
//! │ query::terms → query::conditions ─┬─ sql │
//! │ (parse)       (type + optimize)   └─ search
//! ├──────────────────────────────────────────┤
//! │ Database (ping, DDL, sessions)           │
//! │ schema::sql / schema::search             │
//! ├──────────────────────────────────────────┤
//! │ backends: rusqlite │ tokio-postgres │    │
//! │ mysql_async │ clickhouse HTTP │ ES/OS    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! SQL Server and Cassandra are fully defined at the dialect level
//! (placeholders, DDL templates, batch wrapping) but have no live connector
//! in this build; the registry reports a capability error for them.

pub mod backends;
pub mod catalog;
pub mod config;
pub mod dialect;
pub mod leak;
pub mod params;
pub mod pool;
pub mod query;
pub mod registry;
pub mod schema;
pub mod session;

pub use config::ConnConfig;
pub use dialect::{Dialect, Placeholder};
pub use pool::PoolKey;
pub use registry::{connection_pool, release};
pub use session::{transact, Database, DbStats, InsertMode, Session};
