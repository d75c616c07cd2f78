//! # dbmark
//!
//! A benchmarking harness that measures throughput and latency of storage
//! backends (PostgreSQL, MySQL, SQL Server, SQLite, ClickHouse, Cassandra,
//! Elasticsearch, OpenSearch) under synthetic workloads. An operator picks
//! a scenario, a concurrency level, an iteration or wall-clock budget, and
//! a connection string; the harness creates schemas, manufactures rows,
//! drives a worker pool, and reports an aggregate rate.
//!
//! # Quick start
//!
//! ```no_run
//! use dbmark::{BenchOpts, Benchmark, Scenario};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> dbmark::Result<()> {
//!     let mut bench = Benchmark::new(BenchOpts {
//!         workers: 4,
//!         loops: 10_000,
//!         duration: None,
//!         ..BenchOpts::default()
//!     });
//!     let scenario = Scenario::from_fn(
//!         "noop",
//!         Arc::new(|_ctx| Box::pin(async { Ok(1) })),
//!     );
//!     let board = bench.run(&scenario).await?;
//!     println!("{}", board.scores()[0]);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate            | Responsibility                                      |
//! |------------------|-----------------------------------------------------|
//! | `dbmark-core`    | Errors, values, recipes, table specs, `SelectCtrl`  |
//! | `dbmark-datagen` | Deterministic per-worker synthetic data             |
//! | `dbmark-dal`     | Dialect registry, pool, gateway, query builder, DDL |
//! | `dbmark-bench`   | Worker scheduler, budgets, shutdown, rate scores    |
//! | `dbmark-cli`     | The `dbmark` binary and its scenario catalog        |
//!
//! This facade re-exports the public surface; the member crates are not
//! meant to be depended on individually.

pub use dbmark_core::{
    ColumnDef, ColumnRecipe, DataType, Error, Page, Resilience, Result, Rows, SelectCtrl,
    TableSpec, TypeTag, Value,
};

pub use dbmark_datagen::{register_plugin, Randomizer, Streams, ValuePlugin};

pub use dbmark_dal::{
    connection_pool, release, transact, ConnConfig, Database, DbStats, Dialect, InsertMode,
    Placeholder, PoolKey, Session,
};

pub use dbmark_bench::{
    format_sig4, install_signal_handler, BenchOpts, Benchmark, Scenario, Score, ScoreBoard,
    Shutdown, Vault, WorkerCtx, WorkerFn,
};

/// Access-layer internals re-exported for advanced scenario authors
/// (structured lowering, schema bodies, the worker-keyed pool).
pub mod dal {
    pub use dbmark_dal::*;
}
