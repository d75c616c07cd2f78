//! Scenario catalog
//!
//! Named workloads binding a table specification and a worker function into
//! the scheduler. Every scenario follows the same lifecycle: `init` creates
//! (and optionally seeds) the schema through a short-lived admin gateway,
//! `worker_init` checks each worker's gateway out of the pool, the worker
//! function drives the measured loop, and `worker_finish` checks the
//! gateway back in.

pub mod basic;
pub mod logs;
pub mod tables;
pub mod vector;

use dbmark_bench::{Scenario, WorkerCtx, WorkerHook};
use dbmark_core::{Error, Result};
use dbmark_dal::{connection_pool, release, ConnConfig, Database, Session};
use std::sync::Arc;

/// Pool worker-id used by admin (schema) connections so they never collide
/// with a measured worker's gateway
pub const ADMIN_WORKER: usize = usize::MAX;

/// Settings shared by every scenario in a run
#[derive(Debug, Clone)]
pub struct RunCfg {
    /// Connection string (scheme selects the backend)
    pub conn: String,
    /// Rows per bulk-insert call
    pub chunk: usize,
    /// Rows the read/update scenarios seed before measuring
    pub seed_rows: u64,
    /// Replace DROP with TRUNCATE at teardown
    pub use_truncate: bool,
    /// Prefix reads with the dialect's EXPLAIN
    pub explain: bool,
    /// Benchmark seed, forwarded to admin-side row generation
    pub seed: u64,
}

impl RunCfg {
    /// Connection config for one worker
    pub fn conn_config(&self, worker: usize) -> ConnConfig {
        let mut cfg = ConnConfig::new(self.conn.clone(), worker);
        cfg.use_truncate = self.use_truncate;
        cfg.explain = self.explain;
        cfg
    }
}

/// Check a worker's gateway out of the pool and park it on the context
pub fn worker_init_hook(cfg: Arc<RunCfg>) -> WorkerHook {
    Arc::new(move |ctx: &mut WorkerCtx| {
        let cfg = cfg.clone();
        Box::pin(async move {
            let conn = cfg.conn_config(ctx.index);
            let db = connection_pool(&conn).await?;
            ctx.data = Some(Box::new(db));
            Ok(())
        })
    })
}

/// Check the worker's gateway back in
pub fn worker_finish_hook(cfg: Arc<RunCfg>) -> WorkerHook {
    Arc::new(move |ctx: &mut WorkerCtx| {
        let cfg = cfg.clone();
        Box::pin(async move {
            if let Some(db) = ctx.take_data::<Box<dyn Database>>() {
                release(&cfg.conn_config(ctx.index), *db)?;
            }
            Ok(())
        })
    })
}

/// Session on the worker's parked gateway
pub fn worker_session(ctx: &mut WorkerCtx) -> Result<Box<dyn Session>> {
    let db = ctx
        .data_mut::<Box<dyn Database>>()
        .ok_or_else(|| Error::Config("worker gateway missing; worker_init not run".into()))?;
    Ok(db.session())
}

/// Check the admin gateway out of the pool (schema work, seeding, cleanup)
pub async fn admin_gateway(cfg: &RunCfg) -> Result<Box<dyn Database>> {
    connection_pool(&cfg.conn_config(ADMIN_WORKER)).await
}

/// Return the admin gateway to the pool
pub fn release_admin(cfg: &RunCfg, db: Box<dyn Database>) -> Result<()> {
    release(&cfg.conn_config(ADMIN_WORKER), db)
}

/// All registered scenarios, in catalog order
pub fn catalog(cfg: &Arc<RunCfg>) -> Vec<Scenario> {
    vec![
        basic::ping(cfg),
        basic::insert_basic(cfg),
        basic::update_basic(cfg),
        basic::delete_basic(cfg),
        basic::select_basic(cfg),
        basic::select_heavy_rand(cfg),
        vector::insert_vector(cfg),
        vector::select_vector_knn(cfg),
        logs::insert_logs(cfg),
        logs::select_logs(cfg),
    ]
}

/// Look a scenario up by name
pub fn find(cfg: &Arc<RunCfg>, name: &str) -> Result<Scenario> {
    catalog(cfg)
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| {
            Error::Config(format!(
                "unknown test '{name}'; run `dbmark list` for the catalog"
            ))
        })
}

/// Tables the cleanup command tears down
pub fn all_tables() -> Vec<&'static str> {
    vec![
        tables::BASIC_TABLE,
        tables::HEAVY_TABLE,
        tables::VECTOR_TABLE,
        tables::LOGS_TABLE,
    ]
}
