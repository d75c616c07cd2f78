//! Core CRUD scenarios: ping, insert, update, delete, select

use crate::scenarios::{
    admin_gateway, release_admin, tables, worker_finish_hook, worker_init_hook, worker_session,
    RunCfg, ADMIN_WORKER,
};
use dbmark_bench::{BenchHook, Benchmark, Scenario, WorkerFn};
use dbmark_core::{ColumnRecipe, Error, Result, SelectCtrl, TableSpec, Value};
use dbmark_dal::query::sql::{build_select, explain};
use dbmark_dal::{Database, InsertMode, Session};
use dbmark_datagen::Randomizer;
use serde_json::json;
use std::sync::Arc;

fn assemble(
    name: &str,
    metric: &str,
    cfg: &Arc<RunCfg>,
    init: BenchHook,
    worker_fn: WorkerFn,
) -> Scenario {
    Scenario {
        name: name.to_string(),
        metric: metric.to_string(),
        init: Some(init),
        worker_init: Some(worker_init_hook(cfg.clone())),
        worker_fn,
        worker_finish: Some(worker_finish_hook(cfg.clone())),
        finish: None,
    }
}

/// Create the scenario's table and optionally seed it with rows generated
/// on the admin gateway.
pub(crate) fn setup_hook(
    cfg: Arc<RunCfg>,
    spec: TableSpec,
    recipes: Vec<ColumnRecipe>,
    seed_rows: bool,
) -> BenchHook {
    Arc::new(move |bench: &Benchmark| {
        let cfg = cfg.clone();
        let spec = spec.clone();
        let recipes = recipes.clone();
        Box::pin(async move {
            let seeded = if seed_rows { cfg.seed_rows } else { 0 };
            let db = admin_gateway(&cfg).await?;
            let setup = setup_schema(db.as_ref(), &cfg, &spec, &recipes, seeded).await;
            release_admin(&cfg, db)?;
            setup?;
            bench.vault.set("seed_rows", json!(seeded));
            Ok(())
        })
    })
}

async fn setup_schema(
    db: &dyn Database,
    cfg: &RunCfg,
    spec: &TableSpec,
    recipes: &[ColumnRecipe],
    seeded: u64,
) -> Result<()> {
    db.create_table(spec).await?;
    if seeded == 0 {
        return Ok(());
    }
    let session = db.session();
    let mut rand = Randomizer::new(cfg.seed, ADMIN_WORKER);
    let columns: Vec<String> = recipes.iter().map(|r| r.name.clone()).collect();
    let mut remaining = seeded;
    while remaining > 0 {
        let n = remaining.min(cfg.chunk.max(1) as u64);
        let rows = (0..n)
            .map(|_| rand.row_for(recipes))
            .collect::<Result<Vec<_>>>()?;
        session
            .bulk_insert(&spec.name, &columns, &rows, InsertMode::Parameterized)
            .await
            .map_err(|e| Error::Migration(format!("seeding {}: {e}", spec.name)))?;
        remaining -= n;
    }
    Ok(())
}

fn seeded_id(ctx: &mut dbmark_bench::WorkerCtx) -> u64 {
    let max = ctx
        .vault
        .get("seed_rows")
        .and_then(|v| v.as_u64())
        .unwrap_or(1)
        .max(1);
    // Hot-spot skew: low ids dominate, the way tenant-heavy workloads do.
    u64::from(ctx.rand.intn_exp(max.min(u32::MAX as u64) as u32)) + 1
}

/// `ping`: connection liveness, no schema
pub fn ping(cfg: &Arc<RunCfg>) -> Scenario {
    let worker_fn: WorkerFn = Arc::new(|ctx| {
        Box::pin(async move {
            let db = ctx
                .data_mut::<Box<dyn Database>>()
                .ok_or_else(|| Error::Config("worker gateway missing".into()))?;
            db.ping().await?;
            Ok(1)
        })
    });
    let init: BenchHook = Arc::new(|_bench| Box::pin(async { Ok(()) }));
    assemble("ping", "loops/sec", cfg, init, worker_fn)
}

/// `insert-basic`: bulk inserts of generated rows, counted in rows
pub fn insert_basic(cfg: &Arc<RunCfg>) -> Scenario {
    let init = setup_hook(
        cfg.clone(),
        tables::basic_spec(),
        tables::basic_recipes(),
        false,
    );
    let cfg_in_fn = cfg.clone();
    let worker_fn: WorkerFn = Arc::new(move |ctx| {
        let cfg = cfg_in_fn.clone();
        Box::pin(async move {
            let recipes = tables::basic_recipes();
            let chunk = cfg.chunk.max(1);
            let rows = (0..chunk)
                .map(|_| ctx.rand.row_for(&recipes))
                .collect::<Result<Vec<_>>>()?;
            let columns: Vec<String> = recipes.iter().map(|r| r.name.clone()).collect();
            let session = worker_session(ctx)?;
            session
                .bulk_insert(tables::BASIC_TABLE, &columns, &rows, InsertMode::Parameterized)
                .await?;
            Ok(chunk as u64)
        })
    });
    assemble("insert-basic", "rows/sec", cfg, init, worker_fn)
}

/// `update-basic`: point updates against seeded rows
pub fn update_basic(cfg: &Arc<RunCfg>) -> Scenario {
    let init = setup_hook(
        cfg.clone(),
        tables::basic_spec(),
        tables::basic_recipes(),
        true,
    );
    let worker_fn: WorkerFn = Arc::new(move |ctx| {
        Box::pin(async move {
            let id = seeded_id(ctx);
            let new_score = i64::from(ctx.rand.intn(1_000_000));
            let session = worker_session(ctx)?;
            let ctrl = SelectCtrl::new().filter("id", vec![id.to_string()]);
            session
                .update(
                    tables::BASIC_TABLE,
                    &[("score".to_string(), Value::I64(new_score))],
                    &ctrl,
                )
                .await?;
            Ok(1)
        })
    });
    assemble("update-basic", "loops/sec", cfg, init, worker_fn)
}

/// `delete-basic`: point deletes against seeded rows (SQL backends)
pub fn delete_basic(cfg: &Arc<RunCfg>) -> Scenario {
    let init = setup_hook(
        cfg.clone(),
        tables::basic_spec(),
        tables::basic_recipes(),
        true,
    );
    let worker_fn: WorkerFn = Arc::new(move |ctx| {
        Box::pin(async move {
            let id = seeded_id(ctx);
            let session = worker_session(ctx)?;
            session
                .exec(
                    &format!("DELETE FROM {} WHERE id = $1", tables::BASIC_TABLE),
                    &[Value::I64(id as i64)],
                )
                .await?;
            Ok(1)
        })
    });
    assemble("delete-basic", "loops/sec", cfg, init, worker_fn)
}

/// `select-basic`: id-keyed point reads against seeded rows
pub fn select_basic(cfg: &Arc<RunCfg>) -> Scenario {
    let init = setup_hook(
        cfg.clone(),
        tables::basic_spec(),
        tables::basic_recipes(),
        true,
    );
    let cfg_in_fn = cfg.clone();
    let worker_fn: WorkerFn = Arc::new(move |ctx| {
        let cfg = cfg_in_fn.clone();
        Box::pin(async move {
            let id = seeded_id(ctx);
            let ctrl = SelectCtrl::new()
                .with_fields(["id", "name"])
                .filter("id", vec![id.to_string()])
                .with_order(["asc(id)"])
                .with_limit(1);
            let session = worker_session(ctx)?;
            if cfg.explain {
                let dialect = session.dialect();
                match build_select(dialect, tables::BASIC_TABLE, &ctrl)? {
                    None => return Ok(1),
                    Some(q) => {
                        let sql = explain(dialect, &q.sql)?;
                        session.query(&sql, &q.params).await?;
                    }
                }
            } else {
                session.select(tables::BASIC_TABLE, &ctrl).await?;
            }
            Ok(1)
        })
    });
    assemble("select-basic", "loops/sec", cfg, init, worker_fn)
}

/// `select-heavy-rand`: randomized range reads over the wide table with
/// condition optimization on
pub fn select_heavy_rand(cfg: &Arc<RunCfg>) -> Scenario {
    let init = setup_hook(
        cfg.clone(),
        tables::heavy_spec(),
        tables::heavy_recipes(),
        true,
    );
    let worker_fn: WorkerFn = Arc::new(move |ctx| {
        Box::pin(async move {
            let lo = i64::from(ctx.rand.intn(900_000));
            let window = i64::from(ctx.rand.intn(100_000)) + 1;
            let tenant = ctx
                .rand
                .value_for(&ColumnRecipe::new("tenant_id", "tenant_uuid").with_cardinality(64))?;
            let mut ctrl = SelectCtrl::new()
                .with_fields(["id", "uuid", "score"])
                .filter(
                    "score",
                    vec![format!("gt({lo})"), format!("le({})", lo + window)],
                )
                .filter("tenant_id", vec![tenant.to_string()])
                .with_order(["desc(updated_at)"])
                .with_limit(10);
            ctrl.optimize_conditions = true;
            let session = worker_session(ctx)?;
            session.select(tables::HEAVY_TABLE, &ctrl).await?;
            Ok(1)
        })
    });
    assemble("select-heavy-rand", "loops/sec", cfg, init, worker_fn)
}
