//! Dense-vector scenarios (search backends)

use crate::scenarios::basic::setup_hook;
use crate::scenarios::{tables, worker_finish_hook, worker_init_hook, worker_session, RunCfg};
use dbmark_bench::{Scenario, WorkerFn};
use dbmark_core::{ColumnRecipe, Result, SelectCtrl, Value};
use dbmark_dal::{InsertMode, Session};
use dbmark_datagen::Randomizer;
use std::sync::Arc;

/// Draw a query vector and render it as a `nearest()` literal
fn vector_literal(rand: &mut Randomizer, dim: usize) -> Result<String> {
    let recipe = ColumnRecipe::new("query", "embedding").with_sizes(dim, dim);
    match rand.value_for(&recipe)? {
        Value::Vector(v) => {
            let joined = v
                .iter()
                .map(|c| format!("{c:.6}"))
                .collect::<Vec<_>>()
                .join(",");
            Ok(format!("[{joined}]"))
        }
        other => Ok(format!("[{other}]")),
    }
}

/// `insert-vector`: bulk index embeddings, counted in rows
pub fn insert_vector(cfg: &Arc<RunCfg>) -> Scenario {
    let init = setup_hook(
        cfg.clone(),
        tables::vector_spec(),
        tables::vector_recipes(),
        false,
    );
    let cfg_in_fn = cfg.clone();
    let worker_fn: WorkerFn = Arc::new(move |ctx| {
        let cfg = cfg_in_fn.clone();
        Box::pin(async move {
            let recipes = tables::vector_recipes();
            let chunk = cfg.chunk.max(1);
            let rows = (0..chunk)
                .map(|_| ctx.rand.row_for(&recipes))
                .collect::<Result<Vec<_>>>()?;
            let columns: Vec<String> = recipes.iter().map(|r| r.name.clone()).collect();
            let session = worker_session(ctx)?;
            session
                .bulk_insert(tables::VECTOR_TABLE, &columns, &rows, InsertMode::Parameterized)
                .await?;
            Ok(chunk as u64)
        })
    });
    Scenario {
        name: "insert-vector".to_string(),
        metric: "rows/sec".to_string(),
        init: Some(init),
        worker_init: Some(worker_init_hook(cfg.clone())),
        worker_fn,
        worker_finish: Some(worker_finish_hook(cfg.clone())),
        finish: None,
    }
}

/// `select-vector-knn`: kNN reads ordered by `nearest(embedding;L2;…)`
pub fn select_vector_knn(cfg: &Arc<RunCfg>) -> Scenario {
    let init = setup_hook(
        cfg.clone(),
        tables::vector_spec(),
        tables::vector_recipes(),
        false,
    );
    let worker_fn: WorkerFn = Arc::new(move |ctx| {
        Box::pin(async move {
            let literal = vector_literal(&mut ctx.rand, tables::VECTOR_DIM as usize)?;
            let ctrl = SelectCtrl::new()
                .with_fields(["id", "embedding"])
                .with_order([format!("nearest(embedding;L2;{literal})")])
                .with_limit(10);
            let session = worker_session(ctx)?;
            session.select(tables::VECTOR_TABLE, &ctrl).await?;
            Ok(1)
        })
    });
    Scenario {
        name: "select-vector-knn".to_string(),
        metric: "loops/sec".to_string(),
        init: Some(init),
        worker_init: Some(worker_init_hook(cfg.clone())),
        worker_fn,
        worker_finish: Some(worker_finish_hook(cfg.clone())),
        finish: None,
    }
}
