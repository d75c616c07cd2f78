//! Log-search scenarios: time-windowed writes and reads

use crate::scenarios::basic::setup_hook;
use crate::scenarios::{tables, worker_finish_hook, worker_init_hook, worker_session, RunCfg};
use chrono::{Duration as ChronoDuration, Utc};
use dbmark_bench::{Scenario, WorkerFn};
use dbmark_core::{Result, SelectCtrl};
use dbmark_dal::{InsertMode, Session};
use std::sync::Arc;

/// `insert-logs`: append generated log lines, counted in rows
pub fn insert_logs(cfg: &Arc<RunCfg>) -> Scenario {
    let init = setup_hook(
        cfg.clone(),
        tables::logs_spec(),
        tables::logs_recipes(),
        false,
    );
    let cfg_in_fn = cfg.clone();
    let worker_fn: WorkerFn = Arc::new(move |ctx| {
        let cfg = cfg_in_fn.clone();
        Box::pin(async move {
            let recipes = tables::logs_recipes();
            let chunk = cfg.chunk.max(1);
            let rows = (0..chunk)
                .map(|_| ctx.rand.row_for(&recipes))
                .collect::<Result<Vec<_>>>()?;
            let columns: Vec<String> = recipes.iter().map(|r| r.name.clone()).collect();
            let session = worker_session(ctx)?;
            session
                .bulk_insert(tables::LOGS_TABLE, &columns, &rows, InsertMode::Parameterized)
                .await?;
            Ok(chunk as u64)
        })
    });
    Scenario {
        name: "insert-logs".to_string(),
        metric: "rows/sec".to_string(),
        init: Some(init),
        worker_init: Some(worker_init_hook(cfg.clone())),
        worker_fn,
        worker_finish: Some(worker_finish_hook(cfg.clone())),
        finish: None,
    }
}

/// `select-logs`: recent-window scans with severity filters, newest first
pub fn select_logs(cfg: &Arc<RunCfg>) -> Scenario {
    let init = setup_hook(
        cfg.clone(),
        tables::logs_spec(),
        tables::logs_recipes(),
        false,
    );
    let worker_fn: WorkerFn = Arc::new(move |ctx| {
        Box::pin(async move {
            // A backward window of up to one day, like a dashboard query.
            let minutes = i64::from(ctx.rand.intn(1440)) + 1;
            let since = (Utc::now() - ChronoDuration::minutes(minutes)).to_rfc3339();
            let severity = ctx.rand.pooled_string("severity", 5, 4, 8);
            let mut ctrl = SelectCtrl::new()
                .with_fields(["id", "start_time", "severity", "message"])
                .filter("start_time", vec![format!("ge({since})")])
                .filter("severity", vec![severity])
                .with_order(["desc(start_time)"])
                .with_limit(50);
            ctrl.optimize_conditions = true;
            let session = worker_session(ctx)?;
            session.select(tables::LOGS_TABLE, &ctrl).await?;
            Ok(1)
        })
    });
    Scenario {
        name: "select-logs".to_string(),
        metric: "loops/sec".to_string(),
        init: Some(init),
        worker_init: Some(worker_init_hook(cfg.clone())),
        worker_fn,
        worker_finish: Some(worker_finish_hook(cfg.clone())),
        finish: None,
    }
}
