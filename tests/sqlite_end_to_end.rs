//! End-to-end runs against SQLite: the full path from scenario hooks
//! through the scheduler, the pool, the query builder, and a real backend.

use dbmark::{
    connection_pool, release, BenchOpts, ColumnDef, ColumnRecipe, ConnConfig, DataType, Database,
    InsertMode, Result, Scenario, SelectCtrl, TableSpec, Value, WorkerCtx,
};
use std::sync::Arc;
use tempfile::TempDir;

const ADMIN: usize = usize::MAX;

fn spec(table: &str) -> TableSpec {
    TableSpec::new(
        table,
        vec![
            ColumnDef::indexed("id", DataType::Id),
            ColumnDef::new("name", DataType::String),
        ],
    )
}

fn recipes() -> Vec<ColumnRecipe> {
    vec![ColumnRecipe::new("name", "string")
        .with_cardinality(10)
        .with_sizes(4, 8)]
}

/// An insert scenario equivalent to the catalog's, scoped to one test table
fn insert_scenario(url: String, table: &'static str) -> Scenario {
    let init_url = url.clone();
    let worker_url = url.clone();
    let finish_url = url;
    Scenario {
        name: format!("insert-{table}"),
        metric: "rows/sec".into(),
        init: Some(Arc::new(move |_bench| {
            let url = init_url.clone();
            Box::pin(async move {
                let conn = ConnConfig::new(url.clone(), ADMIN);
                let db = connection_pool(&conn).await?;
                db.create_table(&spec(table)).await?;
                release(&conn, db)?;
                Ok(())
            })
        })),
        worker_init: Some(Arc::new(move |ctx: &mut WorkerCtx| {
            let url = worker_url.clone();
            Box::pin(async move {
                let conn = ConnConfig::new(url, ctx.index);
                let db = connection_pool(&conn).await?;
                ctx.data = Some(Box::new(db));
                Ok(())
            })
        })),
        worker_fn: Arc::new(move |ctx: &mut WorkerCtx| {
            Box::pin(async move {
                let row = ctx.rand.row_for(&recipes())?;
                let session = ctx
                    .data_mut::<Box<dyn Database>>()
                    .expect("gateway parked by worker_init")
                    .session();
                session
                    .bulk_insert(table, &["name".to_string()], &[row], InsertMode::Parameterized)
                    .await?;
                Ok(1)
            })
        }),
        worker_finish: Some(Arc::new(move |ctx: &mut WorkerCtx| {
            let url = finish_url.clone();
            Box::pin(async move {
                if let Some(db) = ctx.take_data::<Box<dyn Database>>() {
                    release(&ConnConfig::new(url, ctx.index), *db)?;
                }
                Ok(())
            })
        })),
        finish: None,
    }
}

async fn count(url: &str, sql: &str) -> Result<i64> {
    let conn = ConnConfig::new(url.to_string(), ADMIN);
    let db = connection_pool(&conn).await?;
    let row = db.session().query_row(sql, &[]).await?.expect("count row");
    release(&conn, db)?;
    Ok(row[0].as_i64().expect("integer count"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_workers_split_a_hundred_loops() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}/s1.db", dir.path().display());
    let mut bench = dbmark::Benchmark::new(BenchOpts {
        workers: 2,
        loops: 100,
        duration: None,
        ..BenchOpts::default()
    });
    let board = bench
        .run(&insert_scenario(url.clone(), "e2e_insert_count"))
        .await
        .unwrap();

    let score = &board.scores()[0];
    assert_eq!(score.workers, 2);
    assert_eq!(score.loops, 100);
    assert!(score.rate > 0.0);

    let total = count(&url, "SELECT COUNT(*) FROM e2e_insert_count")
        .await
        .unwrap();
    assert_eq!(total, 100);

    let distinct = count(&url, "SELECT COUNT(DISTINCT name) FROM e2e_insert_count")
        .await
        .unwrap();
    assert!(
        (1..=10).contains(&distinct),
        "cardinality bound exceeded: {distinct}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn structured_select_and_update_against_live_rows() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}/sel.db", dir.path().display());
    let table = "e2e_select_update";

    let conn = ConnConfig::new(url.clone(), ADMIN);
    let db = connection_pool(&conn).await.unwrap();
    db.create_table(&spec(table)).await.unwrap();
    let session = db.session();
    for name in ["alpha", "beta", "gamma"] {
        session
            .bulk_insert(
                table,
                &["name".to_string()],
                &[vec![Value::from(name)]],
                InsertMode::Parameterized,
            )
            .await
            .unwrap();
    }

    // Structured select with the optimizer on: ids 1 and 3 survive the
    // interval, id 99 is trimmed away.
    let mut ctrl = SelectCtrl::new()
        .with_fields(["id", "name"])
        .filter("id", vec!["ge(1)", "le(3)", "1", "3", "99"])
        .with_order(["asc(id)"]);
    ctrl.optimize_conditions = true;
    let rows = session.select(table, &ctrl).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.value(0, "name"), Some(&Value::String("alpha".into())));
    assert_eq!(rows.value(1, "name"), Some(&Value::String("gamma".into())));

    // Empty intersection: no backend round-trip, empty sentinel back.
    let mut empty = SelectCtrl::new().filter("id", vec!["gt(129)", "le(121)"]);
    empty.optimize_conditions = true;
    let before = db.stats().queries;
    let rows = session.select(table, &empty).await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(db.stats().queries, before, "backend touched on empty intersection");

    // Structured update flows through the same lowering.
    let updated = session
        .update(
            table,
            &[("name".to_string(), Value::from("renamed"))],
            &SelectCtrl::new().filter("id", vec!["2"]),
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);
    let row = session
        .query_row("SELECT name FROM e2e_select_update WHERE id = $1", &[Value::I64(2)])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row[0], Value::String("renamed".into()));

    release(&conn, db).unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pool_round_trip_and_double_release() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}/pool.db", dir.path().display());
    let conn = ConnConfig::new(url.clone(), 3);

    let db = connection_pool(&conn).await.unwrap();
    let queries_before = db.stats().queries;
    release(&conn, db).unwrap();

    // The same worker gets its warm gateway back, statistics intact.
    let db = connection_pool(&conn).await.unwrap();
    assert_eq!(db.stats().queries, queries_before);

    // Releasing twice under one key is a programmer error.
    let second = connection_pool(&ConnConfig::new(url.clone(), 4)).await.unwrap();
    release(&conn, db).unwrap();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        release(&conn, second).unwrap();
    }));
    assert!(result.is_err(), "double put must be detected");
}
