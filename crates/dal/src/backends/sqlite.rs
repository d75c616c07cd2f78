//! SQLite backend over `rusqlite`
//!
//! SQLite is in-process, so the driver is synchronous under the async seam;
//! statements run inline on the worker without yielding. The connection is
//! mutex-guarded because [`SqlDriver`] is shared between the gateway and its
//! sessions, and the lock is never held across an await point.

use crate::config::ConnConfig;
use crate::session::{classify_exec_error, SqlDatabase, SqlDriver, StatsCounter};
use async_trait::async_trait;
use chrono::SecondsFormat;
use dbmark_core::{Error, Result, Rows, Value};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::sync::Arc;

struct SqliteDriver {
    conn: Mutex<Connection>,
    stats: Arc<StatsCounter>,
}

impl Drop for SqliteDriver {
    fn drop(&mut self) {
        self.stats.connection_closed();
    }
}

/// Open a SQLite gateway. `sqlite:///path/to.db` opens a file,
/// `sqlite://:memory:` (or an empty path) an in-memory database.
pub fn connect(config: &ConnConfig) -> Result<SqlDatabase> {
    let path = path_of(&config.url)?;
    let in_memory = path.is_empty() || path == ":memory:";
    let conn = if in_memory {
        Connection::open_in_memory()
    } else {
        Connection::open(&path)
    }
    .map_err(|e| Error::Connect {
        url: config.redacted(),
        attempts: 1,
        message: e.to_string(),
    })?;
    // Several workers share one database file; WAL plus a busy timeout lets
    // their writes serialize instead of failing with SQLITE_BUSY.
    conn.busy_timeout(std::time::Duration::from_secs(10))
        .map_err(|e| Error::Connect {
            url: config.redacted(),
            attempts: 1,
            message: e.to_string(),
        })?;
    if !in_memory {
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
    }
    let stats = StatsCounter::new();
    stats.connection_opened();
    let driver = Arc::new(SqliteDriver {
        conn: Mutex::new(conn),
        stats: stats.clone(),
    });
    Ok(SqlDatabase::new(driver, crate::dialect::Dialect::Sqlite, stats))
}

fn path_of(url: &str) -> Result<String> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite3://"))
        .ok_or_else(|| Error::Config(format!("not a sqlite connection string: '{url}'")))?;
    Ok(rest.to_string())
}

fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::I64(v) => SqlValue::Integer(*v),
        Value::U64(v) => i64::try_from(*v)
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(v.to_string())),
        Value::F64(v) => SqlValue::Real(*v),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Uuid(u) => SqlValue::Text(u.to_string()),
        Value::DateTime(t) => SqlValue::Text(t.to_rfc3339_opts(SecondsFormat::Micros, true)),
        Value::Json(j) => SqlValue::Text(j.to_string()),
        Value::Vector(v) => SqlValue::Text(serde_json::json!(v).to_string()),
    }
}

fn read_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::I64(v),
        SqlValue::Real(v) => Value::F64(v),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::Bytes(b),
    }
}

#[async_trait]
impl SqlDriver for SqliteDriver {
    async fn exec_raw(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let conn = self.conn.lock();
        let bound: Vec<SqlValue> = params.iter().map(bind_value).collect();
        let affected = conn
            .execute(sql, rusqlite::params_from_iter(bound))
            .map_err(|e| classify_exec_error(e.to_string()))?;
        Ok(affected as u64)
    }

    async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Rows> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| classify_exec_error(e.to_string()))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let bound: Vec<SqlValue> = params.iter().map(bind_value).collect();
        let mut out = Rows::with_columns(columns.clone());
        let mut rows = stmt
            .query(rusqlite::params_from_iter(bound))
            .map_err(|e| classify_exec_error(e.to_string()))?;
        while let Some(row) = rows.next().map_err(|e| classify_exec_error(e.to_string()))? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let v: SqlValue = row
                    .get(i)
                    .map_err(|e| classify_exec_error(e.to_string()))?;
                values.push(read_value(v));
            }
            out.rows.push(values);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Database, InsertMode, Session};
    use dbmark_core::{ColumnDef, DataType, SelectCtrl, TableSpec};

    fn spec(name: &str) -> TableSpec {
        TableSpec::new(
            name,
            vec![
                ColumnDef::indexed("id", DataType::Id),
                ColumnDef::new("name", DataType::String),
                ColumnDef::indexed("score", DataType::BigInt),
            ],
        )
    }

    #[tokio::test]
    async fn create_insert_select_round_trip() {
        let db = connect(&ConnConfig::new("sqlite://:memory:", 0)).unwrap();
        db.create_table(&spec("sqlite_rt")).await.unwrap();
        assert!(db.table_exists("sqlite_rt").await.unwrap());
        // Idempotent re-create.
        db.create_table(&spec("sqlite_rt")).await.unwrap();

        let session = db.session();
        let rows = vec![
            vec![Value::from("alpha"), Value::I64(10)],
            vec![Value::from("beta"), Value::I64(20)],
        ];
        let inserted = session
            .bulk_insert(
                "sqlite_rt",
                &["name".to_string(), "score".to_string()],
                &rows,
                InsertMode::Parameterized,
            )
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let ctrl = SelectCtrl::new()
            .with_fields(["name", "score"])
            .filter("score", vec!["ge(20)"]);
        let got = session.select("sqlite_rt", &ctrl).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got.value(0, "name"), Some(&Value::String("beta".into())));

        let count = session
            .query_row("SELECT COUNT(*) FROM sqlite_rt", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count[0], Value::I64(2));
        crate::catalog::forget("sqlite_rt");
    }

    #[tokio::test]
    async fn placeholder_rewrite_is_applied() {
        let db = connect(&ConnConfig::new("sqlite://:memory:", 0)).unwrap();
        db.create_table(&spec("sqlite_ph")).await.unwrap();
        let session = db.session();
        session
            .exec(
                "INSERT INTO sqlite_ph (name, score) VALUES ($1, $2)",
                &[Value::from("x"), Value::I64(1)],
            )
            .await
            .unwrap();
        let row = session
            .query_row(
                "SELECT score FROM sqlite_ph WHERE name = $1",
                &[Value::from("x")],
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row[0], Value::I64(1));
        crate::catalog::forget("sqlite_ph");
    }

    #[tokio::test]
    async fn transact_commits_and_rolls_back() {
        let db = connect(&ConnConfig::new("sqlite://:memory:", 0)).unwrap();
        db.create_table(&spec("sqlite_tx")).await.unwrap();
        let session = db.session();

        crate::session::transact(session.as_ref(), |s| {
            Box::pin(async move {
                s.exec(
                    "INSERT INTO sqlite_tx (name, score) VALUES ($1, $2)",
                    &[Value::from("keep"), Value::I64(1)],
                )
                .await?;
                Ok(())
            })
        })
        .await
        .unwrap();

        let failed = crate::session::transact(session.as_ref(), |s| {
            Box::pin(async move {
                s.exec(
                    "INSERT INTO sqlite_tx (name, score) VALUES ($1, $2)",
                    &[Value::from("drop"), Value::I64(2)],
                )
                .await?;
                Err(Error::TransientQuery("forced".into()))
            })
        })
        .await;
        assert!(failed.is_err());

        let count = session
            .query_row("SELECT COUNT(*) FROM sqlite_tx", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count[0], Value::I64(1));
        crate::catalog::forget("sqlite_tx");
    }

    #[tokio::test]
    async fn interpolated_insert_works() {
        let db = connect(&ConnConfig::new("sqlite://:memory:", 0)).unwrap();
        db.create_table(&spec("sqlite_interp")).await.unwrap();
        let session = db.session();
        session
            .bulk_insert(
                "sqlite_interp",
                &["name".to_string(), "score".to_string()],
                &[vec![Value::from("o'neil"), Value::I64(3)]],
                InsertMode::Interpolated,
            )
            .await
            .unwrap();
        let row = session
            .query_row("SELECT name FROM sqlite_interp", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row[0], Value::String("o'neil".into()));
        crate::catalog::forget("sqlite_interp");
    }

    #[tokio::test]
    async fn stats_count_connection_and_queries() {
        let db = connect(&ConnConfig::new("sqlite://:memory:", 0)).unwrap();
        assert_eq!(db.stats().open_connections, 1);
        let before = db.stats().queries;
        db.session().query("SELECT 1", &[]).await.unwrap();
        assert!(db.stats().queries > before);
    }
}
