//! PostgreSQL backend over `tokio-postgres`
//!
//! One client per worker gateway; the connection task is spawned onto the
//! runtime and logs on exit. TLS-terminated servers are not supported in
//! this build; the driver always speaks cleartext (`NoTls`).

use crate::config::ConnConfig;
use crate::dialect::Dialect;
use crate::session::{classify_exec_error, SqlDatabase, SqlDriver, StatsCounter};
use async_trait::async_trait;
use dbmark_core::{Error, Result, Rows, Value};
use std::sync::Arc;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls};
use tracing::warn;

struct PostgresDriver {
    client: Client,
    stats: Arc<StatsCounter>,
}

impl Drop for PostgresDriver {
    fn drop(&mut self) {
        self.stats.connection_closed();
    }
}

/// Open a PostgreSQL gateway
pub async fn connect(config: &ConnConfig) -> Result<SqlDatabase> {
    let (client, connection) = tokio_postgres::connect(&config.url, NoTls)
        .await
        .map_err(|e| Error::Connect {
            url: config.redacted(),
            attempts: 1,
            message: e.to_string(),
        })?;
    let redacted = config.redacted();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!(url = %redacted, error = %e, "postgres connection task ended");
        }
    });
    let stats = StatsCounter::new();
    stats.connection_opened();
    let driver = Arc::new(PostgresDriver {
        client,
        stats: stats.clone(),
    });
    Ok(SqlDatabase::new(driver, Dialect::Postgres, stats))
}

fn bind_params(params: &[Value]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    params
        .iter()
        .map(|v| -> Box<dyn ToSql + Sync + Send> {
            match v {
                Value::Null => Box::new(Option::<String>::None),
                Value::Bool(b) => Box::new(*b),
                Value::I64(v) => Box::new(*v),
                Value::U64(v) => Box::new(*v as i64),
                Value::F64(v) => Box::new(*v),
                Value::String(s) => Box::new(s.clone()),
                Value::Bytes(b) => Box::new(b.clone()),
                Value::Uuid(u) => Box::new(*u),
                Value::DateTime(t) => Box::new(*t),
                Value::Json(j) => Box::new(j.clone()),
                Value::Vector(v) => Box::new(serde_json::json!(v).to_string()),
            }
        })
        .collect()
}

fn read_column(row: &tokio_postgres::Row, idx: usize) -> Value {
    let ty = row.columns()[idx].type_();
    if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::I64(i64::from(v)))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::I64(i64::from(v)))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::I64)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::F64(f64::from(v)))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::F64)
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Bool)
    } else if *ty == Type::UUID {
        row.try_get::<_, Option<uuid::Uuid>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Uuid)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::DateTime)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, |v| Value::DateTime(v.and_utc()))
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Bytes)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::Json)
    } else {
        row.try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map_or(Value::Null, Value::String)
    }
}

#[async_trait]
impl SqlDriver for PostgresDriver {
    async fn exec_raw(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let boxed = bind_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> =
            boxed.iter().map(|b| b.as_ref() as &(dyn ToSql + Sync)).collect();
        self.client
            .execute(sql, &refs)
            .await
            .map_err(|e| classify_exec_error(e.to_string()))
    }

    async fn query_raw(&self, sql: &str, params: &[Value]) -> Result<Rows> {
        let boxed = bind_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> =
            boxed.iter().map(|b| b.as_ref() as &(dyn ToSql + Sync)).collect();
        let rows = self
            .client
            .query(sql, &refs)
            .await
            .map_err(|e| classify_exec_error(e.to_string()))?;
        let columns: Vec<String> = rows
            .first()
            .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let mut out = Rows::with_columns(columns);
        for row in &rows {
            let values = (0..row.columns().len())
                .map(|i| read_column(row, i))
                .collect();
            out.rows.push(values);
        }
        Ok(out)
    }
}
