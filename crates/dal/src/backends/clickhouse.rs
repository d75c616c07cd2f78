//! ClickHouse backend over the HTTP interface
//!
//! Statements post to `http://host:8123/?database=<db>`; reads append
//! `FORMAT JSON` and parse the columnar response. The HTTP interface has no
//! bound parameters, so every statement is interpolated with dialect-aware
//! quoting before it leaves the process.
//!
//! Transactions are modeled the way the native batch API behaves: `begin`
//! opens a client-side insert batch, `bulk_insert` appends to it, `commit`
//! flushes the whole batch as one `JSONEachRow` POST per (table, columns)
//! group, `rollback` discards it. Tables have no server-side autoincrement;
//! when the registered spec declares an id column the session assigns it
//! from a process-wide monotonic counter.

use crate::catalog;
use crate::config::ConnConfig;
use crate::dialect::Dialect;
use crate::params::interpolate_placeholders;
use crate::query::sql as sql_query;
use crate::schema::sql as sql_schema;
use crate::session::{
    classify_exec_error, Database, DbStats, InsertMode, Session, StatsCounter,
};
use async_trait::async_trait;
use dashmap::DashMap;
use dbmark_core::{Error, Result, Rows, SelectCtrl, TableSpec, Value};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Client-side row-id counters, shared process-wide so every worker's
/// inserts stay collision-free.
static ROW_IDS: Lazy<DashMap<String, Arc<AtomicU64>>> = Lazy::new(DashMap::new);

fn next_row_id(table: &str) -> u64 {
    ROW_IDS
        .entry(table.to_string())
        .or_insert_with(|| Arc::new(AtomicU64::new(1)))
        .fetch_add(1, Ordering::Relaxed)
}

struct ChHttp {
    http: reqwest::Client,
    endpoint: String,
    database: String,
    user: Option<String>,
    password: Option<String>,
    stats: Arc<StatsCounter>,
}

impl ChHttp {
    fn request(&self, body: String) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(&self.endpoint)
            .query(&[("database", self.database.as_str())])
            .body(body);
        if let Some(user) = &self.user {
            req = req.basic_auth(user, self.password.as_deref());
        }
        req
    }

    async fn exec(&self, sql: &str) -> Result<u64> {
        debug!(sql, "clickhouse exec");
        self.stats.query_executed();
        let resp = self
            .request(sql.to_string())
            .send()
            .await
            .map_err(|e| classify_exec_error(e.to_string()))?;
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(classify_exec_error(message));
        }
        Ok(0)
    }

    async fn query(&self, sql: &str) -> Result<Rows> {
        debug!(sql, "clickhouse query");
        self.stats.query_executed();
        let body = format!("{sql} FORMAT JSON");
        let resp = self
            .request(body)
            .send()
            .await
            .map_err(|e| classify_exec_error(e.to_string()))?;
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(classify_exec_error(message));
        }
        let parsed: Json = resp
            .json()
            .await
            .map_err(|e| classify_exec_error(e.to_string()))?;
        Ok(rows_from_json(&parsed))
    }
}

fn rows_from_json(parsed: &Json) -> Rows {
    let columns: Vec<String> = parsed["meta"]
        .as_array()
        .map(|meta| {
            meta.iter()
                .filter_map(|m| m["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let mut out = Rows::with_columns(columns.clone());
    if let Some(data) = parsed["data"].as_array() {
        for row in data {
            let values = columns
                .iter()
                .map(|c| json_to_value(&row[c]))
                .collect();
            out.rows.push(values);
        }
    }
    out
}

fn json_to_value(v: &Json) -> Value {
    match v {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::I64(i)
            } else if let Some(u) = n.as_u64() {
                Value::U64(u)
            } else {
                Value::F64(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => {
            // ClickHouse JSON format renders big integers as strings.
            if let Ok(i) = s.parse::<i64>() {
                Value::I64(i)
            } else {
                Value::String(s.clone())
            }
        }
        other => Value::Json(other.clone()),
    }
}

/// ClickHouse gateway
pub struct ClickHouseDatabase {
    inner: Arc<ChHttp>,
}

/// Open a ClickHouse gateway (`clickhouse://[user[:pass]@]host[:port]/db`)
pub fn connect(config: &ConnConfig) -> Result<ClickHouseDatabase> {
    let url = config.parsed()?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::Config("clickhouse connection string has no host".into()))?;
    let port = url.port().unwrap_or(8123);
    let database = url.path().trim_start_matches('/');
    let database = if database.is_empty() { "default" } else { database };
    let http = reqwest::Client::builder()
        .danger_accept_invalid_certs(config.tls_ca.is_none())
        .build()
        .map_err(|e| Error::Config(format!("http client: {e}")))?;
    let stats = StatsCounter::new();
    stats.connection_opened();
    Ok(ClickHouseDatabase {
        inner: Arc::new(ChHttp {
            http,
            endpoint: format!("http://{host}:{port}/"),
            database: database.to_string(),
            user: (!url.username().is_empty()).then(|| url.username().to_string()),
            password: url.password().map(str::to_string),
            stats,
        }),
    })
}

#[async_trait]
impl Database for ClickHouseDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::ClickHouse
    }

    async fn ping(&self) -> Result<()> {
        self.inner.query("SELECT 1").await.map(|_| ())
    }

    fn stats(&self) -> DbStats {
        self.inner.stats.snapshot()
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let rows = self.inner.query(&format!("EXISTS TABLE {table}")).await?;
        Ok(matches!(rows.scalar(), Some(Value::I64(1)) | Some(Value::U64(1))))
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<()> {
        catalog::register(spec);
        if self.table_exists(&spec.name).await? {
            return Ok(());
        }
        let sql = sql_schema::create_table_sql(Dialect::ClickHouse, spec)?;
        self.inner
            .exec(&sql)
            .await
            .map_err(|e| Error::Migration(format!("{}: {e}", spec.name)))?;
        Ok(())
    }

    async fn drop_table(&self, table: &str, use_truncate: bool) -> Result<()> {
        let sql = sql_schema::drop_table_sql(Dialect::ClickHouse, table, use_truncate);
        self.inner
            .exec(&sql)
            .await
            .map_err(|e| Error::Migration(format!("{table}: {e}")))?;
        if !use_truncate {
            catalog::forget(table);
        }
        Ok(())
    }

    async fn apply_migration(&self, name: &str, ddl: &str) -> Result<()> {
        let substituted = sql_schema::substitute_placeholders(Dialect::ClickHouse, ddl);
        for stmt in sql_schema::split_migration(Dialect::ClickHouse, &substituted) {
            self.inner
                .exec(&stmt)
                .await
                .map_err(|e| Error::Migration(format!("{name}: {e}")))?;
        }
        Ok(())
    }

    async fn create_index(&self, _table: &str, _columns: &[&str]) -> Result<()> {
        Err(Error::Capability("secondary indexes on clickhouse".into()))
    }

    async fn drop_index(&self, _table: &str, _index: &str) -> Result<()> {
        Err(Error::Capability("secondary indexes on clickhouse".into()))
    }

    async fn create_sequence(&self, _name: &str) -> Result<()> {
        Err(Error::Capability("sequences on clickhouse".into()))
    }

    async fn drop_sequence(&self, _name: &str) -> Result<()> {
        Err(Error::Capability("sequences on clickhouse".into()))
    }

    fn session(&self) -> Box<dyn Session> {
        Box::new(ClickHouseSession {
            inner: self.inner.clone(),
            batch: Mutex::new(None),
        })
    }
}

/// One buffered insert group
struct BatchedInsert {
    table: String,
    columns: Vec<String>,
    lines: Vec<String>,
}

/// ClickHouse session with client-side insert batching
pub struct ClickHouseSession {
    inner: Arc<ChHttp>,
    batch: Mutex<Option<Vec<BatchedInsert>>>,
}

impl ClickHouseSession {
    fn render_lines(table: &str, columns: &mut Vec<String>, rows: &[Vec<Value>]) -> Vec<String> {
        // Tables with a declared id column and no id in the insert get one
        // assigned from the monotonic counter.
        let autoinc = catalog::fields(table)
            .ok()
            .and_then(|f| f.autoinc_column().map(str::to_string))
            .filter(|id| !columns.contains(id));
        if let Some(id) = &autoinc {
            columns.insert(0, id.clone());
        }
        rows.iter()
            .map(|row| {
                let mut doc = serde_json::Map::with_capacity(columns.len());
                if let Some(id) = &autoinc {
                    doc.insert(id.clone(), Json::from(next_row_id(table)));
                }
                for (col, value) in columns.iter().skip(usize::from(autoinc.is_some())).zip(row) {
                    doc.insert(col.clone(), value.to_json());
                }
                Json::Object(doc).to_string()
            })
            .collect()
    }

    async fn post_insert(&self, table: &str, columns: &[String], lines: &[String]) -> Result<u64> {
        let body = format!(
            "INSERT INTO {table} ({}) FORMAT JSONEachRow\n{}",
            columns.join(", "),
            lines.join("\n")
        );
        self.inner.exec(&body).await?;
        Ok(lines.len() as u64)
    }
}

#[async_trait]
impl Session for ClickHouseSession {
    fn dialect(&self) -> Dialect {
        Dialect::ClickHouse
    }

    async fn exec(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let inline = interpolate_placeholders(Dialect::ClickHouse, sql, params)?;
        self.inner.exec(&inline).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Rows> {
        let inline = interpolate_placeholders(Dialect::ClickHouse, sql, params)?;
        self.inner.query(&inline).await
    }

    async fn select(&self, table: &str, ctrl: &SelectCtrl) -> Result<Rows> {
        match sql_query::build_select(Dialect::ClickHouse, table, ctrl)? {
            None => Ok(Rows::empty()),
            Some(q) => {
                let inline = interpolate_placeholders(Dialect::ClickHouse, &q.sql, &q.params)?;
                self.inner.query(&inline).await
            }
        }
    }

    async fn bulk_insert(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
        _mode: InsertMode,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut columns = columns.to_vec();
        let lines = Self::render_lines(table, &mut columns, rows);
        let buffered = {
            let mut batch = self.batch.lock();
            match batch.as_mut() {
                Some(groups) => {
                    match groups
                        .iter_mut()
                        .find(|g| g.table == table && g.columns == columns)
                    {
                        Some(group) => group.lines.extend(lines.iter().cloned()),
                        None => groups.push(BatchedInsert {
                            table: table.to_string(),
                            columns: columns.clone(),
                            lines: lines.clone(),
                        }),
                    }
                    true
                }
                None => false,
            }
        };
        if buffered {
            return Ok(lines.len() as u64);
        }
        self.post_insert(table, &columns, &lines).await
    }

    async fn update(&self, table: &str, set: &[(String, Value)], ctrl: &SelectCtrl) -> Result<u64> {
        // ClickHouse spells UPDATE as a mutation.
        match sql_query::build_update(Dialect::ClickHouse, table, set, ctrl)? {
            None => Ok(0),
            Some(q) => {
                let prefix = format!("UPDATE {table} SET ");
                let rest = q.sql.strip_prefix(&prefix).ok_or_else(|| {
                    Error::TransientQuery(format!("unexpected update shape: {}", q.sql))
                })?;
                let mutation = if rest.contains(" WHERE ") {
                    format!("ALTER TABLE {table} UPDATE {rest}")
                } else {
                    format!("ALTER TABLE {table} UPDATE {rest} WHERE 1")
                };
                let inline =
                    interpolate_placeholders(Dialect::ClickHouse, &mutation, &q.params)?;
                self.inner.exec(&inline).await
            }
        }
    }

    async fn begin(&self) -> Result<()> {
        let mut batch = self.batch.lock();
        if batch.is_some() {
            panic!("nested transaction begin on a clickhouse session");
        }
        *batch = Some(Vec::new());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let groups = self.batch.lock().take();
        if let Some(groups) = groups {
            for group in groups {
                self.post_insert(&group.table, &group.columns, &group.lines)
                    .await?;
            }
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.batch.lock().take();
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.batch.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmark_core::{ColumnDef, DataType};

    #[test]
    fn json_rows_parse_meta_and_data() {
        let parsed: Json = serde_json::from_str(
            r#"{"meta":[{"name":"id","type":"Int64"},{"name":"n","type":"String"}],
                "data":[{"id":"7","n":"x"},{"id":"8","n":"y"}],"rows":2}"#,
        )
        .unwrap();
        let rows = rows_from_json(&parsed);
        assert_eq!(rows.columns, vec!["id", "n"]);
        assert_eq!(rows.rows[0], vec![Value::I64(7), Value::String("x".into())]);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn render_lines_assigns_monotonic_ids() {
        let spec = TableSpec::new(
            "ch_idgen_test",
            vec![
                ColumnDef::indexed("id", DataType::Id),
                ColumnDef::new("name", DataType::String),
            ],
        );
        catalog::register(&spec);
        let mut columns = vec!["name".to_string()];
        let lines = ClickHouseSession::render_lines(
            "ch_idgen_test",
            &mut columns,
            &[vec![Value::from("a")], vec![Value::from("b")]],
        );
        assert_eq!(columns, vec!["id", "name"]);
        let first: Json = serde_json::from_str(&lines[0]).unwrap();
        let second: Json = serde_json::from_str(&lines[1]).unwrap();
        assert!(first["id"].as_u64().unwrap() < second["id"].as_u64().unwrap());
        assert_eq!(first["name"], Json::from("a"));
        catalog::forget("ch_idgen_test");
    }

    #[test]
    fn render_lines_keeps_explicit_id() {
        let spec = TableSpec::new(
            "ch_idkeep_test",
            vec![
                ColumnDef::indexed("id", DataType::Id),
                ColumnDef::new("name", DataType::String),
            ],
        );
        catalog::register(&spec);
        let mut columns = vec!["id".to_string(), "name".to_string()];
        let lines = ClickHouseSession::render_lines(
            "ch_idkeep_test",
            &mut columns,
            &[vec![Value::I64(42), Value::from("a")]],
        );
        let doc: Json = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(doc["id"], Json::from(42));
        catalog::forget("ch_idkeep_test");
    }
}
