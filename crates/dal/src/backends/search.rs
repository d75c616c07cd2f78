//! Elasticsearch / OpenSearch backend over REST
//!
//! One HTTP client serves both engines; the dialect picks the lifecycle
//! dialect (ILM vs ISM), the vector mapping type, and the kNN request
//! shape. TLS verification follows the configured CA bundle; absent one,
//! invalid certificates are accepted (operators benchmark against
//! self-signed clusters constantly).
//!
//! Creating a "table" provisions the policy + component templates + index
//! template chain described in the schema layer; the policy probe is the
//! idempotency check.

use crate::catalog;
use crate::config::ConnConfig;
use crate::dialect::Dialect;
use crate::query::search::{build_search, build_update_by_query, SearchRequest};
use crate::schema::search as search_schema;
use crate::session::{Database, DbStats, InsertMode, Session, StatsCounter};
use async_trait::async_trait;
use dbmark_core::{Error, Result, Rows, SelectCtrl, TableSpec, Value};
use serde_json::Value as Json;
use std::sync::Arc;
use tracing::debug;

struct SearchHttp {
    http: reqwest::Client,
    base: String,
    user: Option<String>,
    password: Option<String>,
    dialect: Dialect,
    stats: Arc<StatsCounter>,
}

impl SearchHttp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.user {
            Some(user) => req.basic_auth(user, self.password.as_deref()),
            None => req,
        }
    }

    async fn get_status(&self, path: &str) -> Result<reqwest::StatusCode> {
        let resp = self
            .auth(self.http.get(self.url(path)))
            .send()
            .await
            .map_err(|e| Error::TransientQuery(e.to_string()))?;
        Ok(resp.status())
    }

    async fn put_json(&self, path: &str, body: &Json) -> Result<()> {
        self.stats.query_executed();
        let resp = self
            .auth(self.http.put(self.url(path)).json(body))
            .send()
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Migration(format!("PUT {path} -> {status}: {text}")));
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.stats.query_executed();
        let resp = self
            .auth(self.http.delete(self.url(path)))
            .send()
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        // 404 means a prior drop got there first; reverse-order teardown
        // tolerates that.
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            let status = resp.status();
            return Err(Error::Migration(format!("DELETE {path} -> {status}")));
        }
        Ok(())
    }

    async fn post_json(&self, path: &str, body: &Json) -> Result<(reqwest::StatusCode, Json)> {
        self.stats.query_executed();
        let resp = self
            .auth(self.http.post(self.url(path)).json(body))
            .send()
            .await
            .map_err(|e| Error::TransientQuery(e.to_string()))?;
        let status = resp.status();
        let parsed = resp.json().await.unwrap_or(Json::Null);
        Ok((status, parsed))
    }

    async fn post_ndjson(&self, path: &str, body: String) -> Result<Json> {
        self.stats.query_executed();
        let resp = self
            .auth(
                self.http
                    .post(self.url(path))
                    .header("content-type", "application/x-ndjson")
                    .body(body),
            )
            .send()
            .await
            .map_err(|e| Error::TransientQuery(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::TransientQuery(format!("bulk -> {status}: {text}")));
        }
        resp.json()
            .await
            .map_err(|e| Error::TransientQuery(e.to_string()))
    }
}

/// Elasticsearch / OpenSearch gateway
pub struct SearchDatabase {
    inner: Arc<SearchHttp>,
}

/// Open a search gateway. The base host honors `ELASTICSEARCH_URL` when
/// set; credentials come from the connection string's userinfo.
pub fn connect(config: &ConnConfig, dialect: Dialect) -> Result<SearchDatabase> {
    let base = config.search_base_url()?;
    let url = config.parsed()?;
    let mut builder = reqwest::Client::builder();
    match &config.tls_ca {
        Some(pem) => {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| Error::Config(format!("TLS CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        None => {
            builder = builder.danger_accept_invalid_certs(true);
        }
    }
    let http = builder
        .build()
        .map_err(|e| Error::Config(format!("http client: {e}")))?;
    let stats = StatsCounter::new();
    stats.connection_opened();
    Ok(SearchDatabase {
        inner: Arc::new(SearchHttp {
            http,
            base,
            user: (!url.username().is_empty()).then(|| url.username().to_string()),
            password: url.password().map(str::to_string),
            dialect,
            stats,
        }),
    })
}

#[async_trait]
impl Database for SearchDatabase {
    fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    async fn ping(&self) -> Result<()> {
        let status = self.inner.get_status("/").await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::TransientQuery(format!("cluster ping -> {status}")))
        }
    }

    fn stats(&self) -> DbStats {
        self.inner.stats.snapshot()
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let path = search_schema::policy_path(self.inner.dialect, table);
        Ok(self.inner.get_status(&path).await?.is_success())
    }

    async fn create_table(&self, spec: &TableSpec) -> Result<()> {
        catalog::register(spec);
        if self.table_exists(&spec.name).await? {
            return Ok(());
        }
        let dialect = self.inner.dialect;
        self.inner
            .put_json(
                &search_schema::policy_path(dialect, &spec.name),
                &search_schema::policy_body(dialect),
            )
            .await?;
        self.inner
            .put_json(
                &search_schema::component_template_path(&search_schema::settings_component_name(
                    &spec.name,
                )),
                &search_schema::settings_component_body(dialect, &spec.name),
            )
            .await?;
        self.inner
            .put_json(
                &search_schema::component_template_path(&search_schema::mapping_component_name(
                    &spec.name,
                )),
                &search_schema::mapping_component_body(dialect, spec)?,
            )
            .await?;
        self.inner
            .put_json(
                &search_schema::index_template_path(&spec.name),
                &search_schema::index_template_body(&spec.name),
            )
            .await?;
        Ok(())
    }

    async fn drop_table(&self, table: &str, use_truncate: bool) -> Result<()> {
        if use_truncate {
            // Drop the data stream only; the template chain stays for reuse.
            self.inner.delete(&format!("/_data_stream/{table}")).await?;
            return Ok(());
        }
        for path in search_schema::drop_paths(self.inner.dialect, table) {
            self.inner.delete(&path).await?;
        }
        catalog::forget(table);
        Ok(())
    }

    async fn apply_migration(&self, _name: &str, _ddl: &str) -> Result<()> {
        Err(Error::Capability(format!(
            "raw DDL migrations on {}",
            self.inner.dialect
        )))
    }

    async fn create_index(&self, table: &str, _columns: &[&str]) -> Result<()> {
        // Every mapped field is indexed by the engine already.
        debug!(table, "create_index is implicit on search backends");
        Ok(())
    }

    async fn drop_index(&self, table: &str, _index: &str) -> Result<()> {
        debug!(table, "drop_index is implicit on search backends");
        Ok(())
    }

    async fn create_sequence(&self, _name: &str) -> Result<()> {
        Err(Error::Capability(format!(
            "sequences on {}",
            self.inner.dialect
        )))
    }

    async fn drop_sequence(&self, _name: &str) -> Result<()> {
        Err(Error::Capability(format!(
            "sequences on {}",
            self.inner.dialect
        )))
    }

    fn session(&self) -> Box<dyn Session> {
        Box::new(SearchSession {
            inner: self.inner.clone(),
        })
    }
}

/// Search session. Transactions are a no-op here: consumers must tolerate
/// partial effects when a closure fails midway.
pub struct SearchSession {
    inner: Arc<SearchHttp>,
}

fn rows_from_hits(fields: &[String], parsed: &Json) -> Rows {
    let hits = parsed["hits"]["hits"].as_array();
    if fields.is_empty() {
        let mut out = Rows::with_columns(["_source"]);
        if let Some(hits) = hits {
            for hit in hits {
                out.rows.push(vec![Value::Json(hit["_source"].clone())]);
            }
        }
        return out;
    }
    let mut out = Rows::with_columns(fields.iter().cloned());
    if let Some(hits) = hits {
        for hit in hits {
            let values = fields
                .iter()
                .map(|f| {
                    // Requested fields come back as single-element arrays.
                    let v = &hit["fields"][f][0];
                    match v {
                        Json::Null => Value::Null,
                        Json::Number(n) => n
                            .as_i64()
                            .map(Value::I64)
                            .unwrap_or_else(|| Value::F64(n.as_f64().unwrap_or(0.0))),
                        Json::String(s) => Value::String(s.clone()),
                        Json::Bool(b) => Value::Bool(*b),
                        other => Value::Json(other.clone()),
                    }
                })
                .collect();
            out.rows.push(values);
        }
    }
    out
}

#[async_trait]
impl Session for SearchSession {
    fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    async fn exec(&self, _sql: &str, _params: &[Value]) -> Result<u64> {
        Err(Error::Capability(format!(
            "raw SQL on {}",
            self.inner.dialect
        )))
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<Rows> {
        Err(Error::Capability(format!(
            "raw SQL on {}",
            self.inner.dialect
        )))
    }

    async fn select(&self, table: &str, ctrl: &SelectCtrl) -> Result<Rows> {
        match build_search(self.inner.dialect, table, ctrl)? {
            SearchRequest::Empty => Ok(Rows::empty()),
            SearchRequest::Count { body } => {
                let (status, parsed) = self
                    .inner
                    .post_json(&format!("/{table}/_count"), &body)
                    .await?;
                if status.as_u16() == 404 {
                    // Missing index and optimized-away predicate share the
                    // empty sentinel.
                    return Ok(Rows::empty());
                }
                if !status.is_success() {
                    return Err(Error::TransientQuery(format!("_count -> {status}")));
                }
                let count = parsed["count"].as_i64().unwrap_or(0);
                let mut out = Rows::with_columns(["COUNT(0)"]);
                out.rows.push(vec![Value::I64(count)]);
                Ok(out)
            }
            SearchRequest::Search { body } => {
                let (status, parsed) = self
                    .inner
                    .post_json(&format!("/{table}/_search"), &body)
                    .await?;
                if status.as_u16() == 404 {
                    return Ok(Rows::empty());
                }
                if !status.is_success() {
                    return Err(Error::TransientQuery(format!("_search -> {status}")));
                }
                Ok(rows_from_hits(&ctrl.fields, &parsed))
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
        let mut body = String::new();
        let action = serde_json::json!({ "create": { "_index": table } }).to_string();
        for row in rows {
            let mut doc = serde_json::Map::with_capacity(columns.len());
            for (col, value) in columns.iter().zip(row) {
                doc.insert(col.clone(), value.to_json());
            }
            body.push_str(&action);
            body.push('\n');
            body.push_str(&Json::Object(doc).to_string());
            body.push('\n');
        }
        let parsed = self.inner.post_ndjson("/_bulk", body).await?;
        if parsed["errors"].as_bool().unwrap_or(false) {
            return Err(Error::TransientQuery(format!(
                "bulk insert into {table} reported item errors"
            )));
        }
        Ok(rows.len() as u64)
    }

    async fn update(&self, table: &str, set: &[(String, Value)], ctrl: &SelectCtrl) -> Result<u64> {
        match build_update_by_query(table, set, ctrl)? {
            None => Ok(0),
            Some(body) => {
                let (status, parsed) = self
                    .inner
                    .post_json(&format!("/{table}/_update_by_query"), &body)
                    .await?;
                if status.as_u16() == 404 {
                    return Ok(0);
                }
                if !status.is_success() {
                    return Err(Error::TransientQuery(format!(
                        "_update_by_query -> {status}"
                    )));
                }
                Ok(parsed["updated"].as_u64().unwrap_or(0))
            }
        }
    }

    async fn begin(&self) -> Result<()> {
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_parse_into_requested_fields() {
        let parsed: Json = serde_json::from_str(
            r#"{"hits":{"hits":[
                {"fields":{"id":[7],"name":["x"]}},
                {"fields":{"id":[8],"name":["y"]}}
            ]}}"#,
        )
        .unwrap();
        let rows = rows_from_hits(&["id".to_string(), "name".to_string()], &parsed);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows[0], vec![Value::I64(7), Value::String("x".into())]);
    }

    #[test]
    fn empty_projection_returns_source_column() {
        let parsed: Json =
            serde_json::from_str(r#"{"hits":{"hits":[{"_source":{"a":1}}]}}"#).unwrap();
        let rows = rows_from_hits(&[], &parsed);
        assert_eq!(rows.columns, vec!["_source"]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn missing_field_values_are_null() {
        let parsed: Json =
            serde_json::from_str(r#"{"hits":{"hits":[{"fields":{"id":[7]}}]}}"#).unwrap();
        let rows = rows_from_hits(&["id".to_string(), "ghost".to_string()], &parsed);
        assert_eq!(rows.rows[0], vec![Value::I64(7), Value::Null]);
    }
}
