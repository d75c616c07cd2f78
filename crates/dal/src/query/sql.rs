//! SQL emission for lowered queries
//!
//! Renders [`Lowered`] condition trees and order terms into dialect SQL with
//! canonical `$N` placeholders (the session rewrites those per dialect just
//! before execution). Returns `None` when the optimizer proved the predicate
//! empty, so callers skip the backend entirely.

use crate::dialect::{Dialect, LimitStyle};
use crate::query::conditions::{self, CmpOp, Cond, LikeKind, Lowered};
use crate::query::terms::OrderTerm;
use crate::catalog;
use dbmark_core::{Error, Result, SelectCtrl, Value};

/// A rendered statement and its bound parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    /// Statement text with `$N` placeholders
    pub sql: String,
    /// Parameters in placeholder order
    pub params: Vec<Value>,
}

/// Build a SELECT for a registered table.
///
/// Returns `Ok(None)` when the predicate has a provably empty intersection.
pub fn build_select(
    dialect: Dialect,
    table: &str,
    ctrl: &SelectCtrl,
) -> Result<Option<SqlQuery>> {
    let fields = catalog::fields(table)?;
    conditions::check_fields(&fields, ctrl)?;
    let lowered = match conditions::lower_where(&fields, ctrl)? {
        Lowered::Empty => return Ok(None),
        Lowered::Conds(conds) => conds,
    };
    let order = conditions::lower_order(&fields, ctrl)?;
    if order.iter().any(|o| matches!(o, OrderTerm::Nearest { .. })) {
        return Err(Error::Capability(format!(
            "vector ordering on {dialect}; use a search backend"
        )));
    }

    let mut params = Vec::new();
    let projection = if ctrl.fields.is_empty() {
        "*".to_string()
    } else {
        ctrl.fields.join(", ")
    };

    let mut sql = String::from("SELECT ");
    if dialect.limit_style() == LimitStyle::Top && ctrl.page.limit > 0 {
        sql.push_str(&format!("TOP {} ", ctrl.page.limit));
    }
    sql.push_str(&projection);
    sql.push_str(" FROM ");
    sql.push_str(table);

    append_where(dialect, &mut sql, &lowered, &mut params)?;

    if !order.is_empty() {
        sql.push_str(" ORDER BY ");
        let rendered: Vec<String> = order
            .iter()
            .map(|o| match o {
                OrderTerm::Asc(f) => format!("{f} ASC"),
                OrderTerm::Desc(f) => format!("{f} DESC"),
                OrderTerm::Nearest { .. } => unreachable!("rejected above"),
            })
            .collect();
        sql.push_str(&rendered.join(", "));
    }

    if dialect.limit_style() == LimitStyle::Trailing && ctrl.page.limit > 0 {
        sql.push_str(&format!(" LIMIT {}", ctrl.page.limit));
        if ctrl.page.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", ctrl.page.offset));
        }
    }

    Ok(Some(SqlQuery { sql, params }))
}

/// Build an UPDATE whose WHERE comes from the same lowering as SELECT.
///
/// Returns `Ok(None)` on an empty intersection; there is nothing to touch.
pub fn build_update(
    dialect: Dialect,
    table: &str,
    set: &[(String, Value)],
    ctrl: &SelectCtrl,
) -> Result<Option<SqlQuery>> {
    if set.is_empty() {
        return Err(Error::Predicate("UPDATE with an empty SET list".into()));
    }
    let fields = catalog::fields(table)?;
    let lowered = match conditions::lower_where(&fields, ctrl)? {
        Lowered::Empty => return Ok(None),
        Lowered::Conds(conds) => conds,
    };
    let mut params = Vec::new();
    let assignments: Vec<String> = set
        .iter()
        .map(|(col, value)| {
            params.push(value.clone());
            format!("{col} = ${}", params.len())
        })
        .collect();
    let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
    append_where(dialect, &mut sql, &lowered, &mut params)?;
    Ok(Some(SqlQuery { sql, params }))
}

/// Build a parameterized multi-row INSERT.
///
/// One statement, one placeholder per value. Cassandra cannot take multiple
/// value tuples in one INSERT, so more than one row is wrapped in
/// `BEGIN BATCH … APPLY BATCH`.
pub fn build_insert(
    dialect: Dialect,
    table: &str,
    columns: &[String],
    row_count: usize,
) -> Result<String> {
    if columns.is_empty() || row_count == 0 {
        return Err(Error::Predicate("INSERT needs columns and rows".into()));
    }
    let column_list = columns.join(", ");
    if dialect == Dialect::Cassandra && row_count > 1 {
        let mut sql = String::from("BEGIN BATCH\n");
        let mut n = 0;
        for _ in 0..row_count {
            let tuple: Vec<String> = columns
                .iter()
                .map(|_| {
                    n += 1;
                    format!("${n}")
                })
                .collect();
            sql.push_str(&format!(
                "INSERT INTO {table} ({column_list}) VALUES ({});\n",
                tuple.join(", ")
            ));
        }
        sql.push_str("APPLY BATCH;");
        return Ok(sql);
    }
    let mut n = 0;
    let tuples: Vec<String> = (0..row_count)
        .map(|_| {
            let tuple: Vec<String> = columns
                .iter()
                .map(|_| {
                    n += 1;
                    format!("${n}")
                })
                .collect();
            format!("({})", tuple.join(", "))
        })
        .collect();
    Ok(format!(
        "INSERT INTO {table} ({column_list}) VALUES {}",
        tuples.join(", ")
    ))
}

/// Build an interpolated multi-row INSERT: values are rendered inline with
/// dialect-aware quoting. Used where the driver cannot prepare a statement
/// with the required argument count.
pub fn build_insert_interpolated(
    dialect: Dialect,
    table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> Result<String> {
    if columns.is_empty() || rows.is_empty() {
        return Err(Error::Predicate("INSERT needs columns and rows".into()));
    }
    let column_list = columns.join(", ");
    let render_tuple = |row: &Vec<Value>| -> Result<String> {
        let rendered: Vec<String> = row
            .iter()
            .map(|v| dialect.quote_literal(v))
            .collect::<Result<_>>()?;
        Ok(format!("({})", rendered.join(", ")))
    };
    if dialect == Dialect::Cassandra && rows.len() > 1 {
        let mut sql = String::from("BEGIN BATCH\n");
        for row in rows {
            sql.push_str(&format!(
                "INSERT INTO {table} ({column_list}) VALUES {};\n",
                render_tuple(row)?
            ));
        }
        sql.push_str("APPLY BATCH;");
        return Ok(sql);
    }
    let tuples: Vec<String> = rows.iter().map(render_tuple).collect::<Result<_>>()?;
    Ok(format!(
        "INSERT INTO {table} ({column_list}) VALUES {}",
        tuples.join(", ")
    ))
}

fn append_where(
    dialect: Dialect,
    sql: &mut String,
    conds: &[Cond],
    params: &mut Vec<Value>,
) -> Result<()> {
    if conds.is_empty() {
        return Ok(());
    }
    let rendered: Vec<String> = conds
        .iter()
        .map(|c| render_cond(dialect, c, params))
        .collect::<Result<_>>()?;
    sql.push_str(" WHERE ");
    sql.push_str(&rendered.join(" AND "));
    Ok(())
}

fn render_cond(_dialect: Dialect, cond: &Cond, params: &mut Vec<Value>) -> Result<String> {
    let rendered = match cond {
        Cond::Cmp { field, op, value } => {
            params.push(value.clone());
            format!("{field} {} ${}", cmp_sql(*op), params.len())
        }
        Cond::In { field, values } => {
            let slots: Vec<String> = values
                .iter()
                .map(|v| {
                    params.push(v.clone());
                    format!("${}", params.len())
                })
                .collect();
            format!("{field} IN ({})", slots.join(", "))
        }
        Cond::Like { field, kind, needle } => {
            let pattern = match kind {
                LikeKind::Contains => format!("%{needle}%"),
                LikeKind::Prefix => format!("{needle}%"),
                LikeKind::Suffix => format!("%{needle}"),
            };
            params.push(Value::String(pattern));
            format!("{field} LIKE ${}", params.len())
        }
        Cond::IsNull { field } => format!("{field} IS NULL"),
        Cond::NotNull { field } => format!("{field} IS NOT NULL"),
    };
    Ok(rendered)
}

fn cmp_sql(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "=",
        CmpOp::Ne => "<>",
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
    }
}

/// EXPLAIN-prefixed variant of a read statement.
///
/// # Errors
///
/// `Capability` on backends with no EXPLAIN surface here (ClickHouse and
/// the search engines).
pub fn explain(dialect: Dialect, sql: &str) -> Result<String> {
    match dialect.explain_prefix() {
        Some(prefix) => Ok(format!("{prefix}{sql}")),
        None => Err(Error::Capability(format!("EXPLAIN on {dialect}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmark_core::{ColumnDef, DataType, TableSpec};

    fn register() {
        let spec = TableSpec::new(
            "sql_emit_test",
            vec![
                ColumnDef::indexed("id", DataType::Id),
                ColumnDef::new("name", DataType::String),
                ColumnDef::indexed("start_time", DataType::DateTime),
            ],
        );
        catalog::register(&spec);
    }

    #[test]
    fn select_shape_with_where_order_limit() {
        register();
        let ctrl = SelectCtrl::new()
            .with_fields(["id", "name"])
            .filter("id", vec!["gt(100)"])
            .with_order(["desc(id)"])
            .with_limit(10);
        let q = build_select(Dialect::Postgres, "sql_emit_test", &ctrl)
            .unwrap()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT id, name FROM sql_emit_test WHERE id > $1 ORDER BY id DESC LIMIT 10"
        );
        assert_eq!(q.params, vec![Value::I64(100)]);
    }

    #[test]
    fn sqlserver_uses_top() {
        register();
        let ctrl = SelectCtrl::new().with_fields(["id"]).with_limit(5);
        let q = build_select(Dialect::SqlServer, "sql_emit_test", &ctrl)
            .unwrap()
            .unwrap();
        assert_eq!(q.sql, "SELECT TOP 5 id FROM sql_emit_test");
    }

    #[test]
    fn empty_intersection_returns_none() {
        register();
        let mut ctrl = SelectCtrl::new().filter("id", vec!["gt(129)", "le(121)"]);
        ctrl.optimize_conditions = true;
        assert!(build_select(Dialect::Postgres, "sql_emit_test", &ctrl)
            .unwrap()
            .is_none());
    }

    #[test]
    fn equality_fold_has_no_range_clause() {
        register();
        let mut ctrl = SelectCtrl::new().filter("id", vec!["gt(123)", "le(129)", "124", "126"]);
        ctrl.optimize_conditions = true;
        let q = build_select(Dialect::Postgres, "sql_emit_test", &ctrl)
            .unwrap()
            .unwrap();
        assert_eq!(q.sql, "SELECT * FROM sql_emit_test WHERE id IN ($1, $2)");
        assert_eq!(q.params, vec![Value::I64(124), Value::I64(126)]);
    }

    #[test]
    fn like_patterns() {
        register();
        let ctrl = SelectCtrl::new().filter("name", vec!["hlike(user)"]);
        let q = build_select(Dialect::MySql, "sql_emit_test", &ctrl)
            .unwrap()
            .unwrap();
        assert!(q.sql.ends_with("WHERE name LIKE $1"));
        assert_eq!(q.params, vec![Value::String("user%".into())]);
    }

    #[test]
    fn update_assignments_then_where() {
        register();
        let ctrl = SelectCtrl::new().filter("id", vec!["42"]);
        let q = build_update(
            Dialect::Postgres,
            "sql_emit_test",
            &[("name".to_string(), Value::from("renamed"))],
            &ctrl,
        )
        .unwrap()
        .unwrap();
        assert_eq!(q.sql, "UPDATE sql_emit_test SET name = $1 WHERE id = $2");
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn parameterized_insert_counts_placeholders() {
        let sql = build_insert(
            Dialect::Postgres,
            "t",
            &["a".to_string(), "b".to_string()],
            3,
        )
        .unwrap();
        assert_eq!(sql, "INSERT INTO t (a, b) VALUES ($1, $2), ($3, $4), ($5, $6)");
    }

    #[test]
    fn cassandra_multi_row_uses_batch() {
        let sql = build_insert(
            Dialect::Cassandra,
            "t",
            &["a".to_string(), "b".to_string()],
            2,
        )
        .unwrap();
        assert!(sql.starts_with("BEGIN BATCH\n"));
        assert!(sql.ends_with("APPLY BATCH;"));
        assert_eq!(sql.matches("INSERT INTO t").count(), 2);
        // Single row stays a plain INSERT.
        let single = build_insert(Dialect::Cassandra, "t", &["a".to_string()], 1).unwrap();
        assert!(!single.contains("BATCH"));
    }

    #[test]
    fn interpolated_insert_quotes_values() {
        let sql = build_insert_interpolated(
            Dialect::Postgres,
            "t",
            &["a".to_string(), "b".to_string()],
            &[vec![Value::I64(1), Value::from("x'y")]],
        )
        .unwrap();
        assert_eq!(sql, "INSERT INTO t (a, b) VALUES (1, 'x''y')");
    }

    #[test]
    fn explain_prefixes_where_supported() {
        assert_eq!(
            explain(Dialect::Postgres, "SELECT 1").unwrap(),
            "EXPLAIN SELECT 1"
        );
        assert!(matches!(
            explain(Dialect::ClickHouse, "SELECT 1"),
            Err(Error::Capability(_))
        ));
    }

    #[test]
    fn select_rejects_vector_order() {
        let spec = TableSpec::new(
            "sql_vec_test",
            vec![
                ColumnDef::indexed("id", DataType::Id),
                ColumnDef::indexed("embedding", DataType::Vector(3)),
            ],
        );
        catalog::register(&spec);
        let ctrl = SelectCtrl::new().with_order(["nearest(embedding;L2;[0.1,0.2,0.3])"]);
        assert!(matches!(
            build_select(Dialect::Postgres, "sql_vec_test", &ctrl),
            Err(Error::Capability(_))
        ));
    }
}
