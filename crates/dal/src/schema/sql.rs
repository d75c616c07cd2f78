//! SQL DDL generation
//!
//! Two entry paths share one substitution table: structured [`TableSpec`]s
//! are rendered column by column, and raw migration DDL written with `{$…}`
//! placeholders is substituted textually. Both produce dialect SQL the
//! gateway executes verbatim.

use crate::dialect::{column_type, Dialect};
use dbmark_core::{DataType, Error, Result, TableSpec};

/// Substitute the `{$…}` placeholder vocabulary for a dialect.
///
/// Unknown placeholders are left untouched so the backend reports them with
/// the statement context intact.
pub fn substitute_placeholders(dialect: Dialect, ddl: &str) -> String {
    let pairs: &[(&str, &str)] = &[
        ("{$id}", column_type_or(dialect, DataType::Id)),
        ("{$int}", column_type_or(dialect, DataType::Int)),
        ("{$bigint}", column_type_or(dialect, DataType::BigInt)),
        ("{$uuid}", column_type_or(dialect, DataType::Uuid)),
        ("{$varchar}", column_type_or(dialect, DataType::String)),
        ("{$datetime6}", column_type_or(dialect, DataType::DateTime)),
        ("{$datetime_ns}", column_type_or(dialect, DataType::DateTimeNs)),
        ("{$boolean}", column_type_or(dialect, DataType::Boolean)),
        ("{$longblob}", column_type_or(dialect, DataType::Blob)),
        ("{$json}", column_type_or(dialect, DataType::Json)),
        ("{$engine}", engine_clause(dialect)),
    ];
    let mut out = ddl.to_string();
    for (placeholder, replacement) in pairs {
        out = out.replace(placeholder, replacement);
    }
    out
}

fn column_type_or(dialect: Dialect, dtype: DataType) -> &'static str {
    column_type(dialect, dtype).unwrap_or("")
}

fn engine_clause(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::ClickHouse => "ENGINE = MergeTree() ORDER BY id",
        _ => "",
    }
}

/// `CREATE TABLE` for a structured spec
pub fn create_table_sql(dialect: Dialect, spec: &TableSpec) -> Result<String> {
    if dialect.is_search() {
        return Err(Error::Migration(format!(
            "SQL DDL requested for search dialect {dialect}"
        )));
    }
    let columns: Vec<String> = spec
        .columns
        .iter()
        .map(|c| Ok(format!("{} {}", c.name, column_type(dialect, c.dtype)?)))
        .collect::<Result<_>>()?;
    let mut sql = format!("CREATE TABLE {} ({})", spec.name, columns.join(", "));
    let engine = engine_clause(dialect);
    if !engine.is_empty() {
        sql.push(' ');
        sql.push_str(engine);
    }
    Ok(sql)
}

/// Secondary-index statements for a spec's indexed columns.
///
/// Index names follow `<table>_idx_<first-col>_<seq>`; primary-key columns
/// get no secondary index.
pub fn create_index_sql(dialect: Dialect, spec: &TableSpec) -> Vec<String> {
    let mut out = Vec::new();
    let mut seq = 0;
    for col in spec.indexed_columns() {
        if col.dtype == DataType::Id {
            continue;
        }
        // ClickHouse orders by the MergeTree key instead of secondary
        // indexes; Cassandra secondary indexes are named the same way.
        let name = index_name(&spec.name, &col.name, seq);
        let stmt = match dialect {
            Dialect::ClickHouse => continue,
            Dialect::Cassandra => {
                format!("CREATE INDEX {name} ON {} ({})", spec.name, col.name)
            }
            _ => format!("CREATE INDEX {name} ON {} ({})", spec.name, col.name),
        };
        out.push(stmt);
        seq += 1;
    }
    out
}

/// `<table>_idx_<first-col>_<seq>`
pub fn index_name(table: &str, first_column: &str, seq: u32) -> String {
    format!("{table}_idx_{first_column}_{seq}")
}

/// `DROP TABLE`, or the dialect's `TRUNCATE` form when requested
pub fn drop_table_sql(dialect: Dialect, table: &str, use_truncate: bool) -> String {
    if use_truncate {
        return match dialect {
            Dialect::Postgres => format!("TRUNCATE TABLE {table} CASCADE"),
            Dialect::Sqlite => format!("DELETE FROM {table}"),
            _ => format!("TRUNCATE TABLE {table}"),
        };
    }
    format!("DROP TABLE IF EXISTS {table}")
}

/// Existence probe; returns (sql, expects table name as `$1` parameter)
pub fn table_exists_sql(dialect: Dialect) -> (&'static str, bool) {
    match dialect {
        Dialect::Postgres => (
            "SELECT 1 FROM information_schema.tables WHERE table_name = $1",
            true,
        ),
        Dialect::MySql => (
            "SELECT 1 FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = $1",
            true,
        ),
        Dialect::SqlServer => (
            "SELECT 1 FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = $1",
            true,
        ),
        Dialect::Sqlite => (
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = $1",
            true,
        ),
        Dialect::ClickHouse => ("EXISTS TABLE {table}", false),
        Dialect::Cassandra => (
            "SELECT table_name FROM system_schema.tables WHERE table_name = $1 ALLOW FILTERING",
            true,
        ),
        Dialect::Elasticsearch | Dialect::OpenSearch => ("", false),
    }
}

/// Sequence DDL; engines without native sequences emulate them with a
/// single-row counter table.
pub fn create_sequence_sql(dialect: Dialect, name: &str) -> Result<Vec<String>> {
    let stmts = match dialect {
        Dialect::Postgres => vec![format!("CREATE SEQUENCE IF NOT EXISTS {name}")],
        Dialect::SqlServer => vec![format!("CREATE SEQUENCE {name} START WITH 1 INCREMENT BY 1")],
        Dialect::MySql | Dialect::Sqlite => vec![
            format!("CREATE TABLE IF NOT EXISTS {name} (value BIGINT NOT NULL)"),
            format!("INSERT INTO {name} (value) VALUES (0)"),
        ],
        other => {
            return Err(Error::Capability(format!("sequences on {other}")));
        }
    };
    Ok(stmts)
}

/// Inverse of [`create_sequence_sql`]
pub fn drop_sequence_sql(dialect: Dialect, name: &str) -> Result<String> {
    match dialect {
        Dialect::Postgres | Dialect::SqlServer => Ok(format!("DROP SEQUENCE IF EXISTS {name}")),
        Dialect::MySql | Dialect::Sqlite => Ok(format!("DROP TABLE IF EXISTS {name}")),
        other => Err(Error::Capability(format!("sequences on {other}"))),
    }
}

/// Split a migration body into executable statements.
///
/// MySQL and Cassandra drivers take one statement per call, so their bodies
/// split on `;`; other dialects accept the body whole.
pub fn split_migration(dialect: Dialect, body: &str) -> Vec<String> {
    match dialect {
        Dialect::MySql | Dialect::Cassandra => body
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        }
    }
}
