//! Backend dialects and their surface differences
//!
//! A [`Dialect`] is selected by connection-string scheme and concentrates
//! every per-backend difference that can be expressed as data: parameter
//! placeholder style, LIMIT placement, identifier/literal quoting, DDL type
//! substitutions, transaction support, and EXPLAIN syntax. Anything that
//! needs live I/O lives with the backend connectors instead.

use chrono::SecondsFormat;
use dbmark_core::{DataType, Error, Result, Value};

/// Storage backend variant, keyed by URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL
    Postgres,
    /// MySQL / MariaDB
    MySql,
    /// Microsoft SQL Server
    SqlServer,
    /// SQLite
    Sqlite,
    /// ClickHouse (HTTP interface)
    ClickHouse,
    /// Cassandra / CQL
    Cassandra,
    /// Elasticsearch
    Elasticsearch,
    /// OpenSearch
    OpenSearch,
}

/// Parameter placeholder convention of a dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `$1, $2, …` (PostgreSQL)
    Dollar,
    /// `?` positional (MySQL, SQLite, Cassandra)
    Question,
    /// `@p1, @p2, …` (SQL Server)
    AtP,
}

/// Where the row-limit clause goes in a SELECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT n [OFFSET m]` after ORDER BY
    Trailing,
    /// `TOP n` directly after SELECT (SQL Server)
    Top,
}

impl Dialect {
    /// Resolve a connection-string scheme, including historical aliases.
    ///
    /// # Errors
    ///
    /// `Config` for schemes the registry does not recognize.
    pub fn from_scheme(scheme: &str) -> Result<Dialect> {
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "clickhouse" => Ok(Dialect::ClickHouse),
            "cql" | "cassandra" => Ok(Dialect::Cassandra),
            "es" | "elasticsearch" => Ok(Dialect::Elasticsearch),
            "opensearch" => Ok(Dialect::OpenSearch),
            other => Err(Error::Config(format!("unknown connection scheme '{other}'"))),
        }
    }

    /// Canonical scheme name (used as the pool key component)
    pub fn scheme(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::SqlServer => "sqlserver",
            Dialect::Sqlite => "sqlite",
            Dialect::ClickHouse => "clickhouse",
            Dialect::Cassandra => "cql",
            Dialect::Elasticsearch => "es",
            Dialect::OpenSearch => "opensearch",
        }
    }

    /// Whether this dialect talks a search-engine REST API instead of SQL
    pub fn is_search(&self) -> bool {
        matches!(self, Dialect::Elasticsearch | Dialect::OpenSearch)
    }

    /// Whether `BEGIN`/`COMMIT` pairs are honored.
    ///
    /// Cassandra, Elasticsearch, and OpenSearch run transact closures bare;
    /// ClickHouse models the pair as a client-side insert batch.
    pub fn supports_transactions(&self) -> bool {
        !matches!(
            self,
            Dialect::Cassandra | Dialect::Elasticsearch | Dialect::OpenSearch
        )
    }

    /// Placeholder convention for bound parameters
    pub fn placeholder(&self) -> Placeholder {
        match self {
            Dialect::Postgres => Placeholder::Dollar,
            Dialect::SqlServer => Placeholder::AtP,
            Dialect::MySql
            | Dialect::Sqlite
            | Dialect::ClickHouse
            | Dialect::Cassandra
            | Dialect::Elasticsearch
            | Dialect::OpenSearch => Placeholder::Question,
        }
    }

    /// Row-limit placement
    pub fn limit_style(&self) -> LimitStyle {
        match self {
            Dialect::SqlServer => LimitStyle::Top,
            _ => LimitStyle::Trailing,
        }
    }

    /// EXPLAIN prefix for read statements, where the backend has one
    pub fn explain_prefix(&self) -> Option<&'static str> {
        match self {
            Dialect::Postgres | Dialect::MySql => Some("EXPLAIN "),
            Dialect::Sqlite => Some("EXPLAIN QUERY PLAN "),
            _ => None,
        }
    }

    /// Quote an identifier (table or column name)
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql | Dialect::ClickHouse => format!("`{ident}`"),
            Dialect::SqlServer => format!("[{ident}]"),
            _ => format!("\"{ident}\""),
        }
    }

    /// Render a value as an inline SQL literal (interpolated insert mode).
    ///
    /// # Errors
    ///
    /// `Capability` for values the dialect cannot express inline (vectors
    /// on SQL backends).
    pub fn quote_literal(&self, value: &Value) -> Result<String> {
        let quoted = match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self {
                Dialect::MySql | Dialect::Sqlite | Dialect::SqlServer | Dialect::ClickHouse => {
                    if *b { "1" } else { "0" }.to_string()
                }
                _ => if *b { "TRUE" } else { "FALSE" }.to_string(),
            },
            Value::I64(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::F64(v) => v.to_string(),
            Value::String(s) => quote_text(s),
            Value::Uuid(u) => quote_text(&u.to_string()),
            Value::DateTime(t) => match self {
                // Most engines accept the RFC3339 form; MySQL and SQL Server
                // want a space separator and no zone suffix.
                Dialect::MySql | Dialect::SqlServer => {
                    quote_text(&t.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
                }
                _ => quote_text(&t.to_rfc3339_opts(SecondsFormat::Micros, true)),
            },
            Value::Json(j) => quote_text(&j.to_string()),
            Value::Bytes(b) => match self {
                Dialect::Postgres => format!("'\\x{}'", hex(b)),
                Dialect::MySql | Dialect::Sqlite => format!("X'{}'", hex(b)),
                Dialect::SqlServer | Dialect::ClickHouse | Dialect::Cassandra => {
                    format!("0x{}", hex(b))
                }
                _ => {
                    return Err(Error::Capability(format!(
                        "inline blob literals on {self:?}"
                    )))
                }
            },
            Value::Vector(_) => {
                return Err(Error::Capability(format!(
                    "vector literals on {self:?}; use a search backend"
                )))
            }
        };
        Ok(quoted)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scheme())
    }
}

fn quote_text(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// DDL column type for a data type on a dialect.
///
/// The same projection backs the `{$…}` placeholder substitution table in
/// the schema layer, so raw-DDL migrations and structured specs agree.
pub fn column_type(dialect: Dialect, dtype: DataType) -> Result<&'static str> {
    use DataType::*;
    let ty = match (dialect, dtype) {
        (Dialect::Postgres, Id) => "BIGSERIAL PRIMARY KEY",
        (Dialect::MySql, Id) => "BIGINT AUTO_INCREMENT PRIMARY KEY",
        (Dialect::SqlServer, Id) => "BIGINT IDENTITY(1,1) PRIMARY KEY",
        (Dialect::Sqlite, Id) => "INTEGER PRIMARY KEY AUTOINCREMENT",
        (Dialect::ClickHouse, Id) => "Int64",
        (Dialect::Cassandra, Id) => "bigint PRIMARY KEY",

        (Dialect::ClickHouse, Int) => "Int32",
        (_, Int) => "INT",
        (Dialect::ClickHouse, BigInt) => "Int64",
        (_, BigInt) => "BIGINT",

        (Dialect::Postgres, Uuid) => "UUID",
        (Dialect::MySql, Uuid) => "VARCHAR(36)",
        (Dialect::SqlServer, Uuid) => "UNIQUEIDENTIFIER",
        (Dialect::Sqlite, Uuid) => "TEXT",
        (Dialect::ClickHouse, Uuid) => "UUID",
        (Dialect::Cassandra, Uuid) => "uuid",

        (Dialect::Postgres, String) => "VARCHAR(256)",
        (Dialect::MySql, String) => "VARCHAR(256)",
        (Dialect::SqlServer, String) => "NVARCHAR(256)",
        (Dialect::Sqlite, String) => "TEXT",
        (Dialect::ClickHouse, String) => "String",
        (Dialect::Cassandra, String) => "text",

        (Dialect::Postgres, DateTime) => "TIMESTAMP(6)",
        (Dialect::MySql, DateTime) => "DATETIME(6)",
        (Dialect::SqlServer, DateTime) => "DATETIME2(6)",
        (Dialect::Sqlite, DateTime) => "TEXT",
        (Dialect::ClickHouse, DateTime) => "DateTime64(6)",
        (Dialect::Cassandra, DateTime) => "timestamp",

        (Dialect::Postgres, DateTimeNs) => "TIMESTAMP(6)",
        (Dialect::MySql, DateTimeNs) => "DATETIME(6)",
        (Dialect::SqlServer, DateTimeNs) => "DATETIME2(7)",
        (Dialect::Sqlite, DateTimeNs) => "TEXT",
        (Dialect::ClickHouse, DateTimeNs) => "DateTime64(9)",
        (Dialect::Cassandra, DateTimeNs) => "timestamp",

        (Dialect::Postgres, Boolean) => "BOOLEAN",
        (Dialect::MySql, Boolean) => "TINYINT(1)",
        (Dialect::SqlServer, Boolean) => "BIT",
        (Dialect::Sqlite, Boolean) => "INTEGER",
        (Dialect::ClickHouse, Boolean) => "UInt8",
        (Dialect::Cassandra, Boolean) => "boolean",

        (Dialect::Postgres, Blob) => "BYTEA",
        (Dialect::MySql, Blob) => "LONGBLOB",
        (Dialect::SqlServer, Blob) => "VARBINARY(MAX)",
        (Dialect::Sqlite, Blob) => "BLOB",
        (Dialect::ClickHouse, Blob) => "String",
        (Dialect::Cassandra, Blob) => "blob",

        (Dialect::Postgres, Json) => "JSONB",
        (Dialect::MySql, Json) => "JSON",
        (Dialect::SqlServer, Json) => "NVARCHAR(MAX)",
        (Dialect::Sqlite, Json) => "TEXT",
        (Dialect::ClickHouse, Json) => "String",
        (Dialect::Cassandra, Json) => "text",

        (d, Vector(_)) if !d.is_search() => {
            return Err(Error::Capability(format!(
                "vector columns on {d}; use a search backend"
            )))
        }
        // Search dialects never reach SQL DDL; their mapping projection
        // lives in the schema layer.
        (d, t) => {
            return Err(Error::Capability(format!(
                "no SQL column type for {t:?} on {d}"
            )))
        }
    };
    Ok(ty)
}
