//! Dialect-agnostic table specifications
//!
//! A [`TableSpec`] describes a table once; the schema layer materializes it
//! per backend: a `CREATE TABLE` statement for SQL dialects, or an index
//! template plus lifecycle policy for search engines. Subtables model nested
//! documents on search backends; SQL dialects flatten them into prefixed
//! columns.

use serde::{Deserialize, Serialize};

/// Column data types the DDL layer knows how to project per dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Auto-incrementing primary key
    Id,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    BigInt,
    /// UUID (native where supported, CHAR(36) otherwise)
    Uuid,
    /// Bounded text
    String,
    /// Microsecond-precision timestamp
    DateTime,
    /// Nanosecond-precision timestamp
    DateTimeNs,
    /// Boolean
    Boolean,
    /// Binary payload
    Blob,
    /// JSON document (native where supported, text otherwise)
    Json,
    /// Dense float32 vector with a fixed dimension
    Vector(u32),
}

/// One column of a table specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Projected type
    pub dtype: DataType,
    /// Whether a secondary index (SQL) / indexed field (search) is wanted
    pub indexed: bool,
}

impl ColumnDef {
    /// Unindexed column
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        ColumnDef {
            name: name.into(),
            dtype,
            indexed: false,
        }
    }

    /// Indexed column
    pub fn indexed(name: impl Into<String>, dtype: DataType) -> Self {
        ColumnDef {
            name: name.into(),
            dtype,
            indexed: true,
        }
    }
}

/// Shard/replica counts applied to search-backend indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resilience {
    /// Primary shard count
    pub shards: u32,
    /// Replica count per shard
    pub replicas: u32,
}

impl Default for Resilience {
    fn default() -> Self {
        Resilience {
            shards: 1,
            replicas: 0,
        }
    }
}

/// Dialect-agnostic description of one benchmark table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table / index name
    pub name: String,
    /// Ordered column definitions
    pub columns: Vec<ColumnDef>,
    /// Nested document tables (search backends only)
    #[serde(default)]
    pub subtables: Vec<TableSpec>,
    /// Shards/replicas for search backends; ignored by SQL dialects
    #[serde(default)]
    pub resilience: Resilience,
}

impl TableSpec {
    /// Spec with defaults (no subtables, 1 shard / 0 replicas)
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        TableSpec {
            name: name.into(),
            columns,
            subtables: Vec::new(),
            resilience: Resilience::default(),
        }
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns flagged for indexing, in definition order
    pub fn indexed_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.indexed)
    }

    /// The vector column's dimension, if the table has one.
    ///
    /// At most one vector column per table is supported; the first wins.
    pub fn vector_dimension(&self) -> Option<u32> {
        self.columns.iter().find_map(|c| match c.dtype {
            DataType::Vector(dim) => Some(dim),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableSpec {
        TableSpec::new(
            "perf_table",
            vec![
                ColumnDef::indexed("id", DataType::Id),
                ColumnDef::indexed("uuid", DataType::Uuid),
                ColumnDef::new("payload", DataType::Blob),
                ColumnDef::indexed("embedding", DataType::Vector(384)),
            ],
        )
    }

    #[test]
    fn column_lookup() {
        let t = sample();
        assert_eq!(t.column("uuid").unwrap().dtype, DataType::Uuid);
        assert!(t.column("missing").is_none());
    }

    #[test]
    fn indexed_columns_preserve_order() {
        let t = sample();
        let names: Vec<_> = t.indexed_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "uuid", "embedding"]);
    }

    #[test]
    fn vector_dimension_found() {
        assert_eq!(sample().vector_dimension(), Some(384));
        let flat = TableSpec::new("t", vec![ColumnDef::new("id", DataType::Id)]);
        assert_eq!(flat.vector_dimension(), None);
    }

    #[test]
    fn default_resilience() {
        let r = Resilience::default();
        assert_eq!((r.shards, r.replicas), (1, 0));
    }
}
