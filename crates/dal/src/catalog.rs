//! Table catalog: field kinds the query builder lowers against
//!
//! Predicate lowering is typed: `gt(123)` on an integer column parses the
//! argument as an integer, on a time column as a timestamp. The catalog maps
//! table names to their per-field condition kinds, derived from the
//! [`TableSpec`] when a table is created (or registered explicitly by a
//! scenario). Enum-string fields are registered with their string→int
//! mapping by the scenario that owns them.
//!
//! The catalog is process-wide, lazily populated, and never evicted.

use dashmap::DashMap;
use dbmark_core::{DataType, Error, Result, TableSpec};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Condition kind of one queryable field
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Integral column; predicates parse as `i64`
    Integer,
    /// UUID column; equality and null checks only
    Uuid,
    /// Bounded text; `like`-family predicates allowed
    Str {
        /// Maximum accepted predicate-value length
        max_len: usize,
    },
    /// Timestamp; predicates accept the full time-literal grammar
    Time,
    /// Boolean
    Bool,
    /// Enum-string mapped through a scenario-supplied table
    Enum(Arc<HashMap<String, i64>>),
    /// Dense vector; orderable by `nearest(…)` only
    Vector {
        /// Mapping dimension, checked against query vectors
        dim: usize,
    },
}

/// Per-table field map
#[derive(Debug, Clone, Default)]
pub struct TableFields {
    fields: HashMap<String, FieldKind>,
    autoinc: Option<String>,
}

impl TableFields {
    /// Kind of a field.
    ///
    /// # Errors
    ///
    /// `UnknownField` when the table does not define it.
    pub fn kind(&self, field: &str) -> Result<&FieldKind> {
        self.fields
            .get(field)
            .ok_or_else(|| Error::UnknownField(field.to_string()))
    }

    /// Whether the field exists
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// The vector field's dimension, if the table has one
    pub fn vector_dim(&self, field: &str) -> Option<usize> {
        match self.fields.get(field) {
            Some(FieldKind::Vector { dim }) => Some(*dim),
            _ => None,
        }
    }

    /// Name of the auto-increment id column, if the spec declared one.
    ///
    /// Backends without server-side autoincrement (ClickHouse) assign this
    /// column from a client-side monotonic counter.
    pub fn autoinc_column(&self) -> Option<&str> {
        self.autoinc.as_deref()
    }
}

static CATALOG: Lazy<DashMap<String, Arc<TableFields>>> = Lazy::new(DashMap::new);

/// Default predicate-value cap for string fields
const DEFAULT_MAX_STRING: usize = 256;

fn kind_of(dtype: DataType) -> Option<FieldKind> {
    match dtype {
        DataType::Id | DataType::Int | DataType::BigInt => Some(FieldKind::Integer),
        DataType::Uuid => Some(FieldKind::Uuid),
        DataType::String | DataType::Json => Some(FieldKind::Str {
            max_len: DEFAULT_MAX_STRING,
        }),
        DataType::DateTime | DataType::DateTimeNs => Some(FieldKind::Time),
        DataType::Boolean => Some(FieldKind::Bool),
        DataType::Vector(dim) => Some(FieldKind::Vector { dim: dim as usize }),
        // Blobs are not queryable.
        DataType::Blob => None,
    }
}

/// Register a table spec (subtable fields flatten in dotted form)
pub fn register(spec: &TableSpec) {
    let mut fields = HashMap::new();
    let mut autoinc = None;
    for col in &spec.columns {
        if col.dtype == DataType::Id && autoinc.is_none() {
            autoinc = Some(col.name.clone());
        }
        if let Some(kind) = kind_of(col.dtype) {
            fields.insert(col.name.clone(), kind);
        }
    }
    for sub in &spec.subtables {
        for col in &sub.columns {
            if let Some(kind) = kind_of(col.dtype) {
                fields.insert(format!("{}.{}", sub.name, col.name), kind);
            }
        }
    }
    CATALOG.insert(spec.name.clone(), Arc::new(TableFields { fields, autoinc }));
}

/// Override one field's kind with an enum-string mapping
pub fn register_enum(table: &str, field: &str, mapping: HashMap<String, i64>) {
    let (mut fields, autoinc) = CATALOG
        .get(table)
        .map(|t| (t.fields.clone(), t.autoinc.clone()))
        .unwrap_or_default();
    fields.insert(field.to_string(), FieldKind::Enum(Arc::new(mapping)));
    CATALOG.insert(table.to_string(), Arc::new(TableFields { fields, autoinc }));
}

/// Field map for a table.
///
/// # Errors
///
/// `Predicate` when the table was never registered; lowering has nothing
/// to type predicates against.
pub fn fields(table: &str) -> Result<Arc<TableFields>> {
    CATALOG.get(table).map(|t| t.clone()).ok_or_else(|| {
        Error::Predicate(format!("table '{table}' has no registered specification"))
    })
}

/// Forget a table (used by drop paths and tests)
pub fn forget(table: &str) {
    CATALOG.remove(table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbmark_core::ColumnDef;

    fn spec() -> TableSpec {
        TableSpec::new(
            "catalog_test",
            vec![
                ColumnDef::indexed("id", DataType::Id),
                ColumnDef::indexed("uuid", DataType::Uuid),
                ColumnDef::new("name", DataType::String),
                ColumnDef::indexed("start_time", DataType::DateTime),
                ColumnDef::new("payload", DataType::Blob),
                ColumnDef::indexed("embedding", DataType::Vector(3)),
            ],
        )
    }

    #[test]
    fn register_and_lookup() {
        register(&spec());
        let fields = fields("catalog_test").unwrap();
        assert!(matches!(fields.kind("id").unwrap(), FieldKind::Integer));
        assert!(matches!(fields.kind("start_time").unwrap(), FieldKind::Time));
        assert_eq!(fields.vector_dim("embedding"), Some(3));
        // Blob columns are not queryable and unknown names fail.
        assert!(matches!(
            fields.kind("payload"),
            Err(Error::UnknownField(_))
        ));
        assert!(matches!(fields.kind("nope"), Err(Error::UnknownField(_))));
        forget("catalog_test");
    }

    #[test]
    fn unregistered_table_fails() {
        assert!(matches!(
            fields("never_registered"),
            Err(Error::Predicate(_))
        ));
    }

    #[test]
    fn enum_override() {
        register(&spec());
        register_enum(
            "catalog_test",
            "state",
            HashMap::from([("active".to_string(), 1), ("deleted".to_string(), 2)]),
        );
        let fields = fields("catalog_test").unwrap();
        match fields.kind("state").unwrap() {
            FieldKind::Enum(map) => assert_eq!(map.get("active"), Some(&1)),
            other => panic!("expected enum, got {other:?}"),
        }
        forget("catalog_test");
    }
}
