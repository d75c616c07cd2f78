//! Runtime values exchanged between the generator, query builder, and drivers
//!
//! [`Value`] is the one currency the harness moves around: the data generator
//! produces them, bulk-insert paths bind them as driver parameters, the
//! search emitter serializes them to JSON, and result rows come back as them.
//!
//! Driver-specific conversions (to `rusqlite` params, `tokio-postgres`
//! `ToSql`, MySQL values, …) live with the drivers; this type stays plain.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unified runtime value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL / absent field
    Null,
    /// Boolean
    Bool(bool),
    /// Signed 64-bit integer (covers int and bigint columns)
    I64(i64),
    /// Unsigned 64-bit integer (sequence counters, row ids)
    U64(u64),
    /// 64-bit float
    F64(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes (blob columns)
    Bytes(Vec<u8>),
    /// UUID (stored as native uuid where the backend has one, text otherwise)
    Uuid(Uuid),
    /// Timestamp with timezone, UTC-normalized
    DateTime(DateTime<Utc>),
    /// Structured JSON payload
    Json(serde_json::Value),
    /// Dense float32 vector (embedding columns)
    Vector(Vec<f32>),
}

impl Value {
    /// Short kind name used in logs and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::DateTime(_) => "datetime",
            Value::Json(_) => "json",
            Value::Vector(_) => "vector",
        }
    }

    /// Integer view, if this value is integral
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// String view, if this value is textual
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Projection into a JSON value, used by the search-engine request paths.
    ///
    /// Timestamps render as RFC3339 with nanoseconds (the `date_nanos`
    /// mapping format); bytes render as an array of numbers, which only the
    /// tests rely on; search tables do not carry blob columns.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::I64(v) => serde_json::Value::from(*v),
            Value::U64(v) => serde_json::Value::from(*v),
            Value::F64(v) => serde_json::Value::from(*v),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::from(b.clone()),
            Value::Uuid(u) => serde_json::Value::String(u.to_string()),
            Value::DateTime(t) => {
                serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
            Value::Json(j) => j.clone(),
            Value::Vector(v) => serde_json::Value::from(v.clone()),
        }
    }
}

impl std::fmt::Display for Value {
    /// Human-oriented rendering for logs. Dialect-aware SQL quoting is the
    /// access layer's job, not this impl's.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
            Value::Json(j) => write!(f, "{j}"),
            Value::Vector(v) => write!(f, "<{}-dim vector>", v.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::I64(1).kind(), "i64");
        assert_eq!(Value::Vector(vec![0.1]).kind(), "vector");
    }

    #[test]
    fn as_i64_covers_unsigned() {
        assert_eq!(Value::U64(7).as_i64(), Some(7));
        assert_eq!(Value::U64(u64::MAX).as_i64(), None);
        assert_eq!(Value::String("7".into()).as_i64(), None);
    }

    #[test]
    fn datetime_json_is_rfc3339_nanos() {
        let t = DateTime::parse_from_rfc3339("2024-05-01T10:00:00.000000001Z")
            .unwrap()
            .with_timezone(&Utc);
        let j = Value::DateTime(t).to_json();
        assert_eq!(j, serde_json::json!("2024-05-01T10:00:00.000000001Z"));
    }

    #[test]
    fn vector_json_is_number_array() {
        let j = Value::Vector(vec![0.5, 1.0]).to_json();
        assert_eq!(j, serde_json::json!([0.5, 1.0]));
    }
}
