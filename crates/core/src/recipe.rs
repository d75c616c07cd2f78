//! Column recipes: how synthetic values are described
//!
//! A [`ColumnRecipe`] tells the data generator what to manufacture for one
//! column: a type tag, a cardinality, and size bounds. The tag vocabulary is
//! a closed string-keyed set; tags outside it (including the whole
//! `dataset.*` family) are delegated to registered plugin generators and
//! fail with `UnknownType` when nothing claims them.
//!
//! Cardinality semantics: `0` means "unique per call"; `K > 0` means "draw
//! from a memoized pool of size K", where the pool key includes the size
//! bounds so two recipes with the same prefix but different lengths do not
//! share values.

use serde::{Deserialize, Serialize};

/// Closed set of built-in column type tags
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    /// Monotonic per-table integer, assigned by the generator
    Autoinc,
    /// Current wall time at second resolution
    NowSec,
    /// Current wall time at millisecond resolution
    NowMs,
    /// Current wall time at nanosecond resolution
    NowNs,
    /// Random 32-bit-range integer
    Int,
    /// Random 64-bit-range integer
    BigInt,
    /// Cardinality-bounded string drawn from a memoized pool
    String,
    /// Fresh random string per call
    RString,
    /// UUID v4; cardinality-bounded form uses a fixed prefix
    Uuid,
    /// Timestamp inside a backward-facing window
    Time,
    /// Same as `Time`, rendered as an RFC3339 string
    TimeString,
    /// Same as `Time`, rendered as unix nanoseconds
    TimeNs,
    /// Same as `Time`, rendered as unix seconds
    Timestamp,
    /// Cardinality-bounded byte string
    Byte,
    /// Fresh random byte string per call
    RByte,
    /// Object generated from a memoized random schema
    Json,
    /// Random boolean
    Bool,
    /// Large random byte payload honoring the size bounds
    Blob,
    /// Skew-drawn tenant UUID from the seeded tenant pool
    TenantUuid,
    /// Skew-drawn customer UUID
    CustomerUuid,
    /// Skew-drawn partner UUID
    PartnerUuid,
    /// Anything else; resolved through the plugin registry
    Custom(String),
}

impl TypeTag {
    /// Parse a recipe tag. Unrecognized tags become [`TypeTag::Custom`] and
    /// are resolved (or rejected) by the generator's plugin registry.
    pub fn parse(tag: &str) -> TypeTag {
        match tag {
            "autoinc" => TypeTag::Autoinc,
            "now" | "now_sec" => TypeTag::NowSec,
            "now_ms" => TypeTag::NowMs,
            "now_ns" => TypeTag::NowNs,
            "int" => TypeTag::Int,
            "bigint" => TypeTag::BigInt,
            "string" => TypeTag::String,
            "rstring" => TypeTag::RString,
            "uuid" => TypeTag::Uuid,
            "time" => TypeTag::Time,
            "time_string" => TypeTag::TimeString,
            "time_ns" => TypeTag::TimeNs,
            "timestamp" => TypeTag::Timestamp,
            "byte" => TypeTag::Byte,
            "rbyte" => TypeTag::RByte,
            "json" => TypeTag::Json,
            "bool" => TypeTag::Bool,
            "blob" => TypeTag::Blob,
            "tenant_uuid" => TypeTag::TenantUuid,
            "customer_uuid" => TypeTag::CustomerUuid,
            "partner_uuid" => TypeTag::PartnerUuid,
            other => TypeTag::Custom(other.to_string()),
        }
    }

    /// Tag string as written in recipes (inverse of [`TypeTag::parse`])
    pub fn as_str(&self) -> &str {
        match self {
            TypeTag::Autoinc => "autoinc",
            TypeTag::NowSec => "now_sec",
            TypeTag::NowMs => "now_ms",
            TypeTag::NowNs => "now_ns",
            TypeTag::Int => "int",
            TypeTag::BigInt => "bigint",
            TypeTag::String => "string",
            TypeTag::RString => "rstring",
            TypeTag::Uuid => "uuid",
            TypeTag::Time => "time",
            TypeTag::TimeString => "time_string",
            TypeTag::TimeNs => "time_ns",
            TypeTag::Timestamp => "timestamp",
            TypeTag::Byte => "byte",
            TypeTag::RByte => "rbyte",
            TypeTag::Json => "json",
            TypeTag::Bool => "bool",
            TypeTag::Blob => "blob",
            TypeTag::TenantUuid => "tenant_uuid",
            TypeTag::CustomerUuid => "customer_uuid",
            TypeTag::PartnerUuid => "partner_uuid",
            TypeTag::Custom(s) => s,
        }
    }
}

/// Generation recipe for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRecipe {
    /// Column name; doubles as the pool prefix for cardinality-bounded tags
    pub name: String,
    /// What to generate
    pub tag: TypeTag,
    /// Pool size; 0 = unique per call
    pub cardinality: u32,
    /// Minimum generated size (string/byte lengths)
    pub min_size: usize,
    /// Maximum generated size
    pub max_size: usize,
}

impl ColumnRecipe {
    /// Recipe with default sizes (strings of 1..=32)
    pub fn new(name: impl Into<String>, tag: &str) -> Self {
        ColumnRecipe {
            name: name.into(),
            tag: TypeTag::parse(tag),
            cardinality: 0,
            min_size: 1,
            max_size: 32,
        }
    }

    /// Builder-style cardinality override
    pub fn with_cardinality(mut self, cardinality: u32) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Builder-style size bounds override
    pub fn with_sizes(mut self, min_size: usize, max_size: usize) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }
}
