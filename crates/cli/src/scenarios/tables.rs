//! Table specifications and row recipes used by the catalog

use dbmark_core::{ColumnDef, ColumnRecipe, DataType, TableSpec};

/// Plain insert/update/select target
pub const BASIC_TABLE: &str = "dbmark_basic";

/// Wide table for randomized heavy reads
pub const HEAVY_TABLE: &str = "dbmark_heavy";

/// Dense-vector table (search backends)
pub const VECTOR_TABLE: &str = "dbmark_vectors";

/// Log-line table for time-windowed search
pub const LOGS_TABLE: &str = "dbmark_logs";

/// Embedding dimension of the vector scenarios
pub const VECTOR_DIM: u32 = 384;

/// Basic table: autoinc id, bounded-cardinality tenant/name, timestamps
pub fn basic_spec() -> TableSpec {
    TableSpec::new(
        BASIC_TABLE,
        vec![
            ColumnDef::indexed("id", DataType::Id),
            ColumnDef::indexed("uuid", DataType::Uuid),
            ColumnDef::indexed("tenant_id", DataType::Uuid),
            ColumnDef::new("name", DataType::String),
            ColumnDef::indexed("created_at", DataType::DateTime),
            ColumnDef::new("score", DataType::BigInt),
        ],
    )
}

/// Generated columns of the basic table (id stays server-assigned)
pub fn basic_recipes() -> Vec<ColumnRecipe> {
    vec![
        ColumnRecipe::new("uuid", "uuid"),
        ColumnRecipe::new("tenant_id", "tenant_uuid").with_cardinality(64),
        ColumnRecipe::new("name", "string")
            .with_cardinality(10)
            .with_sizes(4, 8),
        ColumnRecipe::new("created_at", "time"),
        ColumnRecipe::new("score", "bigint").with_cardinality(1_000_000),
    ]
}

/// Heavy table: the basic shape plus JSON payloads and flags
pub fn heavy_spec() -> TableSpec {
    TableSpec::new(
        HEAVY_TABLE,
        vec![
            ColumnDef::indexed("id", DataType::Id),
            ColumnDef::indexed("uuid", DataType::Uuid),
            ColumnDef::indexed("tenant_id", DataType::Uuid),
            ColumnDef::indexed("partner_id", DataType::Uuid),
            ColumnDef::indexed("updated_at", DataType::DateTime),
            ColumnDef::new("enabled", DataType::Boolean),
            ColumnDef::new("score", DataType::BigInt),
            ColumnDef::new("attributes", DataType::Json),
            ColumnDef::new("payload", DataType::Blob),
        ],
    )
}

/// Generated columns of the heavy table
pub fn heavy_recipes() -> Vec<ColumnRecipe> {
    vec![
        ColumnRecipe::new("uuid", "uuid"),
        ColumnRecipe::new("tenant_id", "tenant_uuid").with_cardinality(64),
        ColumnRecipe::new("partner_id", "partner_uuid").with_cardinality(16),
        ColumnRecipe::new("updated_at", "time"),
        ColumnRecipe::new("enabled", "bool"),
        ColumnRecipe::new("score", "bigint").with_cardinality(1_000_000),
        ColumnRecipe::new("attributes", "json").with_cardinality(8),
        ColumnRecipe::new("payload", "blob").with_sizes(64, 256),
    ]
}

/// Vector table: id + embedding + a filterable tenant
pub fn vector_spec() -> TableSpec {
    TableSpec::new(
        VECTOR_TABLE,
        vec![
            ColumnDef::indexed("id", DataType::BigInt),
            ColumnDef::indexed("tenant_id", DataType::Uuid),
            ColumnDef::indexed("embedding", DataType::Vector(VECTOR_DIM)),
        ],
    )
}

/// Generated columns of the vector table
pub fn vector_recipes() -> Vec<ColumnRecipe> {
    vec![
        ColumnRecipe::new("id", "autoinc"),
        ColumnRecipe::new("tenant_id", "tenant_uuid").with_cardinality(64),
        ColumnRecipe::new("embedding", "embedding")
            .with_sizes(VECTOR_DIM as usize, VECTOR_DIM as usize),
    ]
}

/// Logs table: timestamped lines with bounded severity
pub fn logs_spec() -> TableSpec {
    TableSpec::new(
        LOGS_TABLE,
        vec![
            ColumnDef::indexed("id", DataType::BigInt),
            ColumnDef::indexed("start_time", DataType::DateTime),
            ColumnDef::indexed("severity", DataType::String),
            ColumnDef::new("message", DataType::String),
        ],
    )
}

/// Generated columns of the logs table
pub fn logs_recipes() -> Vec<ColumnRecipe> {
    vec![
        ColumnRecipe::new("id", "autoinc"),
        ColumnRecipe::new("start_time", "time"),
        ColumnRecipe::new("severity", "string")
            .with_cardinality(5)
            .with_sizes(4, 8),
        ColumnRecipe::new("message", "rstring").with_sizes(32, 128),
    ]
}
