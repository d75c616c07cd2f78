//! Shared types for the dbmark workload harness
//!
//! This crate is the dependency root of the workspace. It defines:
//! - [`Error`] / [`Result`]: the unified error taxonomy every layer uses
//! - [`Value`]: the runtime value enum carried between the data generator,
//!   the query builder, and the backend drivers
//! - [`ColumnRecipe`] and type tags: how synthetic values are described
//! - [`TableSpec`]: dialect-agnostic table definitions consumed by DDL
//! - [`SelectCtrl`]: the structured query descriptor lowered to SQL or to
//!   search-engine JSON by the access layer
//!
//! Nothing here touches a driver or a socket; the crate stays dependency-light
//! so every other crate can build on it.

pub mod error;
pub mod query;
pub mod recipe;
pub mod rows;
pub mod table;
pub mod value;

pub use error::{Error, Result};
pub use query::{Page, SelectCtrl};
pub use recipe::{ColumnRecipe, TypeTag};
pub use rows::Rows;
pub use table::{ColumnDef, DataType, Resilience, TableSpec};
pub use value::Value;
