//! Live backend connectors

pub mod clickhouse;
pub mod mysql;
pub mod postgres;
pub mod search;
pub mod sqlite;
