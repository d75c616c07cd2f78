//! Synthetic data generation for the dbmark harness
//!
//! Each worker owns one [`Randomizer`]. It exposes typed generators (ints,
//! UUIDs, bounded strings, windowed times, JSON documents, byte blobs) and a
//! recipe dispatcher, [`Randomizer::value_for`], that turns a
//! [`ColumnRecipe`](dbmark_core::ColumnRecipe) into a
//! [`Value`](dbmark_core::Value).
//!
//! # Determinism
//!
//! A randomizer carries three pseudo-random streams:
//!
//! | Stream   | Seed               | Use                                      |
//! |----------|--------------------|------------------------------------------|
//! | `fixed`  | 0                  | choices identical across all workers     |
//! | `seeded` | Z + 1 + worker-id  | reproducible per (Z, worker) choices     |
//! | `unique` | wall clock         | values that must differ between runs     |
//!
//! Every choice that must replay identically for a given (Z, worker) draws
//! from `seeded` and nothing else. Cardinality-bounded pools and memoized
//! JSON schemas are keyed globally and built from stable key-derived seeds,
//! so their *contents* are also identical across runs; only the draw order
//! is per-worker.
//!
//! # Plugins
//!
//! Tags outside the built-in set resolve through the global
//! [`plugins`] registry; an unclaimed tag fails with `UnknownType`.

pub mod json;
pub mod plugins;
pub mod pools;
pub mod randomizer;
pub mod streams;

pub use plugins::{register_plugin, ValuePlugin};
pub use randomizer::Randomizer;
pub use streams::Streams;
