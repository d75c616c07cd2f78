//! Random-schema JSON documents
//!
//! JSON columns are generated in two stages. First a *schema*, a tree of
//! nested objects whose leaves are string or integer fields, is derived
//! from a `schema_id` and memoized process-wide; every worker asking for the
//! same id sees the same shape. Then each call instantiates the schema with
//! fresh leaf values drawn from the caller's seeded stream.
//!
//! Schema depth is drawn from `[0, 6)`; each level flips a coin per field
//! between "nested object" and "leaf". Leaf strings come from a fixed small
//! vocabulary.

use crate::streams::Streams;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Maximum schema nesting depth (exclusive)
pub const MAX_DEPTH: u32 = 6;

/// Leaf vocabulary for string fields
const VOCABULARY: &[&str] = &[
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliet",
    "kilo", "lima",
];

/// Field-name stems; combined with an ordinal to keep names unique per level
const FIELD_STEMS: &[&str] = &["attr", "field", "prop", "meta", "data"];

#[derive(Debug)]
enum Node {
    Str,
    Int,
    Obj(Vec<(String, Node)>),
}

static SCHEMAS: Lazy<DashMap<u32, Arc<Node>>> = Lazy::new(DashMap::new);

fn build_node(rng: &mut StdRng, depth: u32) -> Node {
    if depth == 0 {
        return if rng.gen_bool(0.5) { Node::Str } else { Node::Int };
    }
    let fields = rng.gen_range(2..=4);
    let children = (0..fields)
        .map(|i| {
            let stem = FIELD_STEMS[rng.gen_range(0..FIELD_STEMS.len())];
            let name = format!("{stem}{i}");
            let child = if rng.gen_bool(0.4) {
                build_node(rng, depth - 1)
            } else if rng.gen_bool(0.5) {
                Node::Str
            } else {
                Node::Int
            };
            (name, child)
        })
        .collect();
    Node::Obj(children)
}

fn schema(schema_id: u32) -> Arc<Node> {
    if let Some(s) = SCHEMAS.get(&schema_id) {
        return s.clone();
    }
    SCHEMAS
        .entry(schema_id)
        .or_insert_with(|| {
            let mut rng = StdRng::seed_from_u64(0x6a73_6f6e ^ (u64::from(schema_id) << 8));
            let depth = rng.gen_range(0..MAX_DEPTH);
            Arc::new(build_node(&mut rng, depth))
        })
        .clone()
}

fn instantiate(node: &Node, streams: &mut Streams) -> serde_json::Value {
    match node {
        Node::Str => {
            let word = VOCABULARY[streams.intn(VOCABULARY.len() as u32) as usize];
            serde_json::Value::String(word.to_string())
        }
        Node::Int => serde_json::Value::from(streams.intn(1_000_000) as i64),
        Node::Obj(fields) => {
            let mut map = serde_json::Map::with_capacity(fields.len());
            for (name, child) in fields {
                map.insert(name.clone(), instantiate(child, streams));
            }
            serde_json::Value::Object(map)
        }
    }
}

/// A document for the given schema id, leaf values drawn from `streams.seeded`.
///
/// `schema_id` is expected in `[0, cardinality)`; the shape for an id is
/// fixed for the process lifetime (and across processes, since derivation is
/// keyed on the id alone).
pub fn document(schema_id: u32, streams: &mut Streams) -> serde_json::Value {
    let schema = schema(schema_id);
    instantiate(&schema, streams)
}
