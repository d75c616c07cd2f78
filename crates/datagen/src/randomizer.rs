//! Per-worker recipe dispatcher
//!
//! One [`Randomizer`] per worker. Typed generator methods draw from the
//! stream the type calls for; [`Randomizer::value_for`] dispatches a whole
//! [`ColumnRecipe`] and is what the bulk-insert scenarios call in their
//! inner loop.

use crate::json;
use crate::plugins;
use crate::pools;
use crate::streams::Streams;
use chrono::{DateTime, Duration, DurationRound, Utc};
use dashmap::DashMap;
use dbmark_core::{ColumnRecipe, Result, TypeTag, Value};
use once_cell::sync::Lazy;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Fixed prefix of cardinality-bounded UUIDs; the last eight hex digits
/// carry the drawn index.
const BOUNDED_UUID_PREFIX: &str = "01234567-89ab-cdef-0123-0000";

/// Default backward time window for `time` recipes, in days
const DEFAULT_DAYS_AGO_LIMIT: u32 = 90;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Client-side auto-increment counters, shared by all workers and keyed by
/// column name so concurrent inserts never collide.
static AUTOINC: Lazy<DashMap<String, Arc<AtomicI64>>> = Lazy::new(DashMap::new);

/// Per-worker synthetic value source
pub struct Randomizer {
    streams: Streams,
    worker: usize,
    days_ago_limit: u32,
}

impl Randomizer {
    /// Randomizer for one worker under benchmark seed `seed`
    pub fn new(seed: u64, worker: usize) -> Self {
        Randomizer {
            streams: Streams::new(seed, worker),
            worker,
            days_ago_limit: DEFAULT_DAYS_AGO_LIMIT,
        }
    }

    /// Override the backward window used by `time` recipes
    pub fn with_days_window(mut self, days: u32) -> Self {
        self.days_ago_limit = days.max(1);
        self
    }

    /// Worker index this randomizer belongs to
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Direct access to the underlying streams (plugins, scenarios)
    pub fn streams(&mut self) -> &mut Streams {
        &mut self.streams
    }

    /// Uniform draw in `[0, n)` (seeded stream)
    pub fn intn(&mut self, n: u32) -> u32 {
        self.streams.intn(n)
    }

    /// Uniform `u64` (seeded stream)
    pub fn uint64(&mut self) -> u64 {
        self.streams.uint64()
    }

    /// Exponentially decaying draw in `[0, max)` (seeded stream)
    pub fn intn_exp(&mut self, max: u32) -> u32 {
        self.streams.intn_exp(max)
    }

    /// UUID v4 from the seeded stream (reproducible per worker)
    pub fn uuid(&mut self) -> Uuid {
        uuid::Builder::from_random_bytes(self.streams.seeded.gen()).into_uuid()
    }

    /// Cardinality-bounded UUID: fixed prefix, last eight hex digits drawn
    /// from `[0, cardinality)` on the seeded stream
    pub fn bounded_uuid(&mut self, cardinality: u32) -> Uuid {
        let idx = self.streams.intn(cardinality);
        let text = format!("{BOUNDED_UUID_PREFIX}{idx:08x}");
        // The prefix is a valid UUID skeleton; parsing cannot fail.
        Uuid::parse_str(&text).expect("bounded uuid literal")
    }

    /// Timestamp inside the backward window `[now - days_ago_limit, now]`
    pub fn time_in_window(&mut self) -> DateTime<Utc> {
        let window_secs = u64::from(self.days_ago_limit) * 86_400;
        let back_secs = (self.streams.uint64() % window_secs) as i64;
        let back_nanos = i64::from(self.streams.intn(1_000_000_000));
        Utc::now() - Duration::seconds(back_secs) - Duration::nanoseconds(back_nanos)
    }

    /// Pool-drawn string for a cardinality-bounded recipe
    pub fn pooled_string(&mut self, prefix: &str, cardinality: u32, min: usize, max: usize) -> String {
        let pool = pools::string_pool(prefix, cardinality, min, max);
        let idx = self.streams.intn(pool.len() as u32) as usize;
        pool[idx].clone()
    }

    /// Fresh random string (unique stream), length in `[min, max]`
    pub fn random_string(&mut self, min: usize, max: usize) -> String {
        let len = if max > min {
            self.streams.unique.gen_range(min..=max)
        } else {
            min
        };
        (0..len)
            .map(|_| ALPHABET[self.streams.unique.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }

    /// Seeded random bytes, length in `[min, max]`
    pub fn blob(&mut self, min: usize, max: usize) -> Vec<u8> {
        let len = if max > min {
            self.streams.seeded.gen_range(min..=max)
        } else {
            min
        };
        (0..len).map(|_| self.streams.seeded.gen()).collect()
    }

    /// Next client-side auto-increment value for a column
    pub fn autoinc(&self, column: &str) -> i64 {
        let counter = AUTOINC
            .entry(column.to_string())
            .or_insert_with(|| Arc::new(AtomicI64::new(1)))
            .clone();
        counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Generate one value for a recipe.
    ///
    /// # Errors
    ///
    /// `UnknownType` when the tag is neither built in nor claimed by a
    /// registered plugin.
    pub fn value_for(&mut self, recipe: &ColumnRecipe) -> Result<Value> {
        let value = match &recipe.tag {
            TypeTag::Autoinc => Value::I64(self.autoinc(&recipe.name)),
            TypeTag::NowSec => {
                let t = Utc::now();
                Value::DateTime(t.duration_trunc(Duration::seconds(1)).unwrap_or(t))
            }
            TypeTag::NowMs => {
                let t = Utc::now();
                Value::DateTime(t.duration_trunc(Duration::milliseconds(1)).unwrap_or(t))
            }
            TypeTag::NowNs => Value::DateTime(Utc::now()),
            TypeTag::Int => {
                if recipe.cardinality > 0 {
                    Value::I64(i64::from(self.streams.intn(recipe.cardinality)))
                } else {
                    Value::I64(i64::from(self.streams.seeded.gen::<u32>() >> 1))
                }
            }
            TypeTag::BigInt => {
                if recipe.cardinality > 0 {
                    Value::I64(i64::from(self.streams.intn(recipe.cardinality)))
                } else {
                    Value::I64((self.streams.uint64() >> 1) as i64)
                }
            }
            TypeTag::String => {
                if recipe.cardinality > 0 {
                    Value::String(self.pooled_string(
                        &recipe.name,
                        recipe.cardinality,
                        recipe.min_size,
                        recipe.max_size,
                    ))
                } else {
                    Value::String(self.random_string(recipe.min_size, recipe.max_size))
                }
            }
            TypeTag::RString => Value::String(self.random_string(recipe.min_size, recipe.max_size)),
            TypeTag::Uuid => {
                if recipe.cardinality > 0 {
                    Value::Uuid(self.bounded_uuid(recipe.cardinality))
                } else {
                    Value::Uuid(self.uuid())
                }
            }
            TypeTag::Time => Value::DateTime(self.time_in_window()),
            TypeTag::TimeString => Value::String(self.time_in_window().to_rfc3339()),
            TypeTag::TimeNs => {
                let t = self.time_in_window();
                Value::I64(t.timestamp_nanos_opt().unwrap_or_else(|| t.timestamp()))
            }
            TypeTag::Timestamp => Value::I64(self.time_in_window().timestamp()),
            TypeTag::Byte => {
                if recipe.cardinality > 0 {
                    let pool = pools::byte_pool(
                        &recipe.name,
                        recipe.cardinality,
                        recipe.min_size,
                        recipe.max_size,
                    );
                    let idx = self.streams.intn(pool.len() as u32) as usize;
                    Value::Bytes(pool[idx].clone())
                } else {
                    let len = recipe.max_size.max(1);
                    Value::Bytes((0..len).map(|_| self.streams.unique.gen()).collect())
                }
            }
            TypeTag::RByte => {
                let len = recipe.max_size.max(1);
                Value::Bytes((0..len).map(|_| self.streams.unique.gen()).collect())
            }
            TypeTag::Blob => Value::Bytes(self.blob(recipe.min_size, recipe.max_size)),
            TypeTag::Json => {
                let schema_id = self.streams.intn(recipe.cardinality.max(1));
                Value::Json(json::document(schema_id, &mut self.streams))
            }
            TypeTag::Bool => Value::Bool(self.streams.seeded.gen_bool(0.5)),
            TypeTag::TenantUuid | TypeTag::CustomerUuid | TypeTag::PartnerUuid => {
                return plugins::generate(recipe.tag.as_str(), &mut self.streams, recipe)
            }
            TypeTag::Custom(tag) => return plugins::generate(tag, &mut self.streams, recipe),
        };
        Ok(value)
    }

    /// Generate one row for an ordered recipe set
    pub fn row_for(&mut self, recipes: &[ColumnRecipe]) -> Result<Vec<Value>> {
        recipes.iter().map(|r| self.value_for(r)).collect()
    }
}

impl std::fmt::Debug for Randomizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Randomizer")
            .field("worker", &self.worker)
            .field("days_ago_limit", &self.days_ago_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seeded_values_replay_for_same_worker() {
        let recipes = vec![
            ColumnRecipe::new("k", "int").with_cardinality(1000),
            ColumnRecipe::new("u", "uuid"),
            ColumnRecipe::new("s", "string").with_cardinality(16).with_sizes(4, 12),
            ColumnRecipe::new("j", "json").with_cardinality(4),
            ColumnRecipe::new("f", "bool"),
        ];
        let mut a = Randomizer::new(42, 3);
        let mut b = Randomizer::new(42, 3);
        for _ in 0..64 {
            assert_eq!(a.row_for(&recipes).unwrap(), b.row_for(&recipes).unwrap());
        }
    }

    #[test]
    fn bounded_uuid_shape() {
        let mut r = Randomizer::new(1, 0);
        for _ in 0..32 {
            let u = r.bounded_uuid(100);
            let text = u.to_string();
            assert!(text.starts_with("01234567-89ab-cdef-0123-0000"), "{text}");
            // Still parses as a UUID.
            Uuid::parse_str(&text).unwrap();
        }
    }

    #[test]
    fn plain_uuid_is_v4() {
        let mut r = Randomizer::new(1, 0);
        let u = r.uuid();
        assert_eq!(u.get_version_num(), 4);
    }

    #[test]
    fn string_cardinality_is_bounded() {
        let recipe = ColumnRecipe::new("card_col", "string")
            .with_cardinality(10)
            .with_sizes(4, 8);
        let mut r = Randomizer::new(5, 0);
        let mut seen = HashSet::new();
        for _ in 0..500 {
            match r.value_for(&recipe).unwrap() {
                Value::String(s) => {
                    assert!(s.len() >= 4 && s.len() <= 8, "bad length: {s:?}");
                    seen.insert(s);
                }
                other => panic!("expected string, got {other:?}"),
            }
        }
        assert!(seen.len() <= 10, "cardinality exceeded: {}", seen.len());
    }

    #[test]
    fn time_window_is_backward_facing() {
        let mut r = Randomizer::new(5, 0).with_days_window(7);
        let now = Utc::now();
        for _ in 0..100 {
            let t = r.time_in_window();
            assert!(t <= now + Duration::seconds(1));
            assert!(t >= now - Duration::days(8));
        }
    }

    #[test]
    fn autoinc_is_monotonic_and_shared() {
        let a = Randomizer::new(1, 0);
        let b = Randomizer::new(1, 1);
        let v1 = a.autoinc("shared_ai_col");
        let v2 = b.autoinc("shared_ai_col");
        let v3 = a.autoinc("shared_ai_col");
        assert!(v1 < v2 && v2 < v3);
    }

    #[test]
    fn unknown_tag_fails() {
        let recipe = ColumnRecipe::new("x", "dataset.rows");
        let mut r = Randomizer::new(1, 0);
        assert!(matches!(
            r.value_for(&recipe),
            Err(dbmark_core::Error::UnknownType(_))
        ));
    }

    #[test]
    fn blob_respects_bounds() {
        let recipe = ColumnRecipe::new("b", "blob").with_sizes(64, 128);
        let mut r = Randomizer::new(1, 0);
        for _ in 0..32 {
            match r.value_for(&recipe).unwrap() {
                Value::Bytes(b) => assert!(b.len() >= 64 && b.len() <= 128),
                other => panic!("expected bytes, got {other:?}"),
            }
        }
    }
}
