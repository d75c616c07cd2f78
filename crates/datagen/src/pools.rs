//! Process-wide memoized value pools for cardinality-bounded recipes
//!
//! A recipe with `cardinality = K > 0` draws from a pool of exactly K
//! values. Pools are keyed by `(prefix, K, min, max)`, built lazily on first
//! use, shared by every worker, and never evicted. Contents are derived from
//! a stable hash of the key, so the same recipe yields the same pool in any
//! process.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Pool identity: prefix, cardinality, min size, max size
pub type PoolKey = (String, u32, usize, usize);

static STRING_POOLS: Lazy<DashMap<PoolKey, Arc<Vec<String>>>> = Lazy::new(DashMap::new);
static BYTE_POOLS: Lazy<DashMap<PoolKey, Arc<Vec<Vec<u8>>>>> = Lazy::new(DashMap::new);

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// FNV-1a over the pool key; gives each pool a stable private seed
fn key_seed(key: &PoolKey) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    let mut eat = |bytes: &[u8]| {
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
    };
    eat(key.0.as_bytes());
    eat(&key.1.to_le_bytes());
    eat(&key.2.to_le_bytes());
    eat(&key.3.to_le_bytes());
    h
}

fn random_chars(rng: &mut StdRng, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// One pool string: prefixed when the prefix fits the length budget,
/// plain random characters otherwise. Length is always within [min, max].
fn pool_string(rng: &mut StdRng, prefix: &str, min: usize, max: usize) -> String {
    let len = if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    };
    if prefix.len() + 1 < len {
        format!("{prefix}_{}", random_chars(rng, len - prefix.len() - 1))
    } else {
        random_chars(rng, len)
    }
}

/// The memoized string pool for a key, building it on first use.
///
/// Note the pool may hold fewer than K *distinct* values when the length
/// budget cannot express K combinations; the guarantee is "at most K".
pub fn string_pool(prefix: &str, cardinality: u32, min: usize, max: usize) -> Arc<Vec<String>> {
    let key: PoolKey = (prefix.to_string(), cardinality, min, max);
    if let Some(pool) = STRING_POOLS.get(&key) {
        return pool.clone();
    }
    // entry() re-checks under the shard lock, so two workers racing here
    // still agree on one pool.
    STRING_POOLS
        .entry(key.clone())
        .or_insert_with(|| {
            tracing::debug!(prefix, cardinality, min, max, "building string pool");
            let mut rng = StdRng::seed_from_u64(key_seed(&key));
            let pool = (0..cardinality.max(1))
                .map(|_| pool_string(&mut rng, prefix, min, max))
                .collect();
            Arc::new(pool)
        })
        .clone()
}

/// The memoized byte pool for a key, building it on first use
pub fn byte_pool(prefix: &str, cardinality: u32, min: usize, max: usize) -> Arc<Vec<Vec<u8>>> {
    let key: PoolKey = (prefix.to_string(), cardinality, min, max);
    if let Some(pool) = BYTE_POOLS.get(&key) {
        return pool.clone();
    }
    BYTE_POOLS
        .entry(key.clone())
        .or_insert_with(|| {
            let mut rng = StdRng::seed_from_u64(key_seed(&key).rotate_left(17));
            let pool = (0..cardinality.max(1))
                .map(|_| {
                    let len = if max > min {
                        rng.gen_range(min..=max)
                    } else {
                        min
                    };
                    (0..len).map(|_| rng.gen::<u8>()).collect::<Vec<u8>>()
                })
                .collect();
            Arc::new(pool)
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn pool_is_memoized() {
        let a = string_pool("memo_test", 16, 4, 12);
        let b = string_pool("memo_test", 16, 4, 12);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_sizes_get_different_pools() {
        let a = string_pool("sized", 8, 4, 8);
        let b = string_pool("sized", 8, 4, 16);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn pool_respects_cardinality_and_lengths() {
        let pool = string_pool("card", 10, 4, 8);
        assert_eq!(pool.len(), 10);
        let distinct: HashSet<_> = pool.iter().collect();
        assert!(distinct.len() <= 10);
        for v in pool.iter() {
            assert!(v.len() >= 4 && v.len() <= 8, "bad length: {v:?}");
        }
    }

    #[test]
    fn prefix_appears_when_it_fits() {
        let pool = string_pool("user", 8, 12, 16);
        assert!(pool.iter().all(|v| v.starts_with("user_")));
    }

    #[test]
    fn zero_cardinality_builds_singleton() {
        // Callers treat 0 as "unique per call" and never reach the pool,
        // but the pool itself stays well-defined.
        let pool = string_pool("zeroed", 0, 4, 4);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn byte_pool_lengths() {
        let pool = byte_pool("payload", 5, 16, 32);
        assert_eq!(pool.len(), 5);
        for v in pool.iter() {
            assert!(v.len() >= 16 && v.len() <= 32);
        }
    }
}
