//! Plugin registry for additional typed generators
//!
//! Recipes whose tag is not built in resolve through this registry. The
//! harness registers three UUID-pool plugins (tenant, customer, partner,
//! stand-ins for the tenant hierarchy, drawn with hot-spot skew) and a dense
//! embedding plugin; scenarios may register their own before workers start.

use crate::streams::Streams;
use dbmark_core::{ColumnRecipe, Error, Result, Value};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A generator for one recipe tag
pub trait ValuePlugin: Send + Sync {
    /// Tag this plugin claims (matched against the recipe tag string)
    fn tag(&self) -> &str;

    /// Produce one value for the recipe
    fn generate(&self, streams: &mut Streams, recipe: &ColumnRecipe) -> Result<Value>;
}

static REGISTRY: Lazy<RwLock<HashMap<String, Arc<dyn ValuePlugin>>>> = Lazy::new(|| {
    let mut map: HashMap<String, Arc<dyn ValuePlugin>> = HashMap::new();
    for plugin in builtin_plugins() {
        map.insert(plugin.tag().to_string(), plugin);
    }
    RwLock::new(map)
});

fn builtin_plugins() -> Vec<Arc<dyn ValuePlugin>> {
    vec![
        Arc::new(UuidPoolPlugin::new("tenant_uuid", 0x74_65_6e)),
        Arc::new(UuidPoolPlugin::new("customer_uuid", 0x63_75_73)),
        Arc::new(UuidPoolPlugin::new("partner_uuid", 0x70_61_72)),
        Arc::new(EmbeddingPlugin),
    ]
}

/// Register (or replace) a plugin. Registration is expected at component
/// init, before workers start; replacing a tag mid-run affects only values
/// not yet generated.
pub fn register_plugin(plugin: Arc<dyn ValuePlugin>) {
    REGISTRY
        .write()
        .insert(plugin.tag().to_string(), plugin);
}

/// Resolve a tag, or fail with `UnknownType`
pub fn generate(tag: &str, streams: &mut Streams, recipe: &ColumnRecipe) -> Result<Value> {
    let plugin = REGISTRY.read().get(tag).cloned();
    match plugin {
        Some(p) => p.generate(streams, recipe),
        None => Err(Error::UnknownType(tag.to_string())),
    }
}

/// Whether any plugin claims the tag
pub fn is_registered(tag: &str) -> bool {
    REGISTRY.read().contains_key(tag)
}

// ---------------------------------------------------------------------------
// Built-in plugins
// ---------------------------------------------------------------------------

/// Deterministic pool of UUIDs drawn with exponential skew.
///
/// The pool stands in for the tenant hierarchy: ids are stable across runs
/// (derived from the tag and pool size alone) and low indices are drawn far
/// more often, reproducing tenant hot-spots.
struct UuidPoolPlugin {
    tag: &'static str,
    salt: u64,
}

impl UuidPoolPlugin {
    const DEFAULT_POOL: u32 = 256;

    fn new(tag: &'static str, salt: u64) -> Self {
        UuidPoolPlugin { tag, salt }
    }

    fn pool(&self, size: u32) -> Vec<Uuid> {
        let mut rng = StdRng::seed_from_u64(self.salt.wrapping_mul(0x9e37_79b9).wrapping_add(size as u64));
        (0..size)
            .map(|_| uuid::Builder::from_random_bytes(rng.gen()).into_uuid())
            .collect()
    }
}

impl ValuePlugin for UuidPoolPlugin {
    fn tag(&self) -> &str {
        self.tag
    }

    fn generate(&self, streams: &mut Streams, recipe: &ColumnRecipe) -> Result<Value> {
        let size = if recipe.cardinality > 0 {
            recipe.cardinality
        } else {
            Self::DEFAULT_POOL
        };
        let pool = self.pool(size);
        let idx = streams.intn_exp(size) as usize;
        Ok(Value::Uuid(pool[idx]))
    }
}

/// Unit-norm float32 embedding; the recipe's `max_size` is the dimension
struct EmbeddingPlugin;

impl ValuePlugin for EmbeddingPlugin {
    fn tag(&self) -> &str {
        "embedding"
    }

    fn generate(&self, streams: &mut Streams, recipe: &ColumnRecipe) -> Result<Value> {
        let dim = recipe.max_size.max(1);
        let mut v: Vec<f32> = (0..dim)
            .map(|_| streams.seeded.gen::<f32>() * 2.0 - 1.0)
            .collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(Value::Vector(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(tag: &str, cardinality: u32) -> ColumnRecipe {
        ColumnRecipe::new("col", tag).with_cardinality(cardinality)
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut s = Streams::new(1, 0);
        let err = generate("dataset.parquet", &mut s, &recipe("dataset.parquet", 0)).unwrap_err();
        assert!(matches!(err, Error::UnknownType(t) if t == "dataset.parquet"));
    }

    #[test]
    fn tenant_pool_is_bounded_and_stable() {
        let mut s = Streams::new(1, 0);
        let r = recipe("tenant_uuid", 8);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            match generate("tenant_uuid", &mut s, &r).unwrap() {
                Value::Uuid(u) => {
                    seen.insert(u);
                }
                other => panic!("expected uuid, got {other:?}"),
            }
        }
        assert!(seen.len() <= 8);

        // A fresh stream bundle draws from the same pool: the union of both
        // runs still respects the cardinality bound.
        let mut s2 = Streams::new(99, 5);
        for _ in 0..200 {
            if let Value::Uuid(u) = generate("tenant_uuid", &mut s2, &r).unwrap() {
                seen.insert(u);
            }
        }
        assert!(seen.len() <= 8);
    }

    #[test]
    fn embedding_dimension_follows_max_size() {
        let mut s = Streams::new(1, 0);
        let r = ColumnRecipe::new("vec", "embedding").with_sizes(3, 3);
        match generate("embedding", &mut s, &r).unwrap() {
            Value::Vector(v) => {
                assert_eq!(v.len(), 3);
                let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                assert!((norm - 1.0).abs() < 1e-3, "not unit norm: {norm}");
            }
            other => panic!("expected vector, got {other:?}"),
        }
    }

    #[test]
    fn custom_registration_wins() {
        struct Fixed;
        impl ValuePlugin for Fixed {
            fn tag(&self) -> &str {
                "custom.fixed"
            }
            fn generate(&self, _: &mut Streams, _: &ColumnRecipe) -> Result<Value> {
                Ok(Value::I64(7))
            }
        }
        register_plugin(Arc::new(Fixed));
        assert!(is_registered("custom.fixed"));
        let mut s = Streams::new(1, 0);
        let v = generate("custom.fixed", &mut s, &recipe("custom.fixed", 0)).unwrap();
        assert_eq!(v, Value::I64(7));
    }
}
