//! Worker-indexed connection pool
//!
//! A process-wide map `(scheme, dsn, worker-id) → gateway`. Each worker
//! checks its warm gateway out at iteration start and back in at `pre_exit`,
//! so reconnect handshakes are paid once per worker, and no two workers can
//! ever share a session.
//!
//! The map is guarded by a single mutex covering only map mutation; no lock
//! is held across I/O.

use crate::session::Database;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Pool identity of one worker's gateway
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    /// Canonical dialect scheme
    pub scheme: String,
    /// Full DSN as given by the operator
    pub dsn: String,
    /// Owning worker
    pub worker: usize,
}

impl PoolKey {
    /// Key for a worker's gateway
    pub fn new(scheme: impl Into<String>, dsn: impl Into<String>, worker: usize) -> Self {
        PoolKey {
            scheme: scheme.into(),
            dsn: dsn.into(),
            worker,
        }
    }
}

static POOL: Lazy<Mutex<HashMap<PoolKey, Box<dyn Database>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Remove and return the pooled gateway for a key, if present
pub fn take(key: &PoolKey) -> Option<Box<dyn Database>> {
    POOL.lock().remove(key)
}

/// Check a gateway in.
///
/// # Panics
///
/// When a gateway is already pooled under the same key: a double `put`
/// means two owners believed they held the same worker's connection, which
/// is a programmer error the harness refuses to paper over.
pub fn put(key: PoolKey, conn: Box<dyn Database>) {
    let mut pool = POOL.lock();
    if pool.contains_key(&key) {
        panic!(
            "connection pool already holds a gateway for {}/{} worker {}",
            key.scheme, key.dsn, key.worker
        );
    }
    pool.insert(key, conn);
}

/// Number of pooled (checked-in) gateways; used by the leak probe and tests
pub fn pooled_count() -> usize {
    POOL.lock().len()
}

/// Drop every pooled gateway. Called from `pre_exit` teardown.
pub fn drain() {
    POOL.lock().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::session::{DbStats, Session};
    use async_trait::async_trait;
    use dbmark_core::{Result, TableSpec};

    /// Minimal gateway stand-in so pool tests need no live backend
    struct FakeDb(u32);

    #[async_trait]
    impl Database for FakeDb {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
        fn stats(&self) -> DbStats {
            DbStats::default()
        }
        async fn table_exists(&self, _table: &str) -> Result<bool> {
            Ok(false)
        }
        async fn create_table(&self, _spec: &TableSpec) -> Result<()> {
            Ok(())
        }
        async fn drop_table(&self, _table: &str, _use_truncate: bool) -> Result<()> {
            Ok(())
        }
        async fn apply_migration(&self, _name: &str, _ddl: &str) -> Result<()> {
            Ok(())
        }
        async fn create_index(&self, _table: &str, _columns: &[&str]) -> Result<()> {
            Ok(())
        }
        async fn drop_index(&self, _table: &str, _index: &str) -> Result<()> {
            Ok(())
        }
        async fn create_sequence(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn drop_sequence(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        fn session(&self) -> Box<dyn Session> {
            unimplemented!("fake gateway has no sessions")
        }
    }

    #[test]
    fn take_put_round_trips() {
        let key = PoolKey::new("sqlite", "sqlite://pool-test-a", 0);
        assert!(take(&key).is_none());
        put(key.clone(), Box::new(FakeDb(1)));
        let got = take(&key).expect("pooled gateway");
        assert_eq!(got.dialect(), Dialect::Sqlite);
        assert!(take(&key).is_none());
    }

    #[test]
    fn keys_are_worker_scoped() {
        let k0 = PoolKey::new("sqlite", "sqlite://pool-test-b", 0);
        let k1 = PoolKey::new("sqlite", "sqlite://pool-test-b", 1);
        put(k0.clone(), Box::new(FakeDb(0)));
        assert!(take(&k1).is_none());
        assert!(take(&k0).is_some());
    }

    #[test]
    #[should_panic(expected = "already holds a gateway")]
    fn double_put_is_a_programmer_error() {
        let key = PoolKey::new("sqlite", "sqlite://pool-test-c", 0);
        put(key.clone(), Box::new(FakeDb(1)));
        put(key, Box::new(FakeDb(2)));
    }
}
