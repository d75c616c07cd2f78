//! Dialect registry and gateway acquisition
//!
//! [`connection_pool`] is the single entry point workers use: it resolves
//! the scheme to a dialect, checks the worker-keyed pool for a warm gateway,
//! and otherwise connects with the retry policy (fixed 1 ms backoff, then a
//! fatal `Connect` error). [`release`] checks a gateway back in at teardown.

use crate::backends::{clickhouse, mysql, postgres, search, sqlite};
use crate::config::ConnConfig;
use crate::dialect::Dialect;
use crate::leak;
use crate::pool::{self, PoolKey};
use crate::session::Database;
use dbmark_core::{Error, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Fixed backoff between connect attempts
const RETRY_BACKOFF: Duration = Duration::from_millis(1);

fn pool_key(dialect: Dialect, config: &ConnConfig) -> PoolKey {
    PoolKey::new(dialect.scheme(), &config.url, config.worker_id)
}

/// Acquire the gateway for this worker: the pooled one when warm, a fresh
/// connection otherwise.
///
/// # Errors
///
/// `Config` for unknown schemes, `Capability` for dialects with no driver
/// in this build, `Connect` after the retry budget is exhausted.
pub async fn connection_pool(config: &ConnConfig) -> Result<Box<dyn Database>> {
    let dialect = Dialect::from_scheme(&config.scheme()?)?;
    let key = pool_key(dialect, config);
    if let Some(warm) = pool::take(&key) {
        debug!(worker = config.worker_id, %dialect, "reusing pooled gateway");
        return Ok(warm);
    }

    // Dialects recognized by the registry but not backed by a live driver
    // in this build; their SQL/DDL surface still works offline.
    if matches!(dialect, Dialect::SqlServer | Dialect::Cassandra) {
        return Err(Error::Capability(format!(
            "no {dialect} driver is compiled into this build"
        )));
    }

    let attempts = config.retry_attempts.max(1);
    let mut last = String::new();
    for attempt in 1..=attempts {
        match connect(dialect, config).await {
            Ok(db) => {
                info!(worker = config.worker_id, %dialect, attempt, "connected");
                leak::register_gateway(config.worker_id, dialect, db.stats());
                return Ok(db);
            }
            Err(Error::Config(m)) => return Err(Error::Config(m)),
            Err(e) => {
                last = e.to_string();
                debug!(worker = config.worker_id, attempt, error = %last, "connect failed");
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
    Err(Error::Connect {
        url: config.redacted(),
        attempts,
        message: last,
    })
}

async fn connect(dialect: Dialect, config: &ConnConfig) -> Result<Box<dyn Database>> {
    let db: Box<dyn Database> = match dialect {
        Dialect::Sqlite => Box::new(sqlite::connect(config)?),
        Dialect::Postgres => Box::new(postgres::connect(config).await?),
        Dialect::MySql => Box::new(mysql::connect(config).await?),
        Dialect::ClickHouse => Box::new(clickhouse::connect(config)?),
        Dialect::Elasticsearch | Dialect::OpenSearch => {
            Box::new(search::connect(config, dialect)?)
        }
        Dialect::SqlServer | Dialect::Cassandra => {
            return Err(Error::Capability(format!(
                "no {dialect} driver is compiled into this build"
            )))
        }
    };
    Ok(db)
}

/// Return a gateway to the pool for this worker.
///
/// # Errors
///
/// `Config` when the connection string cannot be keyed.
pub fn release(config: &ConnConfig, db: Box<dyn Database>) -> Result<()> {
    let dialect = Dialect::from_scheme(&config.scheme()?)?;
    pool::put(pool_key(dialect, config), db);
    Ok(())
}
