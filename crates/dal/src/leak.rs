//! Connection-leak probe
//!
//! Gateways register a snapshot source on connect; a background task
//! re-reads them on a timer and warns when a single worker's gateway holds
//! more than one live connection. With worker-exclusive ownership that can
//! only mean a leak.

use crate::dialect::Dialect;
use crate::session::DbStats;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Clone)]
struct GatewayEntry {
    worker: usize,
    dialect: Dialect,
    stats: DbStats,
}

static GATEWAYS: Lazy<Mutex<Vec<GatewayEntry>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Record a freshly connected gateway
pub fn register_gateway(worker: usize, dialect: Dialect, stats: DbStats) {
    GATEWAYS.lock().push(GatewayEntry {
        worker,
        dialect,
        stats,
    });
}

/// Update the recorded snapshot for a worker's gateway
pub fn update_gateway(worker: usize, dialect: Dialect, stats: DbStats) {
    let mut gateways = GATEWAYS.lock();
    match gateways
        .iter_mut()
        .find(|g| g.worker == worker && g.dialect == dialect)
    {
        Some(entry) => entry.stats = stats,
        None => gateways.push(GatewayEntry {
            worker,
            dialect,
            stats,
        }),
    }
}

/// Count of snapshots currently considered leaking
pub fn leaking_count() -> usize {
    GATEWAYS
        .lock()
        .iter()
        .filter(|g| g.stats.open_connections > 1)
        .count()
}

/// Clear all recorded snapshots (teardown, tests)
pub fn reset() {
    GATEWAYS.lock().clear();
}

/// Start the background probe; abort the handle at teardown
pub fn spawn_probe(interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for entry in GATEWAYS.lock().iter() {
                if entry.stats.open_connections > 1 {
                    warn!(
                        worker = entry.worker,
                        dialect = %entry.dialect,
                        open = entry.stats.open_connections,
                        "worker gateway holds more than one live connection"
                    );
                }
            }
        }
    })
}
