//! Benchmark and worker contexts
//!
//! The [`Benchmark`] owns a dense array of [`WorkerCtx`]s (arena + index:
//! workers hold only their own index, never a back-pointer) plus the shared
//! pieces: options, the shutdown signal, and a vault scenarios use to pass
//! facts between stages (created-table names, warm-up row counts).

use crate::signal::Shutdown;
use dbmark_datagen::Randomizer;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Operator-selected run parameters
#[derive(Debug, Clone)]
pub struct BenchOpts {
    /// Worker count N
    pub workers: usize,
    /// Total iteration budget L across workers; 0 selects duration mode
    pub loops: u64,
    /// Wall-clock budget D, used when `loops == 0`
    pub duration: Option<Duration>,
    /// Repeat count R
    pub repeats: u32,
    /// Inter-iteration sleep S
    pub sleep: Duration,
    /// Random seed Z
    pub seed: u64,
    /// Score unit label
    pub metric: String,
}

impl Default for BenchOpts {
    fn default() -> Self {
        BenchOpts {
            workers: 1,
            loops: 0,
            duration: Some(Duration::from_secs(10)),
            repeats: 1,
            sleep: Duration::ZERO,
            seed: 1,
            metric: "loops/sec".to_string(),
        }
    }
}

impl BenchOpts {
    /// Planned loops for worker `i`: `L/N`, with the first `L%N` workers
    /// taking one extra. Zero in duration mode.
    pub fn planned_loops(&self, worker: usize) -> u64 {
        if self.loops == 0 {
            return 0;
        }
        let n = self.workers.max(1) as u64;
        let base = self.loops / n;
        let extra = self.loops % n;
        base + u64::from((worker as u64) < extra)
    }
}

/// Scenario-shared state on the benchmark context
#[derive(Debug, Default)]
pub struct Vault {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl Vault {
    /// Store a fact
    pub fn set(&self, key: &str, value: serde_json::Value) {
        self.entries.write().insert(key.to_string(), value);
    }

    /// Read a fact
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.read().get(key).cloned()
    }
}

/// One worker's private state
pub struct WorkerCtx {
    /// Worker index in `[0, N)`
    pub index: usize,
    /// Per-worker deterministic randomizer (seeded from (Z, index))
    pub rand: Randomizer,
    /// Loops planned for the current repeat; 0 in duration mode
    pub planned_loops: u64,
    /// Loops executed over the worker's lifetime
    pub executed_loops: u64,
    /// Scenario-owned datum, typically the worker's database gateway
    pub data: Option<Box<dyn Any + Send>>,
    /// Shared shutdown signal, polled at iteration boundaries
    pub shutdown: Arc<Shutdown>,
    /// Shared vault
    pub vault: Arc<Vault>,
}

impl WorkerCtx {
    pub(crate) fn new(index: usize, opts: &BenchOpts, shutdown: Arc<Shutdown>, vault: Arc<Vault>) -> Self {
        WorkerCtx {
            index,
            rand: Randomizer::new(opts.seed, index),
            planned_loops: opts.planned_loops(index),
            executed_loops: 0,
            data: None,
            shutdown,
            vault,
        }
    }

    /// Typed view of the scenario-owned datum
    pub fn data_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.as_mut().and_then(|d| d.downcast_mut::<T>())
    }

    /// Take the scenario-owned datum back out (teardown)
    pub fn take_data<T: 'static>(&mut self) -> Option<Box<T>> {
        match self.data.take() {
            Some(d) => match d.downcast::<T>() {
                Ok(t) => Some(t),
                Err(d) => {
                    self.data = Some(d);
                    None
                }
            },
            None => None,
        }
    }
}

impl std::fmt::Debug for WorkerCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerCtx")
            .field("index", &self.index)
            .field("planned_loops", &self.planned_loops)
            .field("executed_loops", &self.executed_loops)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_budget_split_with_remainder() {
        let opts = BenchOpts {
            workers: 3,
            loops: 100,
            ..BenchOpts::default()
        };
        let split: Vec<u64> = (0..3).map(|i| opts.planned_loops(i)).collect();
        assert_eq!(split, vec![34, 33, 33]);
        assert_eq!(split.iter().sum::<u64>(), 100);
    }

    #[test]
    fn duration_mode_plans_zero_loops() {
        let opts = BenchOpts {
            workers: 4,
            loops: 0,
            ..BenchOpts::default()
        };
        assert_eq!(opts.planned_loops(0), 0);
    }

    #[test]
    fn vault_round_trips() {
        let vault = Vault::default();
        vault.set("rows", serde_json::json!(100));
        assert_eq!(vault.get("rows"), Some(serde_json::json!(100)));
        assert_eq!(vault.get("missing"), None);
    }

    #[test]
    fn worker_data_downcasts() {
        let opts = BenchOpts::default();
        let mut ctx = WorkerCtx::new(0, &opts, Shutdown::new(), Arc::new(Vault::default()));
        ctx.data = Some(Box::new(42u32));
        assert_eq!(ctx.data_mut::<u32>(), Some(&mut 42));
        assert!(ctx.data_mut::<String>().is_none());
        assert_eq!(ctx.take_data::<u32>().as_deref(), Some(&42));
        assert!(ctx.data.is_none());
    }
}
