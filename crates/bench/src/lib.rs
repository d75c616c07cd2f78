//! Worker scheduler and rate aggregation for the dbmark harness
//!
//! The scheduler fans N parallel workers out against a scenario's worker
//! function under an iteration budget (L loops split across workers) or a
//! wall-clock budget (D), repeats the run R times, and aggregates
//! per-repeat scores into min / max / mean / geometric-mean rates.
//!
//! # Concurrency model
//!
//! Workers are independent sequential loops on the multi-threaded runtime;
//! there is no work stealing between them and no ordering guarantee across
//! workers. Shutdown is cooperative: SIGINT/SIGTERM flips a shared signal
//! that workers poll at iteration boundaries, so in-flight database calls
//! always complete and commit boundaries stay owned by the transaction
//! layer. Loop counters are read only after every worker task has joined.

pub mod context;
pub mod scheduler;
pub mod score;
pub mod signal;

pub use context::{BenchOpts, Vault, WorkerCtx};
pub use scheduler::{Benchmark, BenchHook, Scenario, WorkerFn, WorkerHook};
pub use score::{format_sig4, Score, ScoreBoard};
pub use signal::{install_signal_handler, Shutdown};
