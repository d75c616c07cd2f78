//! Worker scheduler
//!
//! `run` drives a [`Scenario`] through its lifecycle: `init` once, N worker
//! contexts built and `worker_init`ed, R repeats of `run_once`, then
//! `worker_finish` per worker and `finish` once. Each repeat fans the
//! iteration budget out across parallel worker tasks and aggregates a
//! [`Score`] after every task has joined (so counter reads happen-after
//! counter writes).
//!
//! A worker's loop ends when: its planned loops are done (loop budget), its
//! wall clock reaches the duration budget, the shutdown signal fires, or
//! the worker function returns 0 (drain). Worker-function errors marked
//! transient are counted as loop misses and the loop carries on; anything
//! else stops the whole run with context.

use crate::context::{BenchOpts, Vault, WorkerCtx};
use crate::score::{Score, ScoreBoard};
use crate::signal::Shutdown;
use dbmark_core::{Error, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// The per-iteration worker function: returns how many loops this call
/// performed; 0 signals drain.
pub type WorkerFn =
    Arc<dyn for<'a> Fn(&'a mut WorkerCtx) -> BoxFuture<'a, Result<u64>> + Send + Sync>;

/// Per-worker lifecycle hook
pub type WorkerHook =
    Arc<dyn for<'a> Fn(&'a mut WorkerCtx) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Benchmark-wide lifecycle hook
pub type BenchHook =
    Arc<dyn for<'a> Fn(&'a Benchmark) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// A named workload bound into the scheduler
#[derive(Clone)]
pub struct Scenario {
    /// Scenario name (CLI-visible)
    pub name: String,
    /// Score unit label, e.g. `rows/sec`
    pub metric: String,
    /// One-time shared setup (schema creation, seed rows)
    pub init: Option<BenchHook>,
    /// Per-worker setup (gateway acquisition)
    pub worker_init: Option<WorkerHook>,
    /// The measured inner loop
    pub worker_fn: WorkerFn,
    /// Per-worker teardown (gateway release)
    pub worker_finish: Option<WorkerHook>,
    /// One-time shared teardown
    pub finish: Option<BenchHook>,
}

impl Scenario {
    /// Scenario with only a worker function and defaults everywhere else
    pub fn from_fn(name: impl Into<String>, worker_fn: WorkerFn) -> Self {
        Scenario {
            name: name.into(),
            metric: "loops/sec".to_string(),
            init: None,
            worker_init: None,
            worker_fn,
            worker_finish: None,
            finish: None,
        }
    }
}

/// Process-wide benchmark context
pub struct Benchmark {
    /// Run parameters
    pub opts: BenchOpts,
    /// Scenario-shared state
    pub vault: Arc<Vault>,
    /// Shared shutdown signal
    pub shutdown: Arc<Shutdown>,
    workers: Vec<Option<WorkerCtx>>,
    board: ScoreBoard,
}

impl Benchmark {
    /// Context for the given options; workers are built lazily by [`run`]
    ///
    /// [`run`]: Benchmark::run
    pub fn new(opts: BenchOpts) -> Self {
        let shutdown = Shutdown::new();
        Benchmark {
            opts,
            vault: Arc::new(Vault::default()),
            shutdown,
            workers: Vec::new(),
            board: ScoreBoard::new(),
        }
    }

    /// Scores recorded so far
    pub fn board(&self) -> &ScoreBoard {
        &self.board
    }

    /// Total executed loops across all workers' lifetimes
    pub fn executed_loops(&self) -> u64 {
        self.workers
            .iter()
            .flatten()
            .map(|w| w.executed_loops)
            .sum()
    }

    /// Drive a scenario through its full lifecycle.
    ///
    /// Returns the score board; on early shutdown the board holds the
    /// repeats that completed.
    pub async fn run(&mut self, scenario: &Scenario) -> Result<&ScoreBoard> {
        info!(scenario = %scenario.name, workers = self.opts.workers, "starting");
        if let Some(init) = &scenario.init {
            init(self).await?;
        }

        self.workers = (0..self.opts.workers.max(1))
            .map(|i| {
                Some(WorkerCtx::new(
                    i,
                    &self.opts,
                    self.shutdown.clone(),
                    self.vault.clone(),
                ))
            })
            .collect();
        if let Some(worker_init) = &scenario.worker_init {
            for slot in &mut self.workers {
                let ctx = slot.as_mut().expect("worker present before first run");
                worker_init(ctx).await?;
            }
        }

        let repeats = self.opts.repeats.max(1);
        let run_result = self.run_repeats(scenario, repeats).await;

        // Teardown runs even after an error or early shutdown so gateways
        // always return to the pool.
        if let Some(worker_finish) = &scenario.worker_finish {
            for slot in &mut self.workers {
                if let Some(ctx) = slot.as_mut() {
                    if let Err(e) = worker_finish(ctx).await {
                        warn!(worker = ctx.index, error = %e, "worker_finish failed");
                    }
                }
            }
        }
        if let Some(finish) = &scenario.finish {
            finish(self).await?;
        }
        run_result?;

        if let Some(summary) = self.board.summary() {
            info!(scenario = %scenario.name, %summary, "finished");
        }
        Ok(&self.board)
    }

    async fn run_repeats(&mut self, scenario: &Scenario, repeats: u32) -> Result<()> {
        for repeat in 0..repeats {
            if self.shutdown.is_triggered() {
                break;
            }
            let score = self.run_once(scenario).await?;
            info!(scenario = %scenario.name, repeat, %score, "repeat done");
            self.board.push(score);
        }
        Ok(())
    }

    /// One repeat: fan out, wait for every worker, compute the score
    pub async fn run_once(&mut self, scenario: &Scenario) -> Result<Score> {
        let opts = self.opts.clone();
        let start = Instant::now();
        let mut tasks: JoinSet<(WorkerCtx, u64, Option<Error>)> = JoinSet::new();

        for i in 0..self.workers.len() {
            let mut ctx = self.workers[i]
                .take()
                .expect("worker context present at repeat start");
            ctx.planned_loops = opts.planned_loops(i);
            let worker_fn = scenario.worker_fn.clone();
            let duration = (opts.loops == 0).then_some(opts.duration).flatten();
            let sleep = opts.sleep;
            tasks.spawn(async move {
                let outcome = worker_loop(&mut ctx, worker_fn, duration, sleep).await;
                let (done, err) = outcome;
                ctx.executed_loops += done;
                (ctx, done, err)
            });
        }

        let mut total: u64 = 0;
        let mut first_err: Option<Error> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((ctx, done, err)) => {
                    total += done;
                    let index = ctx.index;
                    self.workers[index] = Some(ctx);
                    if let Some(e) = err {
                        first_err.get_or_insert(e);
                    }
                }
                Err(join_err) if join_err.is_panic() => {
                    std::panic::resume_unwind(join_err.into_panic())
                }
                Err(join_err) => {
                    first_err.get_or_insert(Error::TransientQuery(join_err.to_string()));
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        let seconds = start.elapsed().as_secs_f64();
        let metric = if scenario.metric.is_empty() {
            opts.metric.clone()
        } else {
            scenario.metric.clone()
        };
        Ok(Score::new(self.workers.len(), seconds, total, metric))
    }
}

/// The sequential per-worker loop. Returns loops done this repeat and the
/// error that stopped the run, if any.
async fn worker_loop(
    ctx: &mut WorkerCtx,
    worker_fn: WorkerFn,
    duration: Option<Duration>,
    sleep: Duration,
) -> (u64, Option<Error>) {
    let worker_start = Instant::now();
    let mut done: u64 = 0;
    loop {
        if ctx.shutdown.is_triggered() {
            break;
        }
        if ctx.planned_loops > 0 && done >= ctx.planned_loops {
            break;
        }
        if ctx.planned_loops == 0 {
            if let Some(d) = duration {
                if worker_start.elapsed() >= d {
                    break;
                }
            }
        }
        match worker_fn(ctx).await {
            Ok(0) => break,
            Ok(n) => done += n,
            Err(e) if e.is_transient() => {
                // A read-side I/O failure costs the iteration, nothing more.
                warn!(worker = ctx.index, error = %e, "iteration missed");
            }
            Err(e) => {
                error!(worker = ctx.index, error = %e, "worker failed; stopping run");
                ctx.shutdown.trigger();
                return (done, Some(e));
            }
        }
        if sleep > Duration::ZERO {
            tokio::time::sleep(sleep).await;
        }
    }
    (done, None)
}
