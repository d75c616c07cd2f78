//! dbmark: synthetic-workload benchmarking for SQL and search backends
//!
//! The binary wires the pieces together: CLI parsing, logging, the signal
//! handler, the scenario catalog, and the scheduler. Every error surfaces
//! through one exit path with code 127.

mod scenarios;

use clap::{ArgAction, Args, Parser, Subcommand};
use dbmark_bench::{install_signal_handler, BenchOpts, Benchmark};
use dbmark_core::{Error, Result};
use dbmark_dal::config::CONNECTION_STRING_ENV;
use dbmark_dal::{leak, pool, ConnConfig, Database};
use scenarios::RunCfg;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dbmark",
    version,
    about = "Benchmark storage backends under synthetic workloads"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scenario against the target backend
    Run(RunArgs),
    /// Print the scenario catalog
    List,
    /// Drop every table the catalog may have created
    Cleanup(CleanupArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Connection string; falls back to ACRONIS_DB_BENCH_CONNECTION_STRING
    #[arg(long = "connection-string", short = 'c')]
    connection_string: Option<String>,

    /// Scenario name (see `dbmark list`)
    #[arg(long, short = 't')]
    test: String,

    /// Parallel workers
    #[arg(long, short = 'w', default_value_t = 1)]
    workers: usize,

    /// Total iteration budget across workers; 0 selects duration mode
    #[arg(long, short = 'l', default_value_t = 0)]
    loops: u64,

    /// Wall-clock budget in seconds (duration mode)
    #[arg(long, short = 'd')]
    duration: Option<u64>,

    /// Repeat the run this many times and aggregate
    #[arg(long, short = 'r', default_value_t = 1)]
    repeats: u32,

    /// Sleep between iterations, milliseconds
    #[arg(long, default_value_t = 0)]
    sleep: u64,

    /// Random seed (reproducible per worker)
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Rows per bulk-insert call
    #[arg(long, default_value_t = 100)]
    chunk: usize,

    /// Rows seeded before read/update scenarios
    #[arg(long = "seed-rows", default_value_t = 1000)]
    seed_rows: u64,

    /// Use TRUNCATE instead of DROP at teardown
    #[arg(long = "use-truncate")]
    use_truncate: bool,

    /// Prefix reads with the dialect's EXPLAIN
    #[arg(long)]
    explain: bool,
}

#[derive(Args, Debug)]
struct CleanupArgs {
    /// Connection string; falls back to ACRONIS_DB_BENCH_CONNECTION_STRING
    #[arg(long = "connection-string", short = 'c')]
    connection_string: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        // Malformed CLI goes through the same exit path as every other
        // surfaced error.
        let _ = e.print();
        std::process::exit(127);
    });
    init_logging(cli.verbose);
    if let Err(e) = dispatch(cli).await {
        eprintln!("dbmark: {e}");
        std::process::exit(e.exit_code());
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::List => list(),
        Command::Cleanup(args) => cleanup(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let conn = ConnConfig::from_option(args.connection_string.clone(), 0)?.url;
    let cfg = Arc::new(RunCfg {
        conn,
        chunk: args.chunk,
        seed_rows: args.seed_rows,
        use_truncate: args.use_truncate,
        explain: args.explain,
        seed: args.seed,
    });
    let scenario = scenarios::find(&cfg, &args.test)?;

    let duration = match (args.loops, args.duration) {
        (0, Some(secs)) => Some(Duration::from_secs(secs.max(1))),
        (0, None) => Some(Duration::from_secs(10)),
        _ => None,
    };
    let opts = BenchOpts {
        workers: args.workers.max(1),
        loops: args.loops,
        duration,
        repeats: args.repeats.max(1),
        sleep: Duration::from_millis(args.sleep),
        seed: args.seed,
        metric: scenario.metric.clone(),
    };

    let mut bench = Benchmark::new(opts);
    let signal_task = install_signal_handler(bench.shutdown.clone());
    let probe = leak::spawn_probe(Duration::from_secs(5));

    let outcome = bench.run(&scenario).await;

    // Teardown mirrors the pre-exit path: stop auxiliary tasks, then drop
    // every pooled gateway.
    probe.abort();
    signal_task.abort();
    pool::drain();

    let board = outcome?;
    for score in board.scores() {
        println!("{score}");
    }
    if let Some(summary) = board.summary() {
        println!("{summary}");
    }
    Ok(())
}

fn list() -> Result<()> {
    let cfg = Arc::new(RunCfg {
        conn: String::new(),
        chunk: 100,
        seed_rows: 0,
        use_truncate: false,
        explain: false,
        seed: 1,
    });
    println!("available tests:");
    for scenario in scenarios::catalog(&cfg) {
        println!("  {:<20} [{}]", scenario.name, scenario.metric);
    }
    println!();
    println!("connection string env fallback: {CONNECTION_STRING_ENV}");
    Ok(())
}

async fn cleanup(args: CleanupArgs) -> Result<()> {
    let conn = ConnConfig::from_option(args.connection_string.clone(), 0)?.url;
    let cfg = RunCfg {
        conn,
        chunk: 100,
        seed_rows: 0,
        use_truncate: false,
        explain: false,
        seed: 1,
    };
    let db = scenarios::admin_gateway(&cfg).await?;
    let mut outcome = Ok(());
    for table in scenarios::all_tables() {
        match db.drop_table(table, false).await {
            Ok(()) => println!("dropped {table}"),
            Err(Error::Migration(m)) => {
                tracing::warn!(table, error = %m, "drop failed");
            }
            Err(e) => {
                outcome = Err(e);
                break;
            }
        }
    }
    scenarios::release_admin(&cfg, db)?;
    pool::drain();
    outcome
}
