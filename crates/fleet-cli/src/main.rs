use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use fleet_core::domain::{FleetConfig, FleetConfigPatch, FleetResult, Outcome};
use fleet_core::ports::ExecutionContext;
use fleet_core::typed::{Handler, TaskKind, TypedRegistry};
use fleet_core::{FleetDispatcher, Task};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fleet", about = "Run batches on a bounded fleet of ephemeral workers")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit one simulated batch and print its outcome
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a TOML fleet config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of tasks in the batch
    #[arg(short, long, default_value_t = 10)]
    tasks: u64,

    /// Max concurrent workers (overrides config)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Retry budget per task (overrides config)
    #[arg(long)]
    max_retries: Option<u32>,

    /// Disable retries
    #[arg(long)]
    no_retry: bool,

    /// Every k-th task always fails
    #[arg(long)]
    fail_every: Option<u64>,

    /// Every k-th task fails on its first attempt only
    #[arg(long)]
    flaky_every: Option<u64>,

    /// Upper bound of the simulated per-task latency
    #[arg(long, default_value_t = 50)]
    latency_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SimulatedJob {
    index: u64,
}

impl TaskKind for SimulatedJob {
    const TYPE: &'static str = "fleet.demo.simulated_job.v1";
}

struct SimulatedHandler {
    fail_every: Option<u64>,
    flaky_every: Option<u64>,
    latency_ms: u64,
    /// Flaky jobs that already failed once.
    tripped: Mutex<HashSet<u64>>,
}

impl SimulatedHandler {
    fn hits(every: Option<u64>, index: u64) -> bool {
        every.is_some_and(|k| k > 0 && index % k == 0)
    }
}

#[async_trait]
impl Handler<SimulatedJob> for SimulatedHandler {
    async fn handle(&self, job: SimulatedJob, ctx: &ExecutionContext) -> FleetResult<Outcome> {
        let latency = rand::thread_rng().gen_range(0..=self.latency_ms);
        sleep(Duration::from_millis(latency)).await;

        if Self::hits(self.fail_every, job.index) {
            return Ok(Outcome::failure(format!("job {} always fails", job.index)));
        }
        if Self::hits(self.flaky_every, job.index) {
            let first_try = self
                .tripped
                .lock()
                .map(|mut tripped| tripped.insert(job.index))
                .unwrap_or(false);
            if first_try {
                return Ok(Outcome::failure(format!("job {} flaked", job.index)));
            }
        }

        Ok(Outcome::success_with(serde_json::json!({
            "index": job.index,
            "worker_id": ctx.worker_id.to_string(),
            "latency_ms": latency,
        })))
    }
}

async fn load_config(args: &RunArgs) -> anyhow::Result<FleetConfig> {
    let base = match &args.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
            })?;
            FleetConfig::from_toml_str(&raw)?
        }
        None => FleetConfig::default(),
    };
    let patch = FleetConfigPatch {
        max_concurrent_workers: args.workers,
        max_retries: args.max_retries,
        retry_failed_tasks: args.no_retry.then_some(false),
        ..FleetConfigPatch::default()
    };
    Ok(base.merged(&patch)?)
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args).await?;
    info!(?config, tasks = args.tasks, "Starting fleet");

    let mut registry = TypedRegistry::new();
    registry.register::<SimulatedJob, _>(SimulatedHandler {
        fail_every: args.fail_every,
        flaky_every: args.flaky_every,
        latency_ms: args.latency_ms,
        tripped: Mutex::new(HashSet::new()),
    })?;

    let fleet = FleetDispatcher::builder()
        .config(config)
        .registry(registry)
        .build()?;

    let tasks = (1..=args.tasks)
        .map(|index| SimulatedJob { index }.into_task())
        .collect::<FleetResult<Vec<Task>>>()?;

    let batch_id = fleet.submit_batch(tasks).await;
    info!(%batch_id, "Batch submitted");

    let status = fleet.wait_for_batch(batch_id).await?;
    let results = fleet.get_batch_results(batch_id).await?;
    let stats = fleet.get_stats().await;

    let report = serde_json::json!({
        "status": status,
        "stats": stats,
        "results": results,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Commands::Run(args) => run(args).await,
    }
}
