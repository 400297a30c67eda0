//! Deployment DST Simulator CLI
//!
//! Run the coordinator against a simulated cluster, either through the
//! built-in fault scenarios or a topology document.

use anyhow::{bail, Context};
use clap::Parser;
use deploy_core::{CoordinatorSettings, DeploymentDocument};
use deploy_env::NodeId;
use deploy_sim::scenarios::ScenarioId;
use deploy_sim::{ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Deployment coordinator simulation CLI
#[derive(Parser, Debug)]
#[command(name = "deploy-sim")]
#[command(about = "Run deterministic deployment simulations", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (baseline, staggered_join, node_dropout, partition, ..., all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Topology document to run instead of the built-in scenarios
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Client nodes in the built-in topology
    #[arg(long, default_value = "4")]
    clients: u32,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Maximum simulated duration in seconds
    #[arg(short, long, default_value = "60")]
    duration: f64,

    /// Node the coordinator runs on
    #[arg(long, default_value = "0")]
    coordinator_node: u32,

    /// Port clients connect to on their server
    #[arg(long, default_value = "7979")]
    server_port: u16,

    /// Scheduler tick interval in milliseconds
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Start the timeline without waiting for every node
    #[arg(long)]
    no_wait: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

impl Args {
    fn settings(&self) -> CoordinatorSettings {
        CoordinatorSettings::default()
            .with_coordinator_node(NodeId(self.coordinator_node))
            .with_server_port(self.server_port)
            .with_tick_interval(Duration::from_millis(self.tick_ms.max(1)))
            .with_wait_for_all_nodes(!self.no_wait)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    if !args.json {
        info!("Deployment DST Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let document = match &args.config {
        Some(path) => Some(
            DeploymentDocument::from_path(path)
                .with_context(|| format!("Failed to load topology {}", path.display()))?,
        ),
        None => None,
    };

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse()?]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .context("System clock before epoch")?
            .as_nanos() as u64
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed)
            .with_clients(args.clients)
            .with_settings(args.settings())
            .with_duration(args.duration);

        let results = match (&document, &args.config) {
            (Some(doc), Some(path)) => {
                vec![runner.run_document(&path.display().to_string(), doc).await]
            }
            _ => {
                let mut results = Vec::with_capacity(scenarios.len());
                for scenario in &scenarios {
                    results.push(runner.run(*scenario).await);
                }
                results
            }
        };

        for result in results {
            if !args.json {
                report(&result);
            }
            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": all_results,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} runs passed!", total);
        } else {
            error!("❌ {}/{} runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario,
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if failed_count > 0 {
        bail!("{} of {} runs failed", failed_count, total);
    }
    Ok(())
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED in {} ticks ({:.1}s simulated)",
            result.scenario, result.seed, result.total_ticks, result.final_time_secs
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario,
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
    info!(
        "    checked in={} commands={} actions={} undeliverable={} dropped={} warnings={}",
        result.metrics.nodes_checked_in,
        result.metrics.commands_sent,
        result.metrics.actions_dispatched,
        result.metrics.undeliverable,
        result.metrics.envelopes_dropped,
        result.metrics.load_warnings
    );
}
