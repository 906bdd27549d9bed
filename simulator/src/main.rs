//! TokenSwap Simulator
//!
//! Deploys two tokens and drives escrow swaps between their holders.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenswap_escrow::{FundingMode, MetricsSnapshot};

mod controller;
mod metrics;
mod party;
mod scenario;

use controller::SimulationController;
use metrics::SimulationMetrics;
use scenario::{Scenario, CONTENTION};

/// TokenSwap Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "TokenSwap escrow simulation environment")]
struct Args {
    /// Scenario to run: token-swap, cancel-refund or contention
    #[arg(short, long, default_value = "token-swap")]
    scenario: String,

    /// Number of concurrent swaps in the contention scenario
    #[arg(long, default_value = "16")]
    swaps: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// How deposits reach custody: transfer or allowance
    #[arg(long, default_value = "transfer")]
    funding_mode: FundingMode,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Write a JSON report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Report {
    scenario: String,
    funding_mode: FundingMode,
    seed: Option<u64>,
    finished_at: DateTime<Utc>,
    simulation: SimulationMetrics,
    escrow: MetricsSnapshot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting TokenSwap Simulator");
    info!("Funding mode: {}", args.funding_mode);

    let controller = SimulationController::new(args.funding_mode, args.seed)?;

    if args.scenario == CONTENTION {
        controller.run_contention(args.swaps).await?;
    } else {
        let scenario = Scenario::load(&args.scenario)?;
        controller.run_scenario(scenario).await?;
    }

    // Print metrics
    let metrics = controller.metrics().await;
    info!("Simulation complete");
    info!("Total swaps: {}", metrics.total_swaps);
    info!("Executed: {}", metrics.executed_swaps);
    info!("Cancelled: {}", metrics.cancelled_swaps);
    info!("Rejected calls: {}", metrics.rejected_calls);
    info!("Completion rate: {:.1}%", metrics.completion_rate() * 100.0);
    info!("Average latency: {}us", metrics.average_latency_us());
    info!("P99 latency: {}us", metrics.p99_latency_us());

    if let Some(path) = &args.report {
        let report = Report {
            scenario: args.scenario.clone(),
            funding_mode: args.funding_mode,
            seed: args.seed,
            finished_at: Utc::now(),
            simulation: metrics,
            escrow: controller.book().metrics().snapshot(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}
