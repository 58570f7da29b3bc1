//! CLI argument parsing and command dispatch

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use llm_bench_core::{
    aggregate_metrics, load_config, AggregatedMetrics, GpuMonitorResult, RequestMetrics,
    RequestRecord,
};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "llm-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reduce and aggregate recorded request timings
    Aggregate {
        /// Path to a run file (JSON array of batches)
        #[arg(short, long)]
        input: PathBuf,
        /// Write the summaries here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// One (backend, concurrency) batch as recorded by the load generator
#[derive(Debug, Deserialize)]
pub struct RunBatch {
    /// Wall-clock duration of the batch
    #[serde(default)]
    pub wall_clock_s: Option<f64>,
    /// GPU summary co-incident with the batch
    #[serde(default)]
    pub gpu: Option<GpuMonitorResult>,
    /// Raw request records
    pub requests: Vec<RequestRecord>,
}

impl RunBatch {
    /// Reduce every request and aggregate the batch
    pub fn summarize(self) -> Result<AggregatedMetrics> {
        let wall_clock = match self.wall_clock_s {
            Some(secs) => Some(
                Duration::try_from_secs_f64(secs)
                    .with_context(|| format!("invalid wall_clock_s: {secs}"))?,
            ),
            None => None,
        };

        let metrics: Vec<RequestMetrics> = self
            .requests
            .into_iter()
            .map(RequestRecord::finish)
            .collect();

        Ok(aggregate_metrics(&metrics, wall_clock, self.gpu.as_ref())?)
    }
}

/// Dispatch the parsed command
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Aggregate { input, output } => aggregate(&input, output.as_deref()),
        Commands::Validate { config } => validate(&config),
    }
}

fn aggregate(input: &Path, output: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read run file {}", input.display()))?;
    let batches: Vec<RunBatch> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse run file {}", input.display()))?;

    tracing::info!(batches = batches.len(), "aggregating run");

    let summaries = batches
        .into_iter()
        .enumerate()
        .map(|(i, batch)| {
            batch
                .summarize()
                .with_context(|| format!("batch {i} could not be aggregated"))
        })
        .collect::<Result<Vec<_>>>()?;

    for s in &summaries {
        tracing::info!(
            backend = %s.backend,
            concurrency = s.concurrency,
            requests = s.num_requests,
            errors = s.error_count,
            ttft_p50_s = s.ttft.p50,
            throughput_tok_per_s = s.throughput_tok_per_s,
            "batch summary"
        );
    }

    let json = serde_json::to_string_pretty(&summaries)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }

    Ok(())
}

fn validate(path: &Path) -> Result<()> {
    let config = load_config(path)
        .with_context(|| format!("invalid configuration {}", path.display()))?;

    tracing::info!(
        model = %config.model.name,
        backend = %config.backend.name,
        concurrency_levels = ?config.load.concurrency_levels,
        num_requests = config.load.num_requests,
        "configuration is valid"
    );

    Ok(())
}
