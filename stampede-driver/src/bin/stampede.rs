//! Stampede benchmark CLI.
//!
//! Drives a configured workload against a registered backend family and
//! prints the combined report. Only the in-process memory backend ships in
//! this binary; real backend families link the driver library and register
//! their own factories.
//!
//! ```bash
//! stampede --workload write --requests 100000 --clients 64
//! stampede --workload write --requests 150000 --stage-clients 100,300,700
//! stampede --workload read --requests 50000 --rate-limit 20000 --output report.json
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use stampede_core::{CombinedReport, Workload};
use stampede_driver::backend::{BackendId, BackendRegistry, NoPeers};
use stampede_driver::memory::MemoryBackend;
use stampede_driver::options::BenchmarkOptions;
use stampede_driver::runner::run_benchmark;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Database load-testing harness.
#[derive(Parser, Debug)]
#[command(name = "stampede", version, about)]
struct Cli {
    /// Backend family to drive.
    #[arg(long, default_value = "memory")]
    backend: BackendId,

    /// Comma-separated backend endpoints.
    #[arg(long, value_delimiter = ',')]
    endpoints: Vec<String>,

    /// Workload type: write, read, or read-oneshot.
    #[arg(long, default_value = "write")]
    workload: Workload,

    /// Total number of requests across all stages.
    #[arg(long, default_value_t = 10_000)]
    requests: i64,

    /// Concurrent clients when no stage sequence is given.
    #[arg(long, default_value_t = 8)]
    clients: i64,

    /// Backend connections when no stage sequence is given.
    #[arg(long, default_value_t = 8)]
    connections: i64,

    /// Comma-separated client counts, one stage per entry.
    #[arg(long, value_delimiter = ',')]
    stage_clients: Vec<i64>,

    /// Key size in bytes.
    #[arg(long, default_value_t = 8)]
    key_size: usize,

    /// Value size in bytes.
    #[arg(long, default_value_t = 256)]
    value_size: usize,

    /// Write the same key on every request.
    #[arg(long)]
    same_key: bool,

    /// Allow stale reads.
    #[arg(long)]
    stale_read: bool,

    /// Target request rate in requests/second (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    rate_limit: u64,

    /// Per-call artificial latency of the memory backend, in microseconds.
    #[arg(long, default_value_t = 0)]
    simulated_latency_us: u64,

    /// Write the combined report as JSON to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: Level,
}

impl Cli {
    fn options(&self) -> BenchmarkOptions {
        BenchmarkOptions {
            backend: self.backend,
            database_endpoints: self.endpoints.clone(),
            workload: self.workload,
            request_number: self.requests,
            client_number: self.clients,
            connection_number: self.connections,
            connection_client_numbers: self.stage_clients.clone(),
            key_size: self.key_size,
            value_size: self.value_size,
            same_key: self.same_key,
            stale_read: self.stale_read,
            rate_limit: self.rate_limit,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let mut registry = BackendRegistry::new();
    let memory = MemoryBackend::new()
        .with_latency(Duration::from_micros(cli.simulated_latency_us));
    registry.register(BackendId::Memory, std::sync::Arc::new(memory));

    let opts = cli.options();
    let report = run_benchmark(&opts, &registry, &NoPeers).await?;

    print_report(&report);

    if let Some(path) = &cli.output {
        let json = serde_json::to_vec_pretty(&report).context("failed to encode report")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "report written");
    }

    Ok(())
}

fn print_report(report: &CombinedReport) {
    println!();
    println!("Summary:");
    println!("  Requests: {}", report.lats.len());
    println!("  Total:    {:.4} secs", report.total.as_secs_f64());
    println!("  Slowest:  {:.4} secs", report.slowest);
    println!("  Fastest:  {:.4} secs", report.fastest);
    println!("  Average:  {:.4} secs", report.average);
    println!("  Stddev:   {:.4} secs", report.stddev);
    println!("  RPS:      {:.2}", report.rps);

    let percentiles = report.percentiles();
    if !percentiles.is_empty() {
        println!();
        println!("Latency distribution:");
        for (p, lat) in percentiles {
            println!("  {p:>6}% in {lat:.4} secs");
        }
    }

    if !report.error_dist.is_empty() {
        println!();
        println!("Error distribution:");
        let mut errors: Vec<_> = report.error_dist.iter().collect();
        errors.sort_by(|a, b| b.1.cmp(a.1));
        for (err, count) in errors {
            println!("  [{count}] {err}");
        }
    }
}
