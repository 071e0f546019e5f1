//! Denominator simulator CLI
//!
//! Runs one deterministic simulation and reports what the node did.

use clap::Parser;
use denominator_core::duration::parse_duration;
use denominator_core::DenominatorConfig;
use denominator_sim::{RunReport, SimConfig, SimError, SimWorld};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Denominator deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "denominator-sim")]
#[command(about = "Run a deterministic simulation of the denominator actor", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of zones (one registry each)
    #[arg(short, long, default_value = "3")]
    zones: usize,

    /// Number of downstream services
    #[arg(short = 'S', long, default_value = "6")]
    services: usize,

    /// Chat rate sent to the node (1ms..1h)
    #[arg(short, long, default_value = "10ms")]
    chat_rate: String,

    /// Virtual run time
    #[arg(short, long, default_value = "10s")]
    duration: String,

    /// Time each service takes to answer
    #[arg(long, default_value = "2ms")]
    service_time: String,

    /// Node configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the run report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("✗ simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), SimError> {
    let node = match &args.config {
        Some(path) => DenominatorConfig::from_file(path)?,
        None => DenominatorConfig::default(),
    };

    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let config = SimConfig {
        seed,
        zones: args.zones,
        services: args.services,
        chat_rate: args.chat_rate.clone(),
        duration: parse_duration(&args.duration)?,
        service_time: parse_duration(&args.service_time)?,
        node,
    };

    if !args.json {
        info!("Denominator simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Paused clock: virtual time jumps straight to the next timer
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()?;
    let report = runtime.block_on(async move { SimWorld::new(config).run().await })?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        log_summary(&report);
    }

    if let Some(path) = &args.report {
        report.write_to_file(path)?;
        info!("Report written to {}", path.display());
    }

    if !report.clean_shutdown {
        return Err(SimError::UnexpectedNotice(
            "completion notice did not name the node".to_string(),
        ));
    }
    Ok(())
}

fn log_summary(report: &RunReport) {
    info!(
        "✓ {} (seed={}) ran {:.1}s chatting every {}",
        report.node, report.seed, report.duration_sec, report.chat_rate
    );
    info!(
        "  requests: {} sent, {} served, {} distinct keys",
        report.keys_requested,
        report.requests_served(),
        report.distinct_keys
    );
    info!("  lookups: {} received by registries", report.lookups_received());
    for service in &report.services {
        info!("  {} ({}): {} requests", service.name, service.zone, service.requests);
    }
    for hist in &report.histograms {
        info!(
            "  {:<10} n={:<6} p50={:.0}us p99={:.0}us max={:.0}us",
            hist.label, hist.count, hist.p50_us, hist.p99_us, hist.max_us
        );
    }
}
