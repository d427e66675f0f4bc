// src/main.rs - Queue host running against the simulated printer
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use printq::config::{self, Config};
use printq::{spawn_evaluator, QueueOrchestrator, SimulatedPrinter};

/// Print queue host
#[derive(Parser, Debug)]
#[command(name = "printq-host", about = "Runs a repeatable print queue against a simulated printer.")]
struct Cli {
    /// Path to a TOML config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start the queue once the configured jobs are added
    #[arg(long)]
    auto_start: bool,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    tracing::info!("Starting printq host");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            config::load_config(path).map_err(|e| {
                tracing::error!("Failed to load config from '{}': {}", path.display(), e);
                Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
            })?
        }
        None => Config::default(),
    };
    config.orchestrator.auto_start |= cli.auto_start;

    tracing::info!(
        "Printer: {}",
        config.printer.printer_name.as_deref().unwrap_or("Unknown")
    );

    let printer = Arc::new(SimulatedPrinter::new(config.simulator.clone()));
    let orchestrator = QueueOrchestrator::new(
        printer.clone(),
        config.verbosity,
        config.orchestrator.announcement_buffer,
    );
    let (queue, evaluator) = spawn_evaluator(orchestrator, config.orchestrator.request_buffer);

    for job in &config.jobs {
        match queue.add_job(job.file.as_str(), job.count).await {
            Ok(id) => tracing::info!("Queued {} x{} (entry {})", job.file, job.count, id),
            Err(e) => tracing::warn!("Could not queue {}: {}", job.file, e),
        }
    }

    if config.orchestrator.auto_start {
        if let Err(e) = queue.start_queue().await {
            tracing::warn!("{}", e);
        }
    }

    let mut poll = tokio::time::interval(Duration::from_millis(500));
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            _ = poll.tick() => {
                let snapshot = queue.snapshot().await?;
                if snapshot.is_drained() {
                    tracing::info!("Queue drained after {} jobs", printer.jobs_started());
                    break;
                }
            }
        }
    }

    queue.shutdown().await?;
    evaluator.await?;
    Ok(())
}
