mod metrics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::Lazy;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subjectify_core::table::DEFAULT_BATCH_SIZE;
use subjectify_core::{
    join_tables, load_config, read_table, split_table, validate_config, write_table,
    BatchOrchestrator, CandidateResolver, ClassifyClient, Config, LookupClient,
};

#[derive(Parser)]
#[command(name = "subjectify")]
#[command(about = "Resolve DDC and LCC classifications for catalog records")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(long, short = 'c', global = true, env = "SUBJECTIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up every record of a table and write it back with results.
    Resolve {
        /// Input table.
        input: PathBuf,

        /// Output table.
        output: PathBuf,

        /// Resume journal; finished records in it are not looked up again.
        #[arg(long)]
        journal: Option<PathBuf>,

        /// Number of records processed concurrently.
        #[arg(long, short = 'w')]
        workers: Option<usize>,

        /// Write Prometheus metrics to this file when the run ends.
        #[arg(long, value_name = "FILE")]
        metrics_out: Option<PathBuf>,
    },

    /// Split a table into numbered batch files.
    Split {
        /// Input table.
        input: PathBuf,

        /// Maximum data rows per batch file.
        #[arg(long, short = 'n', default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Directory for batch files. Defaults to the input's directory.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Concatenate tables, keeping the first header row.
    Join {
        /// Output table.
        output: PathBuf,

        /// Tables to join, in order.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {:?}", path),
        None => "Failed to load config".to_string(),
    })?;

    match cli.command {
        Command::Resolve {
            input,
            output,
            journal,
            workers,
            metrics_out,
        } => {
            let mut config = config;
            if let Some(workers) = workers {
                config.batch.workers = workers;
            }
            if journal.is_some() {
                config.batch.journal_path = journal;
            }
            validate_config(&config).context("Configuration validation failed")?;

            resolve(config, &input, &output, metrics_out.as_deref()).await
        }
        Command::Split {
            input,
            batch_size,
            out_dir,
        } => {
            validate_config(&config).context("Configuration validation failed")?;
            let files = split_table(&input, out_dir.as_deref(), batch_size, &config.table)
                .with_context(|| format!("Failed to split {:?}", input))?;
            info!("Wrote {} batch files", files.len());
            for file in files {
                println!("{}", file.display());
            }
            Ok(())
        }
        Command::Join { output, inputs } => {
            validate_config(&config).context("Configuration validation failed")?;
            let rows = join_tables(&inputs, &output, &config.table)
                .with_context(|| format!("Failed to join into {:?}", output))?;
            info!("Joined {} files ({} rows) into {:?}", inputs.len(), rows, output);
            Ok(())
        }
    }
}

async fn resolve(
    config: Config,
    input: &Path,
    output: &Path,
    metrics_out: Option<&Path>,
) -> Result<()> {
    // Register metrics before any are recorded
    Lazy::force(&metrics::REGISTRY);

    let table = read_table(input, &config.table)
        .with_context(|| format!("Failed to read {:?}", input))?;
    info!("Read {} records from {:?}", table.records.len(), input);

    let service = ClassifyClient::new(config.service.clone())
        .context("Failed to create classification client")?;
    info!("Using classification service at {}", config.service.base_url);

    let client = Arc::new(LookupClient::new(Arc::new(service), &config.lookup));
    let orchestrator = BatchOrchestrator::new(
        config.batch.clone(),
        client,
        CandidateResolver::new(config.resolver.clone()),
    );

    let cancel = CancellationToken::new();
    let signal_handle = tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let report = orchestrator.run(&table.records, &cancel).await;
    signal_handle.abort();
    let report = report.context("Batch failed")?;

    // Partial results are still written after an interrupt
    write_table(output, &table, &report.resolutions)
        .with_context(|| format!("Failed to write {:?}", output))?;

    let summary = &report.summary;
    info!(
        "Wrote {:?}: {} resolved, {} ambiguous, {} unresolved, {} failed ({} resumed)",
        output,
        summary.resolved,
        summary.ambiguous,
        summary.unresolved,
        summary.failed,
        summary.resumed
    );

    if let Some(path) = metrics_out {
        metrics::write_metrics(path)?;
        info!("Metrics written to {:?}", path);
    }

    if report.cancelled {
        warn!("Run was interrupted; rerun with --journal to resume");
    }

    Ok(())
}

/// Cancel the batch on Ctrl+C or SIGTERM.
async fn cancel_on_interrupt(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Interrupt received, finishing in-flight records");
    cancel.cancel();
}
