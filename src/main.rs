use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_analytics::api::{build_router, state::AppState};
use arena_analytics::config::AppConfig;
use arena_analytics::fetch::{collect_all, ApiClient, Collector};
use arena_analytics::ingest::{self, IngestReport};
use arena_analytics::pipeline::{AnalyticsBundle, Pipeline, RunSummary};
use arena_analytics::report::ReportGenerator;
use arena_analytics::storage::{BackendKind, TableStore};

#[derive(Parser)]
#[command(name = "arena")]
#[command(about = "Battle outcome analytics: collect, aggregate, report and serve")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to ./arena.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Table store backend: sqlite, parquet or memory
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect entities and outcomes from the remote API into the store
    Collect {
        /// Skip writing the raw CSV copies
        #[arg(long)]
        no_csv: bool,
    },

    /// Load raw entities and outcomes from previously exported CSV files
    ImportCsv {
        /// Directory holding the CSV files (defaults to <data_dir>/out)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Derive every analytics table, reusing stored ones
    Analyze {
        /// Recompute tables even if they are already stored
        #[arg(long)]
        force: bool,
    },

    /// Write the HTML report
    Report {
        /// Recompute tables even if they are already stored
        #[arg(long)]
        force: bool,
    },

    /// Start the dashboard API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Collect, analyze and report in one go
    Run {
        /// Recompute tables even if they are already stored
        #[arg(long)]
        force: bool,

        /// Reuse the raw tables already in the store instead of collecting
        #[arg(long)]
        skip_collect: bool,

        /// Start the dashboard once the report is written
        #[arg(long)]
        serve: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(backend) = cli.backend {
        config.store.backend = backend;
    }

    // Initialize tracing
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting arena v{}", env!("CARGO_PKG_VERSION"));

    let store = config.open_store();

    match cli.command {
        Commands::Collect { no_csv } => {
            let report = collect(&config, &store, !no_csv).await?;
            print_ingest(&report);
            write_dataset_reports(&config, &report)?;
        }
        Commands::ImportCsv { dir } => {
            let dir = dir.unwrap_or_else(|| config.storage().out_dir());
            let (entities, outcomes) = ingest::import_csv(&dir)?;
            let report = ingest::store_raw(&store, &entities, outcomes)?;
            print_ingest(&report);
            write_dataset_reports(&config, &report)?;
        }
        Commands::Analyze { force } => {
            analyze(&config, &store, force);
        }
        Commands::Report { force } => {
            let bundle = analyze(&config, &store, force);
            write_report(&config, &bundle)?;
        }
        Commands::Serve { host, port } => {
            let bundle = analyze(&config, &store, false);
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            serve(&config, bundle, &host, port).await?;
        }
        Commands::Run {
            force,
            skip_collect,
            serve: start_server,
        } => {
            if skip_collect {
                tracing::info!("Skipping collection, using stored raw tables");
            } else {
                let report = collect(&config, &store, true).await?;
                print_ingest(&report);
                write_dataset_reports(&config, &report)?;
            }

            let bundle = analyze(&config, &store, force);
            write_report(&config, &bundle)?;

            if start_server {
                let host = config.server.host.clone();
                serve(&config, bundle, &host, config.server.port).await?;
            }
        }
    }

    Ok(())
}

async fn collect(config: &AppConfig, store: &TableStore, export: bool) -> Result<IngestReport> {
    let mut client = ApiClient::new(config.api.clone())?;
    client
        .login()
        .await
        .context("Authentication against the source API failed")?;

    match client.health().await {
        Ok(status) => tracing::info!("API health: {}", status),
        Err(e) => tracing::warn!("API health check failed: {}", e),
    }

    let started = Instant::now();
    let collected = collect_all(&client, &Collector::from(&config.api)).await;
    tracing::info!(
        "Collection finished in {:.1}s",
        started.elapsed().as_secs_f64()
    );

    if export {
        ingest::export_csv(&config.storage().out_dir(), &collected)?;
    }

    Ok(ingest::store_raw(
        store,
        &collected.entities,
        collected.outcomes,
    )?)
}

fn analyze(config: &AppConfig, store: &TableStore, force: bool) -> AnalyticsBundle {
    let started = Instant::now();
    let bundle = Pipeline::new(store, config.analysis.clone())
        .force(force)
        .run();
    let summary = RunSummary::from_bundle(&bundle, started.elapsed());

    println!("\n=== Analysis Results ===");
    println!("Loaded from store: {}", summary.loaded);
    println!("Persisted:         {}", summary.persisted);
    println!("Computed only:     {}", summary.computed);
    if summary.missing.is_empty() {
        println!("Missing:           none");
    } else {
        println!("Missing:           {}", summary.missing.join(", "));
    }
    println!("Duration:          {:.2}s", summary.duration.as_secs_f64());

    bundle
}

fn write_report(config: &AppConfig, bundle: &AnalyticsBundle) -> Result<PathBuf> {
    let generator = ReportGenerator::from_config(&config.report, config.report_dir());
    let path = generator.write(bundle)?;
    println!("Report:            {}", path.display());
    Ok(path)
}

fn write_dataset_reports(config: &AppConfig, report: &IngestReport) -> Result<()> {
    let generator = ReportGenerator::from_config(&config.report, config.report_dir());
    for profile in [&report.entities, &report.outcomes] {
        let path = generator.write_dataset_profile(profile)?;
        println!("Dataset report:     {}", path.display());
    }
    Ok(())
}

async fn serve(config: &AppConfig, bundle: AnalyticsBundle, host: &str, port: u16) -> Result<()> {
    if !bundle.is_complete() {
        tracing::warn!(
            "Serving a partial bundle, missing: {}",
            bundle.missing().join(", ")
        );
    }

    let state = AppState::new(Arc::new(bundle), &config.server.cors_origin);
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Dashboard: http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn print_ingest(report: &IngestReport) {
    println!("\n=== Ingest Results ===");
    println!("{}", report.entities);
    println!("{}", report.outcomes);
    println!("Duplicates removed: {}", report.duplicates_removed);
    if report.foreign_winners > 0 {
        println!("Foreign winners:    {}", report.foreign_winners);
    }
}
