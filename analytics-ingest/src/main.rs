use std::path::Path;
use std::process::ExitCode;

use analytics_ingest::{
    cli::{Cli, Mode},
    config::Config,
    error::IngestError,
    ingest::{IngestOptions, Ingestor},
    preview::preview_file,
    prometheus::{setup_metrics_recorder, write_metrics_file},
    schema::read_script,
    store::ClickHouseStore,
};
use anyhow::{Context, Error};
use clap::Parser;
use envconfig::Envconfig;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn setup_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}

async fn init_database(store: &ClickHouseStore, config: &Config) -> Result<(), Error> {
    let script = read_script(Path::new(&config.init_sql_path))
        .await
        .with_context(|| format!("Failed to read init script {}", config.init_sql_path))?;

    let summary = store.init_schema(&script).await;
    info!(
        executed = summary.executed,
        failed = summary.failed,
        "Schema initialization finished"
    );
    Ok(())
}

async fn print_stats(store: &ClickHouseStore) -> Result<(), Error> {
    let report = store
        .query_stats()
        .await
        .context("Failed to query statistics")?;
    println!("{report}");
    Ok(())
}

async fn execute(mode: Mode, config: &Config, options: IngestOptions) -> Result<(), Error> {
    let store = ClickHouseStore::connect(config).await?;

    match mode {
        Mode::Preview => {
            match preview_file(Path::new(&config.file), config.preview_lines).await {
                Ok(out) => print!("{out}"),
                Err(e) => error!("Error reading file: {}", e),
            }
        }
        Mode::InitOnly => {
            init_database(&store, config).await?;
            info!("Database initialized successfully");
        }
        Mode::StatsOnly => print_stats(&store).await?,
        Mode::Ingest => {
            init_database(&store, config).await?;

            let summary = Ingestor::new(&store, options)
                .ingest_file(Path::new(&config.file))
                .await?;
            println!("{summary}");

            print_stats(&store).await?;
        }
    }

    Ok(())
}

async fn run() -> Result<(), Error> {
    let cli = Cli::parse();

    let config = Config::init_from_env().context("Failed to load configuration")?;
    let (config, options) = cli.configure(config)?;

    let metrics = match &config.metrics_file {
        Some(path) => Some((
            setup_metrics_recorder().context("Failed to install metrics recorder")?,
            path,
        )),
        None => None,
    };

    let result = execute(cli.mode(), &config, options).await;

    if let Some((handle, path)) = metrics {
        if let Err(e) = write_metrics_file(&handle, Path::new(path)).await {
            warn!("Could not write metrics to {}: {}", path, e);
        }
    }

    result
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    setup_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let retryable = e
                .downcast_ref::<IngestError>()
                .is_some_and(IngestError::is_retryable);
            error!(retryable, "{:#}", e);
            ExitCode::FAILURE
        }
    }
}
