//! Enerflux CLI — pipeline runs and stored-data queries.
//!
//! Commands:
//! - `run` — execute one ingestion run against the configured providers
//! - `stats` — aggregate price statistics for a commodity
//! - `latest` — latest stored observation for a commodity/source pair

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use enerflux_core::domain::utc_midnight;
use enerflux_pipeline::{
    build_sources, Orchestrator, PipelineConfig, PipelineStatus, RunMode, RunOptions, SqliteStore,
};

#[derive(Parser)]
#[command(name = "enerflux", version, about = "Energy-commodity price data pipeline")]
struct Cli {
    /// Pipeline configuration file (YAML). Defaults apply when missing.
    #[arg(long, global = true, default_value = "enerflux.yaml")]
    config: PathBuf,

    /// SQLite database path.
    #[arg(long, global = true, default_value = "enerflux.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Incremental,
    FullRefresh,
    Backfill,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Incremental => RunMode::Incremental,
            ModeArg::FullRefresh => RunMode::FullRefresh,
            ModeArg::Backfill => RunMode::Backfill,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the ingestion pipeline once.
    Run {
        /// Fetch-window mode; overrides the configured one.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Explicit window start (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Explicit window end (YYYY-MM-DD); a future date is clamped.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Source subset, e.g. --sources EIA,FRED.
        #[arg(long, value_delimiter = ',')]
        sources: Option<Vec<String>>,

        /// Canonical commodity subset, e.g. --commodities WTI_CRUDE.
        #[arg(long, value_delimiter = ',')]
        commodities: Option<Vec<String>>,

        /// Overall score below which a source's batch is dropped.
        #[arg(long)]
        quality_threshold: Option<f64>,

        /// Write the execution result as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print aggregate statistics for a commodity across all sources.
    Stats {
        commodity: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Print the latest stored observation for a commodity/source pair.
    Latest { commodity: String, source: String },
}

fn main() -> anyhow::Result<()> {
    let _ = dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(Some(&cli.config))?;
    let store = SqliteStore::open(&cli.db, config.storage)
        .with_context(|| format!("failed to open database at {}", cli.db.display()))?;

    match cli.command {
        Command::Run {
            mode,
            start,
            end,
            sources,
            commodities,
            quality_threshold,
            report,
        } => {
            let (specs, warnings) = build_sources(&config);
            for warning in &warnings {
                tracing::warn!("{warning}");
            }
            if specs.is_empty() {
                anyhow::bail!("no source adapters could be initialized; check API keys");
            }

            let orchestrator = Orchestrator::new(config, store, specs);
            let options = RunOptions {
                commodities,
                sources,
                mode: mode.map(Into::into),
                start,
                end,
                quality_threshold,
                ..RunOptions::default()
            };

            let result = orchestrator.run(&options);
            println!("{}", result.summary);

            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&result)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("failed to write report to {}", path.display()))?;
                tracing::info!(path = %path.display(), "execution result written");
            }

            if result.status == PipelineStatus::Failed {
                std::process::exit(1);
            }
        }

        Command::Stats {
            commodity,
            start,
            end,
        } => {
            let stats = store.statistics(
                &commodity,
                start.map(utc_midnight),
                end.map(utc_midnight),
            )?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Latest { commodity, source } => match store.latest_for(&commodity, &source)? {
            Some((timestamp, price)) => {
                println!("{commodity} from {source}: {price} at {}", timestamp.to_rfc3339());
            }
            None => {
                println!("no data stored for {commodity} from {source}");
            }
        },
    }

    Ok(())
}
