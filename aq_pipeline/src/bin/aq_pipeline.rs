use std::path::PathBuf;

use anyhow::{Context, Result};
use aq_pipeline::{
    config::load_config_path,
    pipelines::{
        PipelineContext, Providers,
        backfill::run_backfill,
        daily::{DailyOptions, run_daily},
        dashboard::{DashboardOptions, run_dashboard},
        inference::{InferenceOptions, run_inference},
        training::{TrainingOptions, run_training},
    },
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{Instrument, error, info, info_span};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "PM2.5 forecasting pipeline")]
struct Cli {
    /// Pipeline configuration file.
    #[arg(long, value_name = "FILE", default_value = "aq_pipeline.toml")]
    config: PathBuf,

    /// Run as if today were this date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Load historical exports and archive weather.
    Backfill,
    /// Append today's readings and weather forecast, then forecast.
    Daily {
        #[arg(long)]
        skip_forecast: bool,
    },
    /// Train, evaluate and register a model.
    Train {
        /// First date of the test split (default: today).
        #[arg(long, value_name = "DATE")]
        test_start: Option<NaiveDate>,
    },
    /// Produce chained forecasts with a registered model.
    Infer {
        #[arg(long)]
        model_version: Option<u32>,
    },
    /// Render the monitoring dashboard.
    Dashboard {
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
}

impl Cmd {
    fn name(&self) -> &'static str {
        match self {
            Cmd::Backfill => "backfill",
            Cmd::Daily { .. } => "daily",
            Cmd::Train { .. } => "train",
            Cmd::Infer { .. } => "infer",
            Cmd::Dashboard { .. } => "dashboard",
        }
    }

    fn needs_providers(&self) -> bool {
        matches!(self, Cmd::Backfill | Cmd::Daily { .. })
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config_path(&cli.config)
        .with_context(|| format!("load {}", cli.config.display()))?;
    let mut ctx = PipelineContext::open(config, cli.today)?;
    if cli.cmd.needs_providers() {
        let providers = Providers::live(&ctx.config.ingest)?;
        ctx = ctx.with_providers(providers);
    }

    let span = info_span!("pipeline", command = cli.cmd.name(), run_id = %ctx.run_id, today = %ctx.today);
    async {
        match cli.cmd {
            Cmd::Backfill => {
                run_backfill(&ctx).await?;
            }
            Cmd::Daily { skip_forecast } => {
                let outcome = run_daily(&ctx, DailyOptions { skip_forecast }).await?;
                info!(readings = outcome.readings, lagged = outcome.lagged_rows, "daily run finished");
            }
            Cmd::Train { test_start } => {
                let outcome = run_training(&ctx, TrainingOptions { test_start })?;
                info!(version = outcome.card.version, charts = outcome.charts.len(), "training finished");
            }
            Cmd::Infer { model_version } => {
                let model_version = model_version.or(ctx.config.model.version);
                let outcome = run_inference(&ctx, InferenceOptions { model_version })?;
                info!(version = outcome.model_version, forecasts = outcome.forecasts.len(), "inference finished");
            }
            Cmd::Dashboard { out } => {
                run_dashboard(&ctx, DashboardOptions { out_dir: out })?;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .instrument(span)
    .await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .compact()
        .init();
    shared_utils::env::load_dotenv(None);

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{e:#}");
        return Err(e);
    }
    Ok(())
}
