//! Community Resilience Index CLI
//!
//! Usage:
//!   cri fetch-census --state 13
//!   cri run --data-dir data
//!   cri compose --data-dir data

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use resilience_pipeline::acs::{self, CensusClient};
use resilience_pipeline::{pipeline, round_for_display, stage, PipelineConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "cri", about = "Compute the Community Resilience Index for U.S. counties")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pull raw socioeconomic and healthcare inputs from the Census API
    FetchCensus {
        #[command(flatten)]
        common: CommonArgs,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout_sec: u64,
    },
    /// Run every stage and publish the canonical table
    Run {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Rebuild the canonical table from persisted stage outputs
    Compose {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// JSON pipeline configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// State FIPS code to restrict the batch to
    #[arg(short, long)]
    state: Option<String>,
}

impl CommonArgs {
    fn load(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_path(path)
                .with_context(|| format!("loading config {:?}", path))?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(state) = &self.state {
            config.jurisdiction = Some(state.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::FetchCensus { common, timeout_sec } => {
            let config = common.load()?;
            fetch_census(&config, Duration::from_secs(timeout_sec)).await
        }
        Command::Run { common } => {
            let config = common.load()?;
            run(&config)
        }
        Command::Compose { common } => {
            let config = common.load()?;
            let records = pipeline::compose_from_intermediates(&config)?;
            info!("Composed {} regions from stage outputs", records.len());
            Ok(())
        }
    }
}

async fn fetch_census(config: &PipelineConfig, timeout: Duration) -> Result<()> {
    let api_key = std::env::var("CENSUS_API_KEY").context("CENSUS_API_KEY is not set")?;
    let Some(state) = config.jurisdiction.as_deref() else {
        bail!("fetch-census needs a state (--state or config jurisdiction)");
    };

    let client = CensusClient::new(api_key, timeout)?;

    let frame = client
        .fetch_counties(&acs::socioeconomic_variables(), state)
        .await?;
    let socio = acs::derive_socioeconomic(&frame)?;
    stage::write_rows(config.resolve(&config.socioeconomic_input), &socio)?;

    let frame = client
        .fetch_counties(&acs::healthcare_variables(), state)
        .await?;
    let health = acs::derive_healthcare(&frame)?;
    stage::write_rows(config.resolve(&config.healthcare_input), &health)?;

    info!(
        "Wrote {} socioeconomic and {} healthcare rows",
        socio.len(),
        health.len()
    );
    Ok(())
}

fn run(config: &PipelineConfig) -> Result<()> {
    let run = pipeline::run(config)?;
    let summary = run.summary();

    // Show top 10 by CRI
    let mut ranked: Vec<_> = run.records.iter().filter(|r| r.cri.is_some()).collect();
    ranked.sort_by(|a, b| b.cri.partial_cmp(&a.cri).unwrap_or(std::cmp::Ordering::Equal));
    info!("Top 10 regions by CRI:");
    for r in ranked.iter().take(10) {
        info!(
            "  {:.4} | {} | {}",
            round_for_display(r.cri.unwrap_or_default()),
            r.fips(),
            r.region_name
        );
    }

    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Regions: {}", summary.composition.regions);
    info!("Missing CRI: {}", summary.composition.missing_cri);
    info!("Healthcare zero-population faults: {}", summary.healthcare_faults);
    info!("Generated at: {}", summary.generated_at);

    Ok(())
}
