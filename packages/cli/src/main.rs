#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for microclimate analysis.

use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use microclimate_cli_utils::IndicatifProgress;
use microclimate_pipeline::{RuntimeConfig, analyze_microclimate};
use microclimate_tile_models::TimeRange;

#[derive(Parser)]
#[command(
    name = "microclimate_cli",
    about = "Neighborhood heat and ventilation analysis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a place and print the run summary as JSON
    Analyze {
        /// Free-text place name (e.g., "Beşiktaş, Istanbul")
        place: String,
        /// First day of the analysis window
        #[arg(long, default_value = "2025-07-01")]
        start: NaiveDate,
        /// Last day of the analysis window (inclusive)
        #[arg(long, default_value = "2025-07-31")]
        end: NaiveDate,
        /// TOML config file; `MICROCLIMATE_*` variables override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Enable geocoding and live provider calls
        #[arg(long)]
        live: bool,
        /// Tile edge length in meters
        #[arg(long)]
        tile_size: Option<u32>,
        /// Run seed for the synthetic fallbacks
        #[arg(long)]
        seed: Option<u64>,
        /// Cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = microclimate_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            place,
            start,
            end,
            config,
            live,
            tile_size,
            seed,
            cache_dir,
        } => {
            let time_range = TimeRange::new(start, end)?;
            let mut config = RuntimeConfig::load(config.as_deref())?;
            if live {
                config.enable_optional_live_calls = true;
            }
            if let Some(tile_size) = tile_size {
                config.tile_size_m = tile_size;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(cache_dir) = cache_dir {
                config.cache_dir = cache_dir;
            }

            let started = Instant::now();
            let progress = IndicatifProgress::tiles_bar(&multi);
            let result = analyze_microclimate(&place, &time_range, config, progress).await?;
            log::info!(
                "Analysis of '{place}' complete in {:.1}s; summary cached at {}",
                started.elapsed().as_secs_f64(),
                result.cache_path.display()
            );

            println!("{}", serde_json::to_string_pretty(&result.summary)?);
        }
    }

    Ok(())
}
