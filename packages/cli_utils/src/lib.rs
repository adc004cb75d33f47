#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for microclimate binaries.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines never tear a progress bar.
//! [`IndicatifProgress`] renders a run through the pipeline's
//! [`RunObserver`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use microclimate_pipeline::{RunObserver, RunTally};

pub use indicatif::MultiProgress;

/// An `indicatif` tile bar driven by the pipeline.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied once the tile count is known.
    bar_style: ProgressStyle,
    degraded_tiles: AtomicUsize,
}

impl IndicatifProgress {
    /// Tile progress bar. Spins while the place is resolved and switches
    /// to a bar with ETA when [`RunObserver::tiles_planned()`] reports the
    /// tile count.
    #[must_use]
    pub fn tiles_bar(multi: &MultiProgress) -> Arc<dyn RunObserver> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.green/dim} {pos}/{len} tiles [{elapsed_precise} / {eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self {
            bar,
            bar_style,
            degraded_tiles: AtomicUsize::new(0),
        })
    }

    fn degraded_tiles(&self) -> usize {
        self.degraded_tiles.load(Ordering::Relaxed)
    }
}

impl RunObserver for IndicatifProgress {
    fn resolving(&self, place: &str) {
        self.bar.set_message(format!("Resolving {place}"));
    }

    fn tiles_planned(&self, tiles: usize) {
        self.bar.set_length(tiles as u64);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
        self.bar.set_message("Processing tiles");
    }

    fn tile_finished(&self, tile_id: &str, degraded: usize) {
        if degraded > 0 {
            self.degraded_tiles.fetch_add(1, Ordering::Relaxed);
        }
        self.bar.set_message(match self.degraded_tiles() {
            0 => tile_id.to_string(),
            n => format!("{tile_id} ({n} degraded)"),
        });
        self.bar.inc(1);
    }

    fn scoring(&self) {
        self.bar.set_message("Scoring airflow graph");
    }

    fn finished(&self, tally: &RunTally) {
        self.bar.finish_with_message(format!(
            "{} tiles ({} degraded), {} cool refuges, {} planting sites",
            tally.tiles, tally.degraded_tiles, tally.cool_refuges, tally.recommendations
        ));
    }
}

/// Installs the global logger wrapped in `indicatif-log-bridge`.
///
/// Microclimate crates log at `info` and everything else at `warn`
/// unless `RUST_LOG` says otherwise.
///
/// Returns the [`MultiProgress`] every progress bar must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Warn)
        .filter_module("microclimate", LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already initialized when called twice, e.g. from tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
