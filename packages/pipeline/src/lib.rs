#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end microclimate analysis.
//!
//! [`Pipeline::analyze`] runs the whole flow for one place:
//!
//! 1. resolve the place to an AOI (falling back to a deterministic box),
//! 2. tile the AOI,
//! 3. fetch and reduce every tile concurrently ([`tile::process_tile`]),
//! 4. build the airflow graph and score it,
//! 5. derive cool refuges and tree planting recommendations,
//! 6. persist the [`AnalysisSummary`] to the content-addressed cache.
//!
//! With live calls disabled the run touches no network and two runs with
//! the same inputs produce identical summaries.

pub mod config;
pub mod progress;
pub mod tile;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt as _};
use microclimate_cache::{CacheError, CacheStore};
use microclimate_features::FeatureError;
use microclimate_geocoder::nominatim::NominatimGeocoder;
use microclimate_geocoder::{OfflineGeocoder, PlaceGeocoder, resolve_place};
use microclimate_geography::tile_aoi;
use microclimate_graph::AirflowGraph;
use microclimate_inference::{
    HeuristicEngine, TilePredictor, cool_refuges, tree_planting_recommendations,
};
use microclimate_provider::registry::ProviderSet;
use microclimate_provider_models::ProviderCredit;
use microclimate_tile_models::{
    Bounds, CoolRefuge, GraphPrediction, TileFeature, TimeRange, TreePlantingRecommendation,
};
use serde::Serialize;
use thiserror::Error;

pub use config::{ConfigError, RuntimeConfig};
pub use progress::{RunObserver, RunTally, Silent, silent};
pub use tile::{TileMetadata, TileOutcome, process_tile};

/// Caveats attached to every run summary.
pub const ASSUMPTIONS: [&str; 3] = [
    "Deterministic fallback features are used when live providers are unavailable.",
    "Thermal labels use Landsat-style synthetic priors when no clear-sky thermal scene is retrieved.",
    "Tree planting recommendations are heuristic and should be validated with local planners.",
];

/// Errors that abort an analysis run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Tiling the resolved AOI produced no tiles.
    #[error("No tiles generated for AOI of '{place}'")]
    NoTiles {
        /// The place being analyzed.
        place: String,
    },

    /// Invalid runtime configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cache read or write failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// A tile's payloads could not be reduced to features.
    #[error("Feature extraction failed: {0}")]
    Feature(#[from] FeatureError),

    /// Summary serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parameters a run was executed with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunParameters {
    /// Run seed.
    pub seed: u64,
    /// Tile edge length in meters.
    pub tile_size_m: u32,
    /// Raster resolution in meters.
    pub resolution_m: u32,
    /// Neighbors per tile in the airflow graph.
    pub k_neighbors: usize,
    /// Street width used for canyon proxies.
    pub street_width_m: f64,
    /// Whether live provider calls were enabled.
    pub live_calls: bool,
    /// Geocoder used to resolve the place.
    pub geocoder: String,
    /// Model that scored the tiles.
    pub predictor: String,
}

/// Size of the airflow graph of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Number of tiles in the graph.
    pub node_count: usize,
    /// Number of undirected edges.
    pub edge_count: usize,
}

/// Everything a run produced, as persisted to the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    /// The place as given by the caller.
    pub place: String,
    /// Whether the AOI came from a geocoder or the fallback.
    pub aoi_source: String,
    /// Bounding box of the AOI.
    pub aoi_bounds: Bounds,
    /// Analysis window.
    pub time_range: TimeRange,
    /// Run parameters.
    pub parameters: RunParameters,
    /// Airflow graph size.
    pub graph: GraphStats,
    /// One feature vector per tile, in tile order.
    pub tile_features: Vec<TileFeature>,
    /// One prediction per tile.
    pub predictions: Vec<GraphPrediction>,
    /// Cool, ventilated, vegetated tiles.
    pub cool_refuges: Vec<CoolRefuge>,
    /// Canopy expansion suggestions.
    pub tree_planting_recommendations: Vec<TreePlantingRecommendation>,
    /// Attribution and license of every provider.
    pub attribution: Vec<ProviderCredit>,
    /// Caveats of the analysis.
    pub assumptions: Vec<String>,
    /// Notes on every fallback taken during the run.
    pub degraded: Vec<String>,
    /// Provider metadata per tile, in tile order.
    pub provider_details: Vec<TileMetadata>,
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// The run summary.
    pub summary: AnalysisSummary,
    /// Cache key the summary was stored under.
    pub cache_key: String,
    /// Path of the cached summary.
    pub cache_path: PathBuf,
}

/// A configured analysis pipeline.
///
/// Collaborators default to what the configuration selects and can be
/// replaced individually before running.
pub struct Pipeline {
    config: RuntimeConfig,
    geocoder: Arc<dyn PlaceGeocoder>,
    providers: ProviderSet,
    predictor: Arc<dyn TilePredictor>,
    cache: CacheStore,
}

impl Pipeline {
    /// Builds a pipeline from a validated configuration.
    ///
    /// Live calls select the Nominatim geocoder; otherwise, or if its HTTP
    /// client cannot be built, places resolve offline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if `config` fails validation.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        let geocoder: Arc<dyn PlaceGeocoder> = if config.enable_optional_live_calls {
            match NominatimGeocoder::new(
                config.nominatim_url.clone(),
                &config.geocoder_user_agent,
                config.request_timeout(),
            ) {
                Ok(geocoder) => Arc::new(geocoder),
                Err(e) => {
                    log::warn!("Nominatim unavailable, resolving places offline: {e}");
                    Arc::new(OfflineGeocoder)
                }
            }
        } else {
            Arc::new(OfflineGeocoder)
        };

        Ok(Self {
            providers: ProviderSet::from_options(&config.provider_options()),
            cache: CacheStore::new(config.cache_dir.clone()),
            geocoder,
            predictor: Arc::new(HeuristicEngine),
            config,
        })
    }

    /// Replaces the place geocoder.
    #[must_use]
    pub fn with_geocoder(mut self, geocoder: Arc<dyn PlaceGeocoder>) -> Self {
        self.geocoder = geocoder;
        self
    }

    /// Replaces the provider set.
    #[must_use]
    pub fn with_providers(mut self, providers: ProviderSet) -> Self {
        self.providers = providers;
        self
    }

    /// Replaces the tile scoring model.
    #[must_use]
    pub fn with_predictor(mut self, predictor: Arc<dyn TilePredictor>) -> Self {
        self.predictor = predictor;
        self
    }

    /// The configuration of this pipeline.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Analyzes `place` over `time_range` and caches the summary.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::NoTiles`] if the AOI yields no tiles
    /// * [`PipelineError::Feature`] if a tile cannot be reduced to features
    /// * [`PipelineError::Cache`] or [`PipelineError::Json`] if the summary
    ///   cannot be persisted
    pub async fn analyze(
        &self,
        place: &str,
        time_range: &TimeRange,
        observer: Arc<dyn RunObserver>,
    ) -> Result<AnalysisResult, PipelineError> {
        let config = &self.config;
        let mut degraded = Vec::new();

        observer.resolving(place);
        let resolved = resolve_place(place, self.geocoder.as_ref()).await;
        if let Some(error) = &resolved.error {
            degraded.push(format!("geocoder: {error}; using fallback AOI"));
        }
        let aoi = resolved.aoi;

        let tiles = tile_aoi(&aoi, f64::from(config.tile_size_m));
        if tiles.is_empty() {
            return Err(PipelineError::NoTiles {
                place: place.to_string(),
            });
        }
        log::info!(
            "Analyzing '{place}' ({}) as {} tiles of {} m, {} workers",
            resolved.source,
            tiles.len(),
            config.tile_size_m,
            config.workers
        );

        observer.tiles_planned(tiles.len());
        let results: Vec<_> = stream::iter(tiles.iter().map(|tile| {
            let observer = &observer;
            async move {
                let outcome = process_tile(
                    tile,
                    time_range,
                    config.resolution_m,
                    config.street_width_m,
                    &self.providers,
                )
                .await;
                observer.tile_finished(
                    &tile.tile_id,
                    outcome.as_ref().map_or(0, |outcome| outcome.degraded.len()),
                );
                (tile.tile_id.clone(), outcome)
            }
        }))
        .buffer_unordered(config.workers)
        .collect()
        .await;

        let mut by_id = HashMap::with_capacity(results.len());
        for (tile_id, outcome) in results {
            by_id.insert(tile_id, outcome?);
        }

        let mut tile_features = Vec::with_capacity(tiles.len());
        let mut provider_details = Vec::with_capacity(tiles.len());
        let mut degraded_tiles = 0;
        for tile in &tiles {
            if let Some(outcome) = by_id.remove(&tile.tile_id) {
                if !outcome.degraded.is_empty() {
                    degraded_tiles += 1;
                }
                tile_features.push(outcome.feature);
                provider_details.push(outcome.metadata);
                degraded.extend(outcome.degraded);
            }
        }

        observer.scoring();
        let graph = AirflowGraph::build(&tile_features, config.k_neighbors);
        let predictions = self.predictor.predict(&graph, &tile_features);
        log::info!(
            "Scored {} tiles with {} ({} graph edges)",
            predictions.len(),
            self.predictor.id(),
            graph.edge_count()
        );

        let summary = AnalysisSummary {
            place: place.to_string(),
            aoi_source: resolved.source.to_string(),
            aoi_bounds: aoi.bounds(),
            time_range: *time_range,
            parameters: RunParameters {
                seed: self.providers.seed(),
                tile_size_m: config.tile_size_m,
                resolution_m: config.resolution_m,
                k_neighbors: config.k_neighbors,
                street_width_m: config.street_width_m,
                live_calls: config.enable_optional_live_calls,
                geocoder: self.geocoder.id().to_string(),
                predictor: self.predictor.id().to_string(),
            },
            graph: GraphStats {
                node_count: graph.node_count(),
                edge_count: graph.edge_count(),
            },
            cool_refuges: cool_refuges(&tile_features, &predictions),
            tree_planting_recommendations: tree_planting_recommendations(
                &tile_features,
                &predictions,
            ),
            tile_features,
            predictions,
            attribution: self.providers.credits().to_vec(),
            assumptions: ASSUMPTIONS.iter().map(ToString::to_string).collect(),
            degraded,
            provider_details,
        };

        let cache_key = CacheStore::make_key(&run_key(
            place,
            time_range,
            tiles.len(),
            self.providers.seed(),
        ))?;
        let cache_path = self
            .cache
            .save_json(&cache_key, &serde_json::to_value(&summary)?)?;
        log::info!("Saved summary to {}", cache_path.display());

        observer.finished(&RunTally {
            tiles: summary.tile_features.len(),
            degraded_tiles,
            cool_refuges: summary.cool_refuges.len(),
            recommendations: summary.tree_planting_recommendations.len(),
        });

        Ok(AnalysisResult {
            summary,
            cache_key,
            cache_path,
        })
    }
}

/// Identity of a run in the cache.
fn run_key(place: &str, time_range: &TimeRange, tile_count: usize, seed: u64) -> serde_json::Value {
    serde_json::json!({
        "place": place,
        "start": time_range.start().to_string(),
        "end": time_range.end().to_string(),
        "tile_count": tile_count,
        "seed": seed,
    })
}

/// Runs [`Pipeline::analyze`] with the collaborators `config` selects.
///
/// # Errors
///
/// Returns [`PipelineError`] if the configuration is invalid or the run
/// fails.
pub async fn analyze_microclimate(
    place: &str,
    time_range: &TimeRange,
    config: RuntimeConfig,
    observer: Arc<dyn RunObserver>,
) -> Result<AnalysisResult, PipelineError> {
    Pipeline::from_config(config)?
        .analyze(place, time_range, observer)
        .await
}
