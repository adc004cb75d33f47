#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tile scoring.
//!
//! [`HeuristicEngine`] is the reproducible baseline: closed-form scores
//! with no randomness and no I/O. Alternative models plug in through
//! [`TilePredictor`] with the same input and output shapes.
//!
//! [`cool_refuges`] and [`tree_planting_recommendations`] turn
//! predictions into actionable outputs.

mod recommendations;
mod refuges;

use std::collections::HashMap;

use microclimate_graph::AirflowGraph;
use microclimate_tile_models::{GraphPrediction, TileFeature};

pub use recommendations::{TREE_PLANTING_RATIONALE, tree_planting_recommendations};
pub use refuges::cool_refuges;

/// A model that scores every tile of a graph.
pub trait TilePredictor: Send + Sync {
    /// Short identifier used in logs and run metadata.
    fn id(&self) -> &str;

    /// Scores `features`, one prediction per distinct tile id.
    fn predict(&self, graph: &AirflowGraph, features: &[TileFeature]) -> Vec<GraphPrediction>;
}

/// Closed-form heat and ventilation scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEngine;

impl HeuristicEngine {
    /// Temperature anomaly in °C driven by built-up cover, vegetation,
    /// roughness, and background meteorology.
    #[must_use]
    #[allow(clippy::suboptimal_flops)]
    pub fn temperature_anomaly_c(feature: &TileFeature) -> f64 {
        2.2 * feature.ndbi - 1.6 * feature.ndvi
            + 1.2 * feature.building_density
            + 0.8 * feature.roughness_proxy
            + 0.03 * (feature.meteo_air_temp_c - 25.0)
            - 0.15 * feature.meteo_wind_m_s
    }

    /// Ventilation score in `[0, 1]`; better connected tiles score higher.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::suboptimal_flops)]
    pub fn ventilation_score(feature: &TileFeature, degree: usize) -> f64 {
        (0.5 + 0.4 * feature.street_sky_ratio - 0.35 * feature.canyon_aspect_ratio
            - 0.25 * feature.roughness_proxy
            + 0.20 * feature.green_view_ratio
            + 0.03 * degree as f64)
            .clamp(0.0, 1.0)
    }
}

impl TilePredictor for HeuristicEngine {
    fn id(&self) -> &'static str {
        "heuristic"
    }

    /// Duplicate tile ids produce one prediction, at the position of the
    /// first occurrence, computed from the last occurrence's feature.
    fn predict(&self, graph: &AirflowGraph, features: &[TileFeature]) -> Vec<GraphPrediction> {
        latest_by_id(features)
            .into_iter()
            .map(|feature| GraphPrediction {
                tile_id: feature.tile_id.clone(),
                temperature_anomaly_c: Self::temperature_anomaly_c(feature),
                ventilation_score: Self::ventilation_score(feature, graph.degree(&feature.tile_id)),
            })
            .collect()
    }
}

/// Distinct features in first-seen order, each the last one seen for its id.
fn latest_by_id(features: &[TileFeature]) -> Vec<&TileFeature> {
    let mut order: Vec<&TileFeature> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for feature in features {
        if let Some(&i) = index.get(feature.tile_id.as_str()) {
            order[i] = feature;
        } else {
            index.insert(&feature.tile_id, order.len());
            order.push(feature);
        }
    }
    order
}

/// Features keyed by tile id; later duplicates win.
pub(crate) fn feature_index(features: &[TileFeature]) -> HashMap<&str, &TileFeature> {
    features.iter().map(|f| (f.tile_id.as_str(), f)).collect()
}

/// Rounds half to even at three decimals.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}
