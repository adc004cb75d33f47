use microclimate_tile_models::{CoolRefuge, GraphPrediction, TileFeature};

use crate::{feature_index, round3};

const MAX_ANOMALY_C: f64 = 0.5;
const MIN_VENTILATION: f64 = 0.6;
const MIN_NDVI: f64 = 0.2;

/// Tiles that are cooler than average, well ventilated, and vegetated,
/// in prediction order.
///
/// The rank is `0.5 (1 - anomaly) + 0.5 ventilation`, rounded to three
/// decimals. Predictions without a matching feature are skipped.
#[must_use]
pub fn cool_refuges(features: &[TileFeature], predictions: &[GraphPrediction]) -> Vec<CoolRefuge> {
    let by_id = feature_index(features);
    predictions
        .iter()
        .filter(|p| {
            by_id.get(p.tile_id.as_str()).is_some_and(|f| {
                p.temperature_anomaly_c < MAX_ANOMALY_C
                    && p.ventilation_score > MIN_VENTILATION
                    && f.ndvi > MIN_NDVI
            })
        })
        .map(|p| CoolRefuge {
            tile_id: p.tile_id.clone(),
            cool_refuge_rank: round3(0.5f64.mul_add(1.0 - p.temperature_anomaly_c, 0.5 * p.ventilation_score)),
        })
        .collect()
}
