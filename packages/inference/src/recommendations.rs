use microclimate_tile_models::{GraphPrediction, Priority, TileFeature, TreePlantingRecommendation};

use crate::feature_index;

/// Justification attached to every recommendation.
pub const TREE_PLANTING_RATIONALE: &str = "High thermal anomaly and low existing green view \
                                           indicate strong cooling potential from canopy expansion.";

const MIN_ANOMALY_C: f64 = 0.5;
const HIGH_PRIORITY_ANOMALY_C: f64 = 1.5;
const MAX_GREEN_VIEW: f64 = 0.25;
const TREES_PER_DEGREE: f64 = 12.0;
const MIN_TREES: u32 = 4;

/// Canopy expansion suggestions for hot tiles with little street greenery,
/// in prediction order.
///
/// Tree count is `max(4, round(12 · anomaly))`; anomalies above 1.5 °C are
/// high priority. Predictions without a matching feature are skipped.
#[must_use]
pub fn tree_planting_recommendations(
    features: &[TileFeature],
    predictions: &[GraphPrediction],
) -> Vec<TreePlantingRecommendation> {
    let by_id = feature_index(features);
    predictions
        .iter()
        .filter_map(|p| {
            let Some(feature) = by_id.get(p.tile_id.as_str()) else {
                log::debug!("No feature for prediction {}; skipping", p.tile_id);
                return None;
            };
            if p.temperature_anomaly_c < MIN_ANOMALY_C || feature.green_view_ratio >= MAX_GREEN_VIEW {
                return None;
            }
            Some(TreePlantingRecommendation {
                tile_id: p.tile_id.clone(),
                priority: if p.temperature_anomaly_c > HIGH_PRIORITY_ANOMALY_C {
                    Priority::High
                } else {
                    Priority::Medium
                },
                recommended_tree_count: tree_count(p.temperature_anomaly_c),
                rationale: TREE_PLANTING_RATIONALE.to_string(),
            })
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tree_count(anomaly_c: f64) -> u32 {
    let scaled = (TREES_PER_DEGREE * anomaly_c).round_ties_even();
    if scaled.is_finite() {
        // Non-negative here: anomaly is at least MIN_ANOMALY_C.
        (scaled.min(f64::from(u32::MAX)) as u32).max(MIN_TREES)
    } else {
        MIN_TREES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::feature;

    fn prediction(tile_id: &str, anomaly: f64) -> GraphPrediction {
        GraphPrediction {
            tile_id: tile_id.to_string(),
            temperature_anomaly_c: anomaly,
            ventilation_score: 0.5,
        }
    }

    #[test]
    fn recommends_hot_tiles_with_low_green_view() {
        let mut leafy = feature("leafy", 0.0, 0.0);
        leafy.green_view_ratio = 0.3;
        let features = vec![feature("hot", 0.0, 0.0), feature("mild", 0.0, 0.0), leafy];
        let predictions = vec![prediction("hot", 2.0), prediction("mild", 0.4), prediction("leafy", 2.0)];

        let recs = tree_planting_recommendations(&features, &predictions);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].tile_id, "hot");
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[0].recommended_tree_count, 24);
        assert_eq!(recs[0].rationale, TREE_PLANTING_RATIONALE);
    }

    #[test]
    fn moderate_anomaly_is_medium_with_minimum_trees() {
        let features = vec![feature("a", 0.0, 0.0), feature("b", 0.0, 0.0)];
        let recs = tree_planting_recommendations(&features, &[prediction("a", 0.5), prediction("b", 1.5)]);
        assert_eq!(recs[0].priority, Priority::Medium);
        assert_eq!(recs[0].recommended_tree_count, 6);
        assert_eq!(recs[1].priority, Priority::Medium);
        assert_eq!(recs[1].recommended_tree_count, 18);
    }

    #[test]
    fn tree_count_has_floor() {
        assert_eq!(tree_count(0.3), MIN_TREES);
        assert_eq!(tree_count(f64::NAN), MIN_TREES);
    }
}
