//! Urban morphology from building footprints.
//!
//! Areas are planar, in square degrees, for both footprints and the tile,
//! so the density ratio is unit-free.

use geo::{Area, BoundingRect, Geometry, Polygon};
use microclimate_geography::AreaOfInterest;
use serde::Serialize;

/// Upper bound of the building density ratio.
pub const MAX_DENSITY: f64 = 0.98;

/// Mean height reported for tiles without footprints.
pub const DEFAULT_MEAN_HEIGHT_M: f64 = 8.0;

/// Height assumed for a footprint without a usable `height_m`.
pub const DEFAULT_FOOTPRINT_HEIGHT_M: f64 = 10.0;

/// Orientation reported for tiles without footprints.
pub const DEFAULT_ORIENTATION_DEG: f64 = 45.0;

const MIN_TILE_AREA: f64 = 1e-9;
const MIN_DIAGONAL_DX: f64 = 1e-9;

/// Morphology summary of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Morphology {
    /// Footprint area over tile area, capped at [`MAX_DENSITY`].
    pub building_density: f64,
    /// Mean footprint height in meters.
    pub mean_building_height_m: f64,
    /// Mean bounding-box diagonal angle of footprints, in degrees.
    pub street_orientation_deg: f64,
}

/// Summarizes `footprints` over the tile `tile`.
///
/// Multi-polygons count through their largest member; features without a
/// polygonal geometry are ignored.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn morphology_features(tile: &AreaOfInterest, footprints: &[geojson::Feature]) -> Morphology {
    let tile_area = tile.area().max(MIN_TILE_AREA);
    let mut footprint_area = 0.0;
    let mut heights = Vec::new();
    let mut orientations = Vec::new();

    for feature in footprints {
        let Some(polygon) = feature.geometry.as_ref().and_then(footprint_polygon) else {
            continue;
        };
        let Some(rect) = polygon.bounding_rect() else {
            continue;
        };
        footprint_area += polygon.unsigned_area();
        orientations.push(
            rect.height()
                .atan2(rect.width().max(MIN_DIAGONAL_DX))
                .to_degrees(),
        );
        heights.push(footprint_height(feature));
    }

    let mean = |values: &[f64], default: f64| {
        if values.is_empty() {
            default
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    Morphology {
        building_density: (footprint_area / tile_area).min(MAX_DENSITY),
        mean_building_height_m: mean(&heights, DEFAULT_MEAN_HEIGHT_M),
        street_orientation_deg: mean(&orientations, DEFAULT_ORIENTATION_DEG),
    }
}

fn footprint_polygon(geometry: &geojson::Geometry) -> Option<Polygon<f64>> {
    match Geometry::<f64>::try_from(geometry.value.clone()).ok()? {
        Geometry::Polygon(polygon) => Some(polygon),
        Geometry::MultiPolygon(multi) => multi
            .0
            .into_iter()
            .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area())),
        _ => None,
    }
}

/// `height_m` as a number or numeric string, else the default.
fn footprint_height(feature: &geojson::Feature) -> f64 {
    feature
        .property("height_m")
        .and_then(|value| match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|h: &f64| h.is_finite())
        .unwrap_or(DEFAULT_FOOTPRINT_HEIGHT_M)
}
