//! Shared helpers for building-footprint providers.

use geo::Polygon;
use serde_json::json;

/// Property carrying a footprint's height in meters.
pub const HEIGHT_PROPERTY: &str = "height_m";

/// Wraps a footprint polygon as a `GeoJSON` feature with its height and
/// originating provider in the properties.
#[must_use]
pub fn footprint_feature(polygon: &Polygon<f64>, height_m: f64, provider: &str) -> geojson::Feature {
    let mut properties = geojson::JsonObject::new();
    properties.insert(HEIGHT_PROPERTY.to_string(), json!(height_m));
    properties.insert("provider".to_string(), json!(provider));

    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(polygon))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
