//! `OpenStreetMap` building footprints via the Overpass API.
//!
//! This provider has no synthetic fallback of its own: with live calls
//! disabled, or when Overpass fails, it returns an empty payload and
//! relies on a [`FallbackChain`](crate::fallback::FallbackChain) to hand
//! the request to Open Buildings.

use async_trait::async_trait;
use geo::{LineString, Polygon};

use crate::footprints::footprint_feature;
use crate::{DataProvider, FetchRequest, ProviderError, ProviderPayload, retry};

/// Source name of this provider.
pub const SOURCE: &str = "osm_buildings";

/// Default Overpass interpreter endpoint.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

const MAX_FOOTPRINTS: usize = 100;
const DEFAULT_HEIGHT_M: f64 = 12.0;
const METERS_PER_LEVEL: f64 = 3.0;

/// Overpass-backed footprint provider.
#[derive(Debug, Clone)]
pub struct OsmBuildingsProvider {
    live: Option<(reqwest::Client, String)>,
}

impl OsmBuildingsProvider {
    /// Provider that never calls Overpass and always returns empty.
    #[must_use]
    pub const fn offline() -> Self {
        Self { live: None }
    }

    /// Provider that queries the Overpass endpoint at `url`.
    #[must_use]
    pub fn live(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            live: Some((client, url.into())),
        }
    }

    async fn query(
        client: &reqwest::Client,
        url: &str,
        request: &FetchRequest<'_>,
    ) -> Result<Vec<geojson::Feature>, ProviderError> {
        let b = request.aoi.bounds();
        let query = format!(
            "[out:json][timeout:25];way[\"building\"]({},{},{},{});out geom {MAX_FOOTPRINTS};",
            b.min_lat, b.min_lon, b.max_lat, b.max_lon
        );
        let form = [("data", query)];
        let body = retry::send_json(|| client.post(url).form(&form)).await?;
        parse_elements(&body)
    }
}

#[async_trait]
impl DataProvider for OsmBuildingsProvider {
    fn id(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> ProviderPayload {
        let Some((client, url)) = &self.live else {
            return ProviderPayload::new(SOURCE).with_metadata("status", "live_disabled");
        };

        match Self::query(client, url, request).await {
            Ok(vectors) => {
                let count = vectors.len();
                log::debug!("Overpass returned {count} footprints for {}", request.aoi.name());
                ProviderPayload::new(SOURCE)
                    .with_vectors(vectors)
                    .with_metadata("footprint_count", count)
            }
            Err(e) => {
                log::warn!("Overpass query failed for {}: {e}", request.aoi.name());
                ProviderPayload::new(SOURCE).with_metadata("live_error", e.to_string())
            }
        }
    }

    fn attribution(&self) -> &'static str {
        "OpenStreetMap contributors via the Overpass API."
    }

    fn license(&self) -> &'static str {
        "ODbL 1.0 for OpenStreetMap data."
    }
}

fn parse_elements(body: &serde_json::Value) -> Result<Vec<geojson::Feature>, ProviderError> {
    let elements = body["elements"]
        .as_array()
        .ok_or_else(|| ProviderError::Response {
            message: "Overpass response has no elements array".to_string(),
        })?;

    Ok(elements
        .iter()
        .filter_map(|element| {
            let polygon = way_polygon(&element["geometry"])?;
            Some(footprint_feature(&polygon, way_height(&element["tags"]), SOURCE))
        })
        .take(MAX_FOOTPRINTS)
        .collect())
}

/// Closed ring from an Overpass `out geom` node list. Needs at least
/// three distinct vertices.
fn way_polygon(geometry: &serde_json::Value) -> Option<Polygon<f64>> {
    let coords: Vec<(f64, f64)> = geometry
        .as_array()?
        .iter()
        .filter_map(|node| Some((node["lon"].as_f64()?, node["lat"].as_f64()?)))
        .collect();
    if coords.len() < 3 {
        return None;
    }
    // `Polygon::new` closes the ring.
    Some(Polygon::new(LineString::from(coords), vec![]))
}

fn way_height(tags: &serde_json::Value) -> f64 {
    let explicit = tags["height"]
        .as_str()
        .and_then(|h| h.trim().trim_end_matches('m').trim().parse::<f64>().ok());
    let from_levels = || {
        tags["building:levels"]
            .as_str()
            .and_then(|l| l.trim().parse::<f64>().ok())
            .map(|levels| levels * METERS_PER_LEVEL)
    };
    explicit
        .or_else(from_levels)
        .filter(|h| h.is_finite() && *h > 0.0)
        .unwrap_or(DEFAULT_HEIGHT_M)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::footprints::HEIGHT_PROPERTY;
    use crate::test_support;

    fn square(lon: f64, lat: f64) -> serde_json::Value {
        json!([
            {"lat": lat, "lon": lon},
            {"lat": lat, "lon": lon + 0.0001},
            {"lat": lat + 0.0001, "lon": lon + 0.0001},
            {"lat": lat + 0.0001, "lon": lon},
            {"lat": lat, "lon": lon}
        ])
    }

    #[tokio::test]
    async fn offline_returns_empty_payload() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let payload = OsmBuildingsProvider::offline()
            .fetch(&FetchRequest::new(&aoi, &range, 10))
            .await;
        assert!(payload.is_empty());
        assert_eq!(payload.metadata["status"], json!("live_disabled"));
    }

    #[test]
    fn parses_ways_with_height_rules() {
        let body = json!({
            "elements": [
                {"type": "way", "geometry": square(29.01, 41.03), "tags": {"building": "yes", "height": "21.5 m"}},
                {"type": "way", "geometry": square(29.02, 41.03), "tags": {"building": "yes", "building:levels": "5"}},
                {"type": "way", "geometry": square(29.03, 41.03), "tags": {"building": "yes"}},
                {"type": "way", "geometry": [{"lat": 41.0, "lon": 29.0}], "tags": {}}
            ]
        });
        let features = parse_elements(&body).unwrap();
        let heights: Vec<f64> = features
            .iter()
            .map(|f| f.property(HEIGHT_PROPERTY).and_then(serde_json::Value::as_f64).unwrap())
            .collect();
        assert_eq!(heights, vec![21.5, 15.0, 12.0]);
    }

    #[test]
    fn caps_footprint_count() {
        let elements: Vec<_> = (0..150)
            .map(|i| json!({"geometry": square(29.0 + f64::from(i) * 0.001, 41.0), "tags": {}}))
            .collect();
        let features = parse_elements(&json!({ "elements": elements })).unwrap();
        assert_eq!(features.len(), MAX_FOOTPRINTS);
    }

    #[test]
    fn rejects_malformed_response() {
        assert!(parse_elements(&json!({"remark": "timeout"})).is_err());
    }
}
