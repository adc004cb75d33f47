//! Minimal STAC item search client.
//!
//! Only the search endpoint is used: live raster providers record which
//! catalog items cover a tile, while pixel values still come from the
//! deterministic fallback.

use microclimate_tile_models::Bounds;
use serde_json::json;

use crate::{ProviderError, retry};

/// Default catalog root (Microsoft Planetary Computer).
pub const DEFAULT_STAC_URL: &str = "https://planetarycomputer.microsoft.com/api/stac/v1";

/// Client for one STAC API root.
#[derive(Debug, Clone)]
pub struct StacClient {
    client: reqwest::Client,
    root_url: String,
}

impl StacClient {
    /// Creates a client for the catalog at `root_url`.
    #[must_use]
    pub fn new(client: reqwest::Client, root_url: impl Into<String>) -> Self {
        Self {
            client,
            root_url: root_url.into(),
        }
    }

    /// Searches `collection` for items intersecting `bounds` within the
    /// `datetime` interval and returns the raw item objects.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the request fails or the response has
    /// no `features` array.
    pub async fn search(
        &self,
        collection: &str,
        bounds: &Bounds,
        datetime: &str,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, ProviderError> {
        let url = format!("{}/search", self.root_url.trim_end_matches('/'));
        let payload = json!({
            "collections": [collection],
            "bbox": [bounds.min_lon, bounds.min_lat, bounds.max_lon, bounds.max_lat],
            "datetime": datetime,
            "limit": limit,
        });

        let body = retry::send_json(|| self.client.post(&url).json(&payload)).await?;
        parse_items(&body)
    }
}

fn parse_items(body: &serde_json::Value) -> Result<Vec<serde_json::Value>, ProviderError> {
    body["features"]
        .as_array()
        .map(|items| items.iter().filter(|item| item.is_object()).cloned().collect())
        .ok_or_else(|| ProviderError::Response {
            message: "STAC search response has no features array".to_string(),
        })
}

/// Ids of `items`, with `"unknown"` for items that carry none.
#[must_use]
pub fn item_ids(items: &[serde_json::Value]) -> Vec<String> {
    items
        .iter()
        .map(|item| item["id"].as_str().unwrap_or("unknown").to_string())
        .collect()
}
