//! Mapillary street-level scene ratios.
//!
//! With an access token and live calls enabled, the provider counts the
//! images Mapillary holds for the tile and mixes that count into the seed
//! material, so tiles with real coverage get their own stable scene.
//! Scene ratios themselves are always synthesized.

use async_trait::async_trait;

use crate::kartaview::{SceneRanges, scene_payload};
use crate::{DataProvider, FetchRequest, ProviderError, ProviderPayload, retry, seed};

/// Source name of this provider.
pub const SOURCE: &str = "mapillary";

/// Default Graph API images endpoint.
pub const DEFAULT_MAPILLARY_URL: &str = "https://graph.mapillary.com/images";

const IMAGE_LIMIT: u32 = 10;

/// Live endpoint and credential.
#[derive(Debug, Clone)]
pub struct MapillaryClient {
    client: reqwest::Client,
    url: String,
    access_token: String,
}

impl MapillaryClient {
    /// Creates a client authenticating with `access_token`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            access_token: access_token.into(),
        }
    }

    async fn image_count(&self, request: &FetchRequest<'_>) -> Result<usize, ProviderError> {
        let b = request.aoi.bounds();
        let bbox = format!("{},{},{},{}", b.min_lon, b.min_lat, b.max_lon, b.max_lat);
        let limit = IMAGE_LIMIT.to_string();
        let params = [
            ("access_token", self.access_token.as_str()),
            ("fields", "id"),
            ("bbox", bbox.as_str()),
            ("limit", limit.as_str()),
        ];
        let body = retry::send_json(|| self.client.get(&self.url).query(&params)).await?;
        body["data"]
            .as_array()
            .map(Vec::len)
            .ok_or_else(|| ProviderError::Response {
                message: "Mapillary response has no data array".to_string(),
            })
    }
}

/// Mapillary provider.
#[derive(Debug, Clone)]
pub struct MapillaryProvider {
    run_seed: u64,
    live: Option<MapillaryClient>,
}

impl MapillaryProvider {
    /// Creates a provider; `live` enables the image count lookup.
    #[must_use]
    pub const fn new(run_seed: u64, live: Option<MapillaryClient>) -> Self {
        Self { run_seed, live }
    }
}

#[async_trait]
impl DataProvider for MapillaryProvider {
    fn id(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> ProviderPayload {
        let mut live_error = None;
        let live_count = match &self.live {
            Some(client) => match client.image_count(request).await {
                Ok(count) => Some(count),
                Err(e) => {
                    log::warn!("Mapillary lookup failed for {}: {e}", request.aoi.name());
                    live_error = Some(e.to_string());
                    None
                }
            },
            None => None,
        };

        let count_part = live_count.map_or_else(|| "none".to_string(), |c| c.to_string());
        let seed = seed::derive_seed(&seed::material(SOURCE, self.run_seed, request, &[&count_part]));
        let mut payload = scene_payload(
            SOURCE,
            seed,
            SceneRanges {
                green: 0.12..0.58,
                sky: 0.18..0.82,
                facade: 0.2..0.65,
            },
        );
        if let Some(count) = live_count {
            payload = payload.with_metadata("live_image_count", count);
        }
        if let Some(message) = live_error {
            payload = payload.with_metadata("live_error", message);
        }
        payload
    }

    fn attribution(&self) -> &'static str {
        "Mapillary imagery metadata where user credentials are provided."
    }

    fn license(&self) -> &'static str {
        "Mapillary terms and licensing apply for user API usage."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kartaview::{FACADE, GREEN_VIEW, SKY_VIEW};
    use crate::test_support;

    #[tokio::test]
    async fn offline_fetch_synthesizes_scene() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let payload = MapillaryProvider::new(42, None)
            .fetch(&FetchRequest::new(&aoi, &range, 10))
            .await;

        assert_eq!(payload.source, SOURCE);
        assert!((0.12..0.58).contains(&payload.array(GREEN_VIEW).unwrap().mean()));
        assert!((0.18..0.82).contains(&payload.array(SKY_VIEW).unwrap().mean()));
        assert!((0.2..0.65).contains(&payload.array(FACADE).unwrap().mean()));
        assert!(!payload.metadata.contains_key("live_image_count"));
    }

    #[tokio::test]
    async fn offline_fetch_is_deterministic() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let provider = MapillaryProvider::new(42, None);
        let request = FetchRequest::new(&aoi, &range, 10);
        assert_eq!(provider.fetch(&request).await, provider.fetch(&request).await);
    }
}
