//! Sentinel-2 Level-2A surface reflectance.
//!
//! Live mode searches the `sentinel-2-l2a` STAC collection for items
//! covering the tile and records their ids; band grids always come from
//! the seeded fallback so downstream shapes stay fixed.

use async_trait::async_trait;
use rand::Rng;

use crate::stac::{self, StacClient};
use crate::{DataProvider, FetchRequest, Grid, ProviderPayload, raster_side, seed};

/// Source name of this provider.
pub const SOURCE: &str = "sentinel2_l2a";

/// Bands returned when the request does not name any.
pub const DEFAULT_BANDS: [&str; 3] = ["B04", "B08", "B11"];

const COLLECTION: &str = "sentinel-2-l2a";
const MIN_SIDE: usize = 16;
const STAC_LIMIT: u32 = 3;

/// Sentinel-2 reflectance provider.
#[derive(Debug, Clone)]
pub struct Sentinel2Provider {
    run_seed: u64,
    stac: Option<StacClient>,
}

impl Sentinel2Provider {
    /// Creates a provider; `stac` enables the live item search.
    #[must_use]
    pub const fn new(run_seed: u64, stac: Option<StacClient>) -> Self {
        Self { run_seed, stac }
    }
}

#[async_trait]
impl DataProvider for Sentinel2Provider {
    fn id(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> ProviderPayload {
        let bands: Vec<String> = request.bands.map_or_else(
            || DEFAULT_BANDS.iter().map(ToString::to_string).collect(),
            <[String]>::to_vec,
        );
        let side = raster_side(request.resolution_m, MIN_SIDE);
        let band_list = bands.join(",");
        let seed = seed::derive_seed(&seed::material(
            SOURCE,
            self.run_seed,
            request,
            &[&band_list],
        ));
        let mut rng = seed::rng(seed);

        let mut payload = ProviderPayload::new(SOURCE)
            .with_metadata("seed", seed)
            .with_metadata("bands", bands.clone())
            .with_metadata("shape", vec![side, side]);
        for band in &bands {
            let grid = Grid::from_fn(side, side, |_, _| rng.gen_range(0.05..0.7));
            payload = payload.with_array(band.as_str(), grid);
        }

        if let Some(client) = &self.stac {
            let bounds = request.aoi.bounds();
            match client
                .search(COLLECTION, &bounds, &request.time_range.iso_interval(), STAC_LIMIT)
                .await
            {
                Ok(items) => {
                    payload = payload.with_metadata("stac_item_ids", stac::item_ids(&items));
                }
                Err(e) => {
                    log::warn!("Sentinel-2 STAC search failed for {}: {e}", request.aoi.name());
                    payload = payload.with_metadata("stac_error", e.to_string());
                }
            }
        }

        payload
    }

    fn attribution(&self) -> &'static str {
        "Copernicus Sentinel data via Microsoft Planetary Computer STAC API."
    }

    fn license(&self) -> &'static str {
        "Copernicus Sentinel data terms and conditions."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn offline_fetch_returns_default_bands() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let payload = Sentinel2Provider::new(42, None)
            .fetch(&FetchRequest::new(&aoi, &range, 10))
            .await;

        assert_eq!(payload.source, SOURCE);
        assert_eq!(payload.arrays.len(), 3);
        for band in DEFAULT_BANDS {
            let grid = payload.array(band).unwrap();
            assert_eq!(grid.shape(), (60, 60));
            assert!(grid.values().iter().all(|v| (0.05..0.7).contains(v)));
        }
        assert!(!payload.metadata.contains_key("stac_item_ids"));
    }

    #[tokio::test]
    async fn coarse_resolution_keeps_minimum_shape() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let payload = Sentinel2Provider::new(42, None)
            .fetch(&FetchRequest::new(&aoi, &range, 250))
            .await;
        assert_eq!(payload.array("B04").unwrap().shape(), (16, 16));
    }

    #[tokio::test]
    async fn requested_bands_change_output() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let bands = vec!["B02".to_string(), "B03".to_string()];
        let provider = Sentinel2Provider::new(42, None);
        let payload = provider
            .fetch(&FetchRequest::new(&aoi, &range, 10).with_bands(&bands))
            .await;
        assert_eq!(
            payload.arrays.keys().collect::<Vec<_>>(),
            vec!["B02", "B03"]
        );
    }

    #[tokio::test]
    async fn fallback_is_deterministic_per_request() {
        let aoi = test_support::aoi();
        let other = test_support::other_aoi();
        let range = test_support::time_range();
        let provider = Sentinel2Provider::new(42, None);

        let a = provider.fetch(&FetchRequest::new(&aoi, &range, 10)).await;
        let b = provider.fetch(&FetchRequest::new(&aoi, &range, 10)).await;
        let c = provider.fetch(&FetchRequest::new(&other, &range, 10)).await;
        assert_eq!(a, b);
        assert_ne!(a.array("B04"), c.array("B04"));
    }
}
