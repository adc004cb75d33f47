//! Landsat Collection 2 Level-2 surface temperature.

use async_trait::async_trait;

use crate::stac::{self, StacClient};
use crate::{DataProvider, FetchRequest, Grid, ProviderPayload, raster_side, seed};

/// Source name of this provider.
pub const SOURCE: &str = "landsat_l2_st";

/// Name of the single band this provider returns.
pub const SURFACE_TEMP_BAND: &str = "surface_temp_k";

const COLLECTION: &str = "landsat-c2-l2";
const MIN_SIDE: usize = 8;
/// Native thermal resolution; finer requests are served at this size.
const NATIVE_RESOLUTION_M: u32 = 30;
const STAC_LIMIT: u32 = 3;

/// Landsat thermal provider.
#[derive(Debug, Clone)]
pub struct LandsatProvider {
    run_seed: u64,
    stac: Option<StacClient>,
}

impl LandsatProvider {
    /// Creates a provider; `stac` enables the live item search.
    #[must_use]
    pub const fn new(run_seed: u64, stac: Option<StacClient>) -> Self {
        Self { run_seed, stac }
    }
}

#[async_trait]
impl DataProvider for LandsatProvider {
    fn id(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> ProviderPayload {
        let side = raster_side(request.resolution_m.max(NATIVE_RESOLUTION_M), MIN_SIDE);
        let seed = seed::derive_seed(&seed::material(SOURCE, self.run_seed, request, &[]));
        let mut rng = seed::rng(seed);
        let grid = Grid::from_fn(side, side, |_, _| seed::normal(&mut rng, 303.0, 3.2));

        let mut payload = ProviderPayload::new(SOURCE)
            .with_array(SURFACE_TEMP_BAND, grid)
            .with_metadata("seed", seed)
            .with_metadata("shape", vec![side, side]);

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
                    log::warn!("Landsat STAC search failed for {}: {e}", request.aoi.name());
                    payload = payload.with_metadata("stac_error", e.to_string());
                }
            }
        }

        payload
    }

    fn attribution(&self) -> &'static str {
        "USGS/NASA Landsat Collection 2 Level 2 data via public STAC APIs."
    }

    fn license(&self) -> &'static str {
        "Public domain for Landsat products with source attribution to USGS."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn fine_resolution_is_served_at_native_size() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let provider = LandsatProvider::new(42, None);
        let fine = provider.fetch(&FetchRequest::new(&aoi, &range, 10)).await;
        let native = provider.fetch(&FetchRequest::new(&aoi, &range, 30)).await;
        assert_eq!(fine.array(SURFACE_TEMP_BAND).unwrap().shape(), (20, 20));
        assert_eq!(native.array(SURFACE_TEMP_BAND).unwrap().shape(), (20, 20));
    }

    #[tokio::test]
    async fn temperatures_are_plausible_kelvin() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let payload = LandsatProvider::new(42, None)
            .fetch(&FetchRequest::new(&aoi, &range, 30))
            .await;
        let grid = payload.array(SURFACE_TEMP_BAND).unwrap();
        assert!(grid.values().iter().all(|v| (270.0..340.0).contains(v)));
        assert!((grid.mean() - 303.0).abs() < 2.0);
    }

    #[tokio::test]
    async fn run_seed_changes_output() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let request = FetchRequest::new(&aoi, &range, 30);
        let a = LandsatProvider::new(1, None).fetch(&request).await;
        let b = LandsatProvider::new(2, None).fetch(&request).await;
        assert_ne!(a.array(SURFACE_TEMP_BAND), b.array(SURFACE_TEMP_BAND));
    }
}
