#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Environmental data providers for microclimate analysis.
//!
//! Each data source implements the [`DataProvider`] trait. A provider has
//! an optional *live* path (STAC search, reanalysis API, Overpass,
//! Mapillary) that only runs when live calls are enabled and any required
//! credential is present, and a *deterministic synthetic fallback* that
//! always succeeds. Live failures are logged and never surfaced: `fetch`
//! is infallible by construction.
//!
//! Fallback output is seeded from a hash of the semantically relevant
//! request inputs (see [`seed`]), so identical requests produce identical
//! payloads across processes and machines.

pub mod era5_land;
pub mod fallback;
pub mod footprints;
pub mod kartaview;
pub mod landsat;
pub mod mapillary;
pub mod open_buildings;
pub mod osm_buildings;
pub mod registry;
pub mod retry;
pub mod seed;
pub mod sentinel2;
pub mod stac;

use std::time::Duration;

use async_trait::async_trait;
use microclimate_geography::AreaOfInterest;
use microclimate_tile_models::TimeRange;

pub use microclimate_provider_models::{Grid, Metadata, ProviderPayload};

/// Errors raised on the live paths of providers.
///
/// These never escape [`DataProvider::fetch`]; they are logged and
/// recorded in payload metadata before the synthetic fallback is used.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The remote service answered with something unusable.
    #[error("Unexpected response: {message}")]
    Response {
        /// Description of what went wrong.
        message: String,
    },
}

/// Inputs of a single provider call.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    /// Area to fetch data for (usually a single tile).
    pub aoi: &'a AreaOfInterest,
    /// Inclusive date window shared by the whole run.
    pub time_range: &'a TimeRange,
    /// Target ground resolution in meters.
    pub resolution_m: u32,
    /// Requested bands; `None` selects the provider default.
    pub bands: Option<&'a [String]>,
}

impl<'a> FetchRequest<'a> {
    /// Creates a request with the provider's default bands.
    #[must_use]
    pub const fn new(aoi: &'a AreaOfInterest, time_range: &'a TimeRange, resolution_m: u32) -> Self {
        Self {
            aoi,
            time_range,
            resolution_m,
            bands: None,
        }
    }

    /// Selects specific bands.
    #[must_use]
    pub const fn with_bands(mut self, bands: &'a [String]) -> Self {
        self.bands = Some(bands);
        self
    }
}

/// Trait that all environmental data providers implement.
///
/// `fetch` must return a well-formed payload for any syntactically valid
/// request, even with no network access and no credentials.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Source identifier (e.g., `"sentinel2_l2a"`).
    fn id(&self) -> &str;

    /// Performs any session setup the provider needs before fetching.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the handshake fails.
    async fn authenticate(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Fetches grids and/or vectors for the request.
    async fn fetch(&self, request: &FetchRequest<'_>) -> ProviderPayload;

    /// Attribution string to show alongside derived outputs.
    fn attribution(&self) -> &str;

    /// Data license string.
    fn license(&self) -> &str;
}

/// Builds the HTTP client used by live provider paths.
///
/// # Errors
///
/// Returns [`ProviderError::Http`] if the client cannot be constructed.
pub fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}

/// Side length of a square raster for `resolution_m`, floored at
/// `min_side` so small resolutions never collapse the grid.
#[must_use]
pub(crate) fn raster_side(resolution_m: u32, min_side: usize) -> usize {
    let per_side = 600 / resolution_m.max(1);
    usize::try_from(per_side).map_or(min_side, |side| side.max(min_side))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_side_scales_inversely_with_resolution() {
        assert_eq!(raster_side(10, 16), 60);
        assert_eq!(raster_side(60, 16), 16);
        assert_eq!(raster_side(250, 16), 16);
    }

    #[test]
    fn raster_side_handles_zero_resolution() {
        assert_eq!(raster_side(0, 8), 600);
    }
}
