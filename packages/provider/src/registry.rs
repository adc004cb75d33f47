//! Builds the provider set a run uses.
//!
//! Mirrors the environment-driven provider selection of an analysis run:
//! live endpoints are only wired in when live calls are enabled, and the
//! street provider switches to Mapillary when an access token is present.

use std::sync::Arc;
use std::time::Duration;

use microclimate_provider_models::ProviderCredit;

use crate::era5_land::{self, Era5LandProvider, ReanalysisClient};
use crate::fallback::FallbackChain;
use crate::kartaview::KartaViewProvider;
use crate::landsat::LandsatProvider;
use crate::mapillary::{self, MapillaryClient, MapillaryProvider};
use crate::open_buildings::OpenBuildingsProvider;
use crate::osm_buildings::{self, OsmBuildingsProvider};
use crate::sentinel2::Sentinel2Provider;
use crate::stac::{self, StacClient};
use crate::{DataProvider, http_client};

/// Everything needed to construct the providers of a run.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    /// Run seed mixed into every fallback seed.
    pub seed: u64,
    /// Enables the live paths.
    pub live_calls: bool,
    /// User agent of live HTTP requests.
    pub user_agent: String,
    /// Per-request timeout of live HTTP requests.
    pub timeout: Duration,
    /// STAC API root.
    pub stac_url: String,
    /// ERA5-Land archive endpoint.
    pub era5_url: String,
    /// Overpass interpreter endpoint.
    pub overpass_url: String,
    /// Mapillary images endpoint.
    pub mapillary_url: String,
    /// Mapillary token; selects Mapillary as the street provider.
    pub mapillary_access_token: Option<String>,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            live_calls: false,
            user_agent: concat!("microclimate/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(20),
            stac_url: stac::DEFAULT_STAC_URL.to_string(),
            era5_url: era5_land::DEFAULT_ERA5_URL.to_string(),
            overpass_url: osm_buildings::DEFAULT_OVERPASS_URL.to_string(),
            mapillary_url: mapillary::DEFAULT_MAPILLARY_URL.to_string(),
            mapillary_access_token: None,
        }
    }
}

/// The five provider roles a tile needs.
#[derive(Clone)]
pub struct ProviderSet {
    /// Multispectral reflectance (Sentinel-2).
    pub spectral: Arc<dyn DataProvider>,
    /// Land surface temperature (Landsat).
    pub thermal: Arc<dyn DataProvider>,
    /// Air temperature and wind (ERA5-Land).
    pub meteo: Arc<dyn DataProvider>,
    /// Building footprints (OSM, falling back to Open Buildings).
    pub buildings: Arc<dyn DataProvider>,
    /// Street scene ratios (Mapillary or KartaView).
    pub street: Arc<dyn DataProvider>,
    seed: u64,
    credits: Vec<ProviderCredit>,
}

impl ProviderSet {
    /// Builds the providers for `options`.
    ///
    /// If the HTTP client cannot be built, live calls are disabled and a
    /// warning is logged; construction itself never fails.
    #[must_use]
    pub fn from_options(options: &ProviderOptions) -> Self {
        let client = if options.live_calls {
            match http_client(&options.user_agent, options.timeout) {
                Ok(client) => Some(client),
                Err(e) => {
                    log::warn!("Live provider calls disabled: {e}");
                    None
                }
            }
        } else {
            None
        };
        let seed = options.seed;

        let stac = client
            .as_ref()
            .map(|c| StacClient::new(c.clone(), options.stac_url.clone()));
        let spectral = Arc::new(Sentinel2Provider::new(seed, stac.clone()));
        let thermal = Arc::new(LandsatProvider::new(seed, stac));
        let meteo = Arc::new(Era5LandProvider::new(
            seed,
            client
                .as_ref()
                .map(|c| ReanalysisClient::new(c.clone(), options.era5_url.clone())),
        ));

        let osm = Arc::new(client.as_ref().map_or_else(OsmBuildingsProvider::offline, |c| {
            OsmBuildingsProvider::live(c.clone(), options.overpass_url.clone())
        }));
        let open_buildings = Arc::new(OpenBuildingsProvider::new(seed));

        let kartaview = Arc::new(KartaViewProvider::new(seed));
        let mapillary = options
            .mapillary_access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                Arc::new(MapillaryProvider::new(
                    seed,
                    client.as_ref().map(|c| {
                        MapillaryClient::new(c.clone(), options.mapillary_url.clone(), token)
                    }),
                ))
            });
        let street: Arc<dyn DataProvider> = match &mapillary {
            Some(mapillary) => mapillary.clone(),
            None => kartaview.clone(),
        };

        // Both street sources are always credited; the one not serving
        // this run is marked optional.
        let mapillary_credit = MapillaryProvider::new(seed, None);
        let credited: [(&dyn DataProvider, bool); 7] = [
            (spectral.as_ref(), false),
            (thermal.as_ref(), false),
            (meteo.as_ref(), false),
            (osm.as_ref(), false),
            (open_buildings.as_ref(), false),
            (kartaview.as_ref(), mapillary.is_some()),
            (&mapillary_credit, mapillary.is_none()),
        ];
        let credits = credited
            .iter()
            .map(|(p, optional)| ProviderCredit {
                source: p.id().to_string(),
                attribution: p.attribution().to_string(),
                license: p.license().to_string(),
                optional: *optional,
            })
            .collect();

        log::debug!(
            "Provider set: live={}, street={}",
            client.is_some(),
            street.id()
        );

        Self {
            spectral,
            thermal,
            meteo,
            buildings: Arc::new(FallbackChain::new(osm, open_buildings)),
            street,
            seed,
            credits,
        }
    }

    /// Run seed the providers were built with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Attribution and license of every underlying source.
    #[must_use]
    pub fn credits(&self) -> &[ProviderCredit] {
        &self.credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FetchRequest, test_support};

    #[test]
    fn default_set_uses_kartaview() {
        let set = ProviderSet::from_options(&ProviderOptions::default());
        assert_eq!(set.street.id(), "kartaview");
        assert_eq!(set.buildings.id(), "osm_buildings");
        let sources: Vec<&str> = set.credits().iter().map(|c| c.source.as_str()).collect();
        assert_eq!(
            sources,
            vec![
                "sentinel2_l2a",
                "landsat_l2_st",
                "era5_land",
                "osm_buildings",
                "open_buildings",
                "kartaview",
                "mapillary"
            ]
        );
        let optional: Vec<&str> = set
            .credits()
            .iter()
            .filter(|c| c.optional)
            .map(|c| c.source.as_str())
            .collect();
        assert_eq!(optional, vec!["mapillary"]);
        assert_eq!(set.seed(), 42);
    }

    #[test]
    fn mapillary_set_keeps_kartaview_credit_as_optional() {
        let options = ProviderOptions {
            seed: 9,
            mapillary_access_token: Some("MLY|123".to_string()),
            ..ProviderOptions::default()
        };
        let set = ProviderSet::from_options(&options);
        let optional: Vec<&str> = set
            .credits()
            .iter()
            .filter(|c| c.optional)
            .map(|c| c.source.as_str())
            .collect();
        assert_eq!(optional, vec!["kartaview"]);
        assert_eq!(set.credits().len(), 7);
        assert_eq!(set.seed(), 9);
    }

    #[test]
    fn token_selects_mapillary() {
        let options = ProviderOptions {
            mapillary_access_token: Some("MLY|123".to_string()),
            ..ProviderOptions::default()
        };
        assert_eq!(ProviderSet::from_options(&options).street.id(), "mapillary");

        let blank = ProviderOptions {
            mapillary_access_token: Some("  ".to_string()),
            ..ProviderOptions::default()
        };
        assert_eq!(ProviderSet::from_options(&blank).street.id(), "kartaview");
    }

    #[tokio::test]
    async fn every_role_produces_data_offline() {
        let set = ProviderSet::from_options(&ProviderOptions::default());
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let request = FetchRequest::new(&aoi, &range, 10);

        for provider in [&set.spectral, &set.thermal, &set.meteo, &set.buildings, &set.street] {
            provider.authenticate().await.unwrap();
            let payload = provider.fetch(&request).await;
            assert!(!payload.is_empty(), "{} returned an empty payload", provider.id());
            assert!(!provider.attribution().is_empty());
            assert!(!provider.license().is_empty());
        }
    }
}
