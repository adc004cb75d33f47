#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Place-name resolution for microclimate analysis.
//!
//! Turns a free-text place name into an [`AreaOfInterest`]. Geocoders
//! implement [`PlaceGeocoder`]; [`resolve_place`] wraps any of them so
//! that a failure of any kind (network, rate limit, no match, offline)
//! degrades to the deterministic [`fallback_aoi`] instead of failing the
//! run.
//!
//! 1. **Nominatim / `OpenStreetMap`** ([`nominatim::NominatimGeocoder`]):
//!    free, 1 req/sec rate limit, used when live calls are enabled.
//! 2. **Offline** ([`OfflineGeocoder`]): never resolves, so every place
//!    lands on its fallback AOI.

pub mod nominatim;

use async_trait::async_trait;
use microclimate_geography::{AreaOfInterest, fallback_aoi};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The geocoder returned no match.
    #[error("No match for '{place}'")]
    NotFound {
        /// The place that could not be resolved.
        place: String,
    },

    /// Network lookups are disabled.
    #[error("Geocoding is offline")]
    Offline,
}

/// A pluggable place-name resolver.
#[async_trait]
pub trait PlaceGeocoder: Send + Sync {
    /// Short identifier used in logs and run metadata.
    fn id(&self) -> &str;

    /// Resolves `place` to an AOI.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the place cannot be resolved.
    async fn geocode(&self, place: &str) -> Result<AreaOfInterest, GeocodeError>;
}

/// Geocoder that never touches the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGeocoder;

#[async_trait]
impl PlaceGeocoder for OfflineGeocoder {
    fn id(&self) -> &'static str {
        "offline"
    }

    async fn geocode(&self, _place: &str) -> Result<AreaOfInterest, GeocodeError> {
        Err(GeocodeError::Offline)
    }
}

/// How the AOI of a run was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionSource {
    /// A geocoder matched the place.
    Geocoder,
    /// The deterministic hash-based AOI was used.
    Fallback,
}

/// Result of [`resolve_place`].
#[derive(Debug, Clone)]
pub struct ResolvedPlace {
    /// The area of interest for the run.
    pub aoi: AreaOfInterest,
    /// Whether the AOI came from a geocoder or the fallback.
    pub source: ResolutionSource,
    /// Error message when the geocoder failed.
    pub error: Option<String>,
}

/// Resolves `place` with `geocoder`, falling back to [`fallback_aoi`] on
/// any error. Never fails.
pub async fn resolve_place(place: &str, geocoder: &dyn PlaceGeocoder) -> ResolvedPlace {
    match geocoder.geocode(place).await {
        Ok(aoi) => {
            log::info!("Resolved '{place}' via {}", geocoder.id());
            ResolvedPlace {
                aoi,
                source: ResolutionSource::Geocoder,
                error: None,
            }
        }
        Err(GeocodeError::Offline) => {
            log::info!("Geocoding offline; using fallback AOI for '{place}'");
            ResolvedPlace {
                aoi: fallback_aoi(place),
                source: ResolutionSource::Fallback,
                error: None,
            }
        }
        Err(e) => {
            log::warn!(
                "Geocoding '{place}' via {} failed, using fallback AOI: {e}",
                geocoder.id()
            );
            ResolvedPlace {
                aoi: fallback_aoi(place),
                source: ResolutionSource::Fallback,
                error: Some(e.to_string()),
            }
        }
    }
}
