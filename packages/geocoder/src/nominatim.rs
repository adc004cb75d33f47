//! Nominatim / `OpenStreetMap` place geocoder.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum on
//! the public instance, and every request must carry an identifying user
//! agent. The resolved point is boxed by a fixed margin to form the AOI.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::time::{Duration, Instant};

use async_trait::async_trait;
use microclimate_geography::{AreaOfInterest, FALLBACK_MARGIN_DEG};
use tokio::sync::Mutex;

use crate::{GeocodeError, PlaceGeocoder};

/// Public Nominatim search endpoint.
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Minimum delay between two requests to the same instance.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(1);

/// A point match returned by Nominatim.
#[derive(Debug, Clone, PartialEq)]
pub struct NominatimMatch {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Canonical place name returned by the service.
    pub display_name: Option<String>,
}

/// Free-form Nominatim geocoder.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    margin_deg: f64,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    /// Creates a geocoder for `base_url` that identifies itself with
    /// `user_agent` and gives up on requests after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            margin_deg: FALLBACK_MARGIN_DEG,
            last_request: Mutex::new(None),
        })
    }

    /// Looks up the best point match for a free-form query.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
    pub async fn search(&self, query: &str) -> Result<Option<NominatimMatch>, GeocodeError> {
        self.wait_for_slot().await;

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.error_for_status()?.json().await?;
        parse_response(&body)
    }

    async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl PlaceGeocoder for NominatimGeocoder {
    fn id(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, place: &str) -> Result<AreaOfInterest, GeocodeError> {
        let found = self
            .search(place)
            .await?
            .ok_or_else(|| GeocodeError::NotFound {
                place: place.to_string(),
            })?;

        log::debug!(
            "Nominatim matched '{place}' to {:?} at ({}, {})",
            found.display_name,
            found.longitude,
            found.latitude
        );

        Ok(AreaOfInterest::around_point(
            place,
            found.longitude,
            found.latitude,
            self.margin_deg,
        ))
    }
}

/// Parses Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<NominatimMatch>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let latitude = first["lat"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Nominatim response".to_string(),
        })?;

    let longitude = first["lon"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lon in Nominatim response".to_string(),
        })?;

    Ok(Some(NominatimMatch {
        latitude,
        longitude,
        display_name: first["display_name"].as_str().map(String::from),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "41.0430",
            "lon": "29.0150",
            "display_name": "Beşiktaş, İstanbul, Türkiye"
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.latitude - 41.043).abs() < 1e-9);
        assert!((result.longitude - 29.015).abs() < 1e-9);
        assert_eq!(
            result.display_name.as_deref(),
            Some("Beşiktaş, İstanbul, Türkiye")
        );
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_non_array_body() {
        let body = serde_json::json!({"error": "Unable to geocode"});
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_missing_coordinates() {
        let body = serde_json::json!([{"lat": "41.0"}]);
        assert!(parse_response(&body).is_err());
    }
}
