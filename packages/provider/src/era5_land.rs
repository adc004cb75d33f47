//! ERA5-Land near-surface meteorology.
//!
//! The live path reads hourly 2 m air temperature and 10 m wind speed for
//! the tile center from an ERA5-Land reanalysis JSON archive (Open-Meteo
//! compatible) and averages them over the run window. Without live calls
//! the values are drawn from a seeded distribution typical of a warm
//! summer period.

use async_trait::async_trait;

use crate::{DataProvider, FetchRequest, Grid, ProviderError, ProviderPayload, retry, seed};

/// Source name of this provider.
pub const SOURCE: &str = "era5_land";

/// Source name reported when the synthetic fallback was used.
pub const FALLBACK_SOURCE: &str = "era5_land_fallback";

/// Default reanalysis archive endpoint.
pub const DEFAULT_ERA5_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

/// Grid name of the mean air temperature in °C.
pub const AIR_TEMP: &str = "air_temp_c";

/// Grid name of the mean wind speed in m/s.
pub const WIND_SPEED: &str = "wind_speed_m_s";

const MIN_WIND_M_S: f64 = 0.4;

/// Live endpoint configuration.
#[derive(Debug, Clone)]
pub struct ReanalysisClient {
    client: reqwest::Client,
    url: String,
}

impl ReanalysisClient {
    /// Creates a client for the archive at `url`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn means(&self, request: &FetchRequest<'_>) -> Result<HourlyMeans, ProviderError> {
        let bounds = request.aoi.bounds();
        let lon = f64::midpoint(bounds.min_lon, bounds.max_lon);
        let lat = bounds.center_lat();
        let params = [
            ("latitude", format!("{lat:.5}")),
            ("longitude", format!("{lon:.5}")),
            ("start_date", request.time_range.start().to_string()),
            ("end_date", request.time_range.end().to_string()),
            ("hourly", "temperature_2m,wind_speed_10m".to_string()),
            ("wind_speed_unit", "ms".to_string()),
            ("models", "era5_land".to_string()),
            ("timezone", "UTC".to_string()),
        ];
        let body = retry::send_json(|| self.client.get(&self.url).query(&params)).await?;
        parse_hourly(&body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HourlyMeans {
    air_temp_c: f64,
    wind_m_s: f64,
    samples: usize,
}

/// ERA5-Land provider.
#[derive(Debug, Clone)]
pub struct Era5LandProvider {
    run_seed: u64,
    live: Option<ReanalysisClient>,
}

impl Era5LandProvider {
    /// Creates a provider; `live` enables the reanalysis lookup.
    #[must_use]
    pub const fn new(run_seed: u64, live: Option<ReanalysisClient>) -> Self {
        Self { run_seed, live }
    }

    fn fallback(&self, request: &FetchRequest<'_>) -> ProviderPayload {
        let seed = seed::derive_seed(&seed::material(FALLBACK_SOURCE, self.run_seed, request, &[]));
        let mut rng = seed::rng(seed);
        let air_temp = seed::normal(&mut rng, 30.0, 1.5);
        let wind = seed::normal(&mut rng, 2.8, 0.8).max(MIN_WIND_M_S);

        ProviderPayload::new(FALLBACK_SOURCE)
            .with_array(AIR_TEMP, Grid::scalar(air_temp))
            .with_array(WIND_SPEED, Grid::scalar(wind))
            .with_metadata("source", "deterministic_fallback")
            .with_metadata("seed", seed)
    }
}

#[async_trait]
impl DataProvider for Era5LandProvider {
    fn id(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> ProviderPayload {
        let Some(client) = &self.live else {
            return self.fallback(request);
        };

        match client.means(request).await {
            Ok(means) => ProviderPayload::new(SOURCE)
                .with_array(AIR_TEMP, Grid::scalar(means.air_temp_c))
                .with_array(WIND_SPEED, Grid::scalar(means.wind_m_s.max(MIN_WIND_M_S)))
                .with_metadata("source", "era5_land_live")
                .with_metadata("sample_count", means.samples),
            Err(e) => {
                log::warn!("ERA5-Land lookup failed for {}: {e}", request.aoi.name());
                self.fallback(request)
                    .with_metadata("live_error", e.to_string())
            }
        }
    }

    fn attribution(&self) -> &'static str {
        "Copernicus Climate Change Service (C3S) ERA5-Land."
    }

    fn license(&self) -> &'static str {
        "Copernicus data license terms."
    }
}

fn parse_hourly(body: &serde_json::Value) -> Result<HourlyMeans, ProviderError> {
    let hourly = &body["hourly"];
    let (air_temp_c, temp_count) = finite_mean(&hourly["temperature_2m"]).ok_or_else(|| {
        ProviderError::Response {
            message: "reanalysis response has no temperature_2m values".to_string(),
        }
    })?;
    let (wind_m_s, _) =
        finite_mean(&hourly["wind_speed_10m"]).ok_or_else(|| ProviderError::Response {
            message: "reanalysis response has no wind_speed_10m values".to_string(),
        })?;

    Ok(HourlyMeans {
        air_temp_c,
        wind_m_s,
        samples: temp_count,
    })
}

/// Mean and count of the finite numbers in a JSON array. Nulls (missing
/// hours) are skipped.
#[allow(clippy::cast_precision_loss)]
fn finite_mean(values: &serde_json::Value) -> Option<(f64, usize)> {
    let finite: Vec<f64> = values
        .as_array()?
        .iter()
        .filter_map(serde_json::Value::as_f64)
        .filter(|v| v.is_finite())
        .collect();
    if finite.is_empty() {
        return None;
    }
    Some((finite.iter().sum::<f64>() / finite.len() as f64, finite.len()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn offline_fetch_returns_scalar_grids() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let payload = Era5LandProvider::new(42, None)
            .fetch(&FetchRequest::new(&aoi, &range, 1))
            .await;

        assert_eq!(payload.source, FALLBACK_SOURCE);
        let temp = payload.array(AIR_TEMP).unwrap();
        let wind = payload.array(WIND_SPEED).unwrap();
        assert_eq!(temp.shape(), (1, 1));
        assert_eq!(wind.shape(), (1, 1));
        assert!((20.0..40.0).contains(&temp.mean()));
        assert!(wind.mean() >= MIN_WIND_M_S);
        assert_eq!(payload.metadata["source"], json!("deterministic_fallback"));
    }

    #[test]
    fn parses_hourly_means_skipping_nulls() {
        let body = json!({
            "hourly": {
                "time": ["2025-07-01T00:00", "2025-07-01T01:00", "2025-07-01T02:00"],
                "temperature_2m": [28.0, null, 30.0],
                "wind_speed_10m": [2.0, 3.0, 4.0]
            }
        });
        let means = parse_hourly(&body).unwrap();
        assert!((means.air_temp_c - 29.0).abs() < 1e-12);
        assert!((means.wind_m_s - 3.0).abs() < 1e-12);
        assert_eq!(means.samples, 2);
    }

    #[test]
    fn rejects_empty_series() {
        let body = json!({"hourly": {"temperature_2m": [null], "wind_speed_10m": [1.0]}});
        assert!(parse_hourly(&body).is_err());
        assert!(parse_hourly(&json!({"error": true})).is_err());
    }
}
