//! Per-tile processing: fetch every provider role for one tile and reduce
//! the payloads to a [`TileFeature`].
//!
//! Tiles are independent of each other, so [`process_tile`] is the unit
//! of concurrency of a run.

use std::collections::BTreeMap;

use microclimate_features::morphology::{DEFAULT_MEAN_HEIGHT_M, DEFAULT_ORIENTATION_DEG};
use microclimate_features::{
    FeatureError, PhysicsProxies, albedo_proxy, morphology_features, ndbi, ndvi,
    summarize_street_scene, vegetation_fraction,
};
use microclimate_geography::Tile;
use microclimate_provider::registry::ProviderSet;
use microclimate_provider::{
    DataProvider, FetchRequest, Grid, Metadata, ProviderPayload, era5_land, kartaview, landsat,
    sentinel2,
};
use microclimate_tile_models::{TileFeature, TimeRange};
use serde::Serialize;

/// Resolution requested from the thermal provider, in meters.
const THERMAL_RESOLUTION_M: u32 = 30;

/// Resolution requested from the reanalysis provider.
const METEO_RESOLUTION_M: u32 = 1;

/// Air temperature used when the reanalysis grid yields no finite mean.
const DEFAULT_AIR_TEMP_C: f64 = 25.0;

/// Metadata keys that mark a payload as degraded.
const DEGRADED_KEYS: [&str; 4] = ["live_error", "stac_error", "primary_error", "delegated_from"];

/// Provider metadata of one tile, keyed by role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileMetadata {
    /// Tile the metadata belongs to.
    pub tile_id: String,
    /// Mean land surface temperature in kelvin.
    pub thermal_mean_k: f64,
    /// Metadata of every provider payload, keyed by `sentinel`,
    /// `landsat`, `meteo`, `buildings`, and `street`.
    pub provider_metadata: BTreeMap<String, Metadata>,
}

/// Everything a finished tile contributes to the run.
#[derive(Debug, Clone)]
pub struct TileOutcome {
    /// The tile's feature vector.
    pub feature: TileFeature,
    /// Provider metadata for the run summary.
    pub metadata: TileMetadata,
    /// Human-readable notes for every degraded provider call.
    pub degraded: Vec<String>,
}

/// Fetches every provider role for `tile` and computes its features.
///
/// # Errors
///
/// Returns [`FeatureError`] if a payload lacks a required grid or the
/// spectral bands do not align.
pub async fn process_tile(
    tile: &Tile,
    time_range: &TimeRange,
    resolution_m: u32,
    street_width_m: f64,
    providers: &ProviderSet,
) -> Result<TileOutcome, FeatureError> {
    let aoi = tile.to_aoi();
    let bands: Vec<String> = sentinel2::DEFAULT_BANDS.iter().map(ToString::to_string).collect();

    let request = FetchRequest::new(&aoi, time_range, resolution_m);
    let spectral = providers.spectral.fetch(&request.with_bands(&bands)).await;
    let thermal = providers
        .thermal
        .fetch(&FetchRequest::new(&aoi, time_range, THERMAL_RESOLUTION_M))
        .await;
    let meteo = providers
        .meteo
        .fetch(&FetchRequest::new(&aoi, time_range, METEO_RESOLUTION_M))
        .await;
    let buildings = providers.buildings.fetch(&request).await;
    let street = providers.street.fetch(&request).await;

    let [red, nir, swir] = sentinel2::DEFAULT_BANDS.map(|band| required(&spectral, band));
    let (red, nir, swir) = (red?, nir?, swir?);
    let ndvi = ndvi(nir, red)?;
    let ndbi = ndbi(swir, nir)?;
    let albedo = albedo_proxy(red, nir, swir)?;

    let morphology = morphology_features(&aoi, &buildings.vectors);
    let scene = summarize_street_scene(
        required(&street, kartaview::GREEN_VIEW)?,
        required(&street, kartaview::SKY_VIEW)?,
        required(&street, kartaview::FACADE)?,
    );
    let mean_ndvi = ndvi.mean();
    let physics = PhysicsProxies::compute(
        morphology.building_density,
        morphology.mean_building_height_m,
        street_width_m,
        morphology.street_orientation_deg,
        vegetation_fraction(mean_ndvi, scene.green_view_ratio),
        scene.green_view_ratio,
    );

    let (lon, lat) = tile.centroid();
    let mut feature = TileFeature {
        tile_id: tile.tile_id.clone(),
        lon,
        lat,
        ndvi: mean_ndvi,
        ndbi: ndbi.mean(),
        albedo: albedo.mean(),
        building_density: morphology.building_density,
        mean_building_height_m: morphology.mean_building_height_m,
        green_view_ratio: scene.green_view_ratio,
        street_sky_ratio: scene.street_sky_ratio,
        roughness_proxy: physics.roughness_proxy,
        canyon_aspect_ratio: physics.canyon_aspect_ratio,
        orientation_deg: morphology.street_orientation_deg,
        meteo_air_temp_c: required(&meteo, era5_land::AIR_TEMP)?.mean(),
        meteo_wind_m_s: required(&meteo, era5_land::WIND_SPEED)?.mean(),
    };
    let replaced = replace_non_finite(&mut feature);

    let thermal_mean_k = required(&thermal, landsat::SURFACE_TEMP_BAND)?.mean();

    let roles = [
        ("sentinel", spectral),
        ("landsat", thermal),
        ("meteo", meteo),
        ("buildings", buildings),
        ("street", street),
    ];
    let mut degraded: Vec<String> = roles
        .iter()
        .flat_map(|(role, payload)| degraded_notes(&tile.tile_id, role, payload))
        .collect();
    if !replaced.is_empty() {
        log::warn!(
            "Tile {} has non-finite features: {}",
            tile.tile_id,
            replaced.join(", ")
        );
        degraded.push(format!(
            "{} features: non-finite {} replaced by defaults",
            tile.tile_id,
            replaced.join(", ")
        ));
    }
    let provider_metadata = roles
        .into_iter()
        .map(|(role, payload)| (role.to_string(), payload.metadata))
        .collect();

    Ok(TileOutcome {
        feature,
        metadata: TileMetadata {
            tile_id: tile.tile_id.clone(),
            thermal_mean_k,
            provider_metadata,
        },
        degraded,
    })
}

/// Replaces NaN and infinite feature values with neutral defaults so the
/// graph and predictor only ever see finite inputs.
///
/// Returns the names of the replaced fields.
fn replace_non_finite(feature: &mut TileFeature) -> Vec<&'static str> {
    let fields: [(&'static str, &mut f64, f64); 12] = [
        ("ndvi", &mut feature.ndvi, 0.0),
        ("ndbi", &mut feature.ndbi, 0.0),
        ("albedo", &mut feature.albedo, 0.0),
        ("building_density", &mut feature.building_density, 0.0),
        (
            "mean_building_height_m",
            &mut feature.mean_building_height_m,
            DEFAULT_MEAN_HEIGHT_M,
        ),
        ("green_view_ratio", &mut feature.green_view_ratio, 0.0),
        ("street_sky_ratio", &mut feature.street_sky_ratio, 0.0),
        ("roughness_proxy", &mut feature.roughness_proxy, 0.0),
        ("canyon_aspect_ratio", &mut feature.canyon_aspect_ratio, 0.0),
        (
            "orientation_deg",
            &mut feature.orientation_deg,
            DEFAULT_ORIENTATION_DEG,
        ),
        ("meteo_air_temp_c", &mut feature.meteo_air_temp_c, DEFAULT_AIR_TEMP_C),
        ("meteo_wind_m_s", &mut feature.meteo_wind_m_s, 0.0),
    ];

    let mut replaced = Vec::new();
    for (name, value, default) in fields {
        if !value.is_finite() {
            *value = default;
            replaced.push(name);
        }
    }
    replaced
}

fn required<'a>(payload: &'a ProviderPayload, array: &str) -> Result<&'a Grid, FeatureError> {
    payload.array(array).ok_or_else(|| FeatureError::MissingArray {
        source_name: payload.source.clone(),
        array: array.to_string(),
    })
}

fn degraded_notes(tile_id: &str, role: &str, payload: &ProviderPayload) -> Vec<String> {
    DEGRADED_KEYS
        .iter()
        .filter_map(|key| {
            payload.metadata.get(*key).map(|value| {
                let value = value.as_str().map_or_else(|| value.to_string(), ToString::to_string);
                format!("{tile_id} {role} ({}): {key} {value}", payload.source)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use microclimate_geography::{AreaOfInterest, tile_aoi};
    use microclimate_provider::registry::ProviderOptions;
    use microclimate_tile_models::Bounds;

    use super::*;

    fn tile() -> Tile {
        let aoi = AreaOfInterest::from_bounds("test", Bounds::new(29.0, 41.0, 29.003, 41.003));
        tile_aoi(&aoi, 300.0).remove(0)
    }

    fn july() -> TimeRange {
        TimeRange::new(
            NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 7, 31).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn offline_tile_has_complete_features() {
        let providers = ProviderSet::from_options(&ProviderOptions::default());
        let outcome = process_tile(&tile(), &july(), 10, 18.0, &providers).await.unwrap();

        let feature = &outcome.feature;
        assert_eq!(feature.tile_id, "tile_0000");
        assert!(feature.is_finite());
        assert!((-1.0..=1.0).contains(&feature.ndvi));
        assert!((0.0..=1.0).contains(&feature.albedo));
        assert!(feature.building_density > 0.0);
        assert!((0.0..=1.0).contains(&feature.green_view_ratio));
        assert!(outcome.metadata.thermal_mean_k > 250.0);
        assert_eq!(
            outcome.metadata.provider_metadata.keys().collect::<Vec<_>>(),
            vec!["buildings", "landsat", "meteo", "sentinel", "street"]
        );
    }

    #[tokio::test]
    async fn offline_footprint_delegation_is_reported() {
        let providers = ProviderSet::from_options(&ProviderOptions::default());
        let outcome = process_tile(&tile(), &july(), 10, 18.0, &providers).await.unwrap();
        assert!(
            outcome
                .degraded
                .iter()
                .any(|note| note.starts_with("tile_0000 buildings") && note.contains("delegated_from"))
        );
    }

    #[tokio::test]
    async fn same_inputs_give_same_features() {
        let providers = ProviderSet::from_options(&ProviderOptions::default());
        let a = process_tile(&tile(), &july(), 10, 18.0, &providers).await.unwrap();
        let b = process_tile(&tile(), &july(), 10, 18.0, &providers).await.unwrap();
        assert_eq!(a.feature, b.feature);
        assert_eq!(a.metadata, b.metadata);
    }

    struct Blank;

    #[async_trait]
    impl DataProvider for Blank {
        fn id(&self) -> &'static str {
            "blank"
        }

        async fn fetch(&self, _request: &FetchRequest<'_>) -> ProviderPayload {
            ProviderPayload::new("blank")
        }

        fn attribution(&self) -> &'static str {
            ""
        }

        fn license(&self) -> &'static str {
            ""
        }
    }

    struct NanMeteo;

    #[async_trait]
    impl DataProvider for NanMeteo {
        fn id(&self) -> &'static str {
            "nan_meteo"
        }

        async fn fetch(&self, _request: &FetchRequest<'_>) -> ProviderPayload {
            ProviderPayload::new("nan_meteo")
                .with_array(era5_land::AIR_TEMP, Grid::scalar(f64::NAN))
                .with_array(era5_land::WIND_SPEED, Grid::scalar(f64::INFINITY))
        }

        fn attribution(&self) -> &'static str {
            ""
        }

        fn license(&self) -> &'static str {
            ""
        }
    }

    #[tokio::test]
    async fn non_finite_meteo_is_replaced_and_reported() {
        let mut providers = ProviderSet::from_options(&ProviderOptions::default());
        providers.meteo = Arc::new(NanMeteo);
        let outcome = process_tile(&tile(), &july(), 10, 18.0, &providers).await.unwrap();

        assert!(outcome.feature.is_finite());
        assert!((outcome.feature.meteo_air_temp_c - DEFAULT_AIR_TEMP_C).abs() < f64::EPSILON);
        assert!(outcome.feature.meteo_wind_m_s.abs() < f64::EPSILON);
        assert!(outcome.degraded.contains(
            &"tile_0000 features: non-finite meteo_air_temp_c, meteo_wind_m_s replaced by defaults"
                .to_string()
        ));
    }

    #[tokio::test]
    async fn missing_grid_is_an_error() {
        let mut providers = ProviderSet::from_options(&ProviderOptions::default());
        providers.meteo = Arc::new(Blank);
        let err = process_tile(&tile(), &july(), 10, 18.0, &providers).await.unwrap_err();
        assert!(matches!(
            err,
            FeatureError::MissingArray { ref source_name, ref array }
                if source_name == "blank" && array == era5_land::AIR_TEMP
        ));
    }
}
