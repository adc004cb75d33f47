#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the microclimate tile pipeline.
//!
//! These are the plain records that flow between the tiler, the feature
//! extractors, the neighbor graph, and the scoring engine, and that are
//! handed to downstream serialization. They carry no pipeline logic of
//! their own.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Axis-aligned bounding box in geographic coordinates (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    /// Western edge (minimum longitude).
    pub min_lon: f64,
    /// Southern edge (minimum latitude).
    pub min_lat: f64,
    /// Eastern edge (maximum longitude).
    pub max_lon: f64,
    /// Northern edge (maximum latitude).
    pub max_lat: f64,
}

impl Bounds {
    /// Creates a bounding box from its four edges.
    #[must_use]
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Latitude of the vertical center of the box.
    #[must_use]
    pub fn center_lat(&self) -> f64 {
        f64::midpoint(self.min_lat, self.max_lat)
    }

    /// Width in degrees of longitude.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees of latitude.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Stable textual form used as hashing material.
    ///
    /// Fixed precision keeps the string identical across platforms and
    /// releases for the same coordinates.
    #[must_use]
    pub fn canonical(&self) -> String {
        format!(
            "{:.9},{:.9},{:.9},{:.9}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Returned when a [`TimeRange`] would end before it starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid time range: start {start} is after end {end}")]
pub struct InvalidTimeRange {
    /// Requested start date.
    pub start: NaiveDate,
    /// Requested end date.
    pub end: NaiveDate,
}

/// Inclusive calendar date interval shared by every provider call of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = InvalidTimeRange;

    fn try_from(raw: RawTimeRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl TimeRange {
    /// Creates a time range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTimeRange`] if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidTimeRange> {
        if start > end {
            return Err(InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// First day of the range.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range (inclusive).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// STAC-compatible datetime interval covering both days fully.
    #[must_use]
    pub fn iso_interval(&self) -> String {
        format!("{}T00:00:00Z/{}T23:59:59Z", self.start, self.end)
    }
}

/// Fixed-shape feature vector for one tile.
///
/// All fields are finite. Ratios that are bounded by definition
/// (`green_view_ratio`, `street_sky_ratio`, `building_density`) stay
/// within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileFeature {
    /// Identifier of the tile this feature belongs to.
    pub tile_id: String,
    /// Centroid longitude.
    pub lon: f64,
    /// Centroid latitude.
    pub lat: f64,
    /// Mean normalized difference vegetation index.
    pub ndvi: f64,
    /// Mean normalized difference built-up index.
    pub ndbi: f64,
    /// Mean broad-band albedo proxy.
    pub albedo: f64,
    /// Fraction of the tile covered by building footprints.
    pub building_density: f64,
    /// Mean building height in meters.
    pub mean_building_height_m: f64,
    /// Share of vegetation in street-level views.
    pub green_view_ratio: f64,
    /// Share of sky in street-level views.
    pub street_sky_ratio: f64,
    /// Aerodynamic roughness proxy.
    pub roughness_proxy: f64,
    /// Building height over street width.
    pub canyon_aspect_ratio: f64,
    /// Mean street orientation in degrees.
    pub orientation_deg: f64,
    /// Reanalysis air temperature in degrees Celsius.
    pub meteo_air_temp_c: f64,
    /// Reanalysis wind speed in meters per second.
    pub meteo_wind_m_s: f64,
}

impl TileFeature {
    /// Returns `true` if every numeric field is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [
            self.lon,
            self.lat,
            self.ndvi,
            self.ndbi,
            self.albedo,
            self.building_density,
            self.mean_building_height_m,
            self.green_view_ratio,
            self.street_sky_ratio,
            self.roughness_proxy,
            self.canyon_aspect_ratio,
            self.orientation_deg,
            self.meteo_air_temp_c,
            self.meteo_wind_m_s,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Scoring output for one tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPrediction {
    /// Identifier of the scored tile.
    pub tile_id: String,
    /// Estimated surface temperature anomaly in degrees Celsius.
    pub temperature_anomaly_c: f64,
    /// Ventilation score in `[0, 1]`; higher means better airflow.
    pub ventilation_score: f64,
}

/// A tile that is both thermally favorable and well ventilated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoolRefuge {
    /// Identifier of the refuge tile.
    pub tile_id: String,
    /// Ranking score rounded to three decimals; higher is cooler.
    pub cool_refuge_rank: f64,
}

/// Urgency of a tree-planting recommendation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    /// Moderate anomaly.
    Medium,
    /// Strong anomaly.
    High,
}

/// Tile-level canopy expansion recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreePlantingRecommendation {
    /// Identifier of the recommended tile.
    pub tile_id: String,
    /// Urgency of the intervention.
    pub priority: Priority,
    /// Suggested number of trees to plant.
    pub recommended_tree_count: u32,
    /// Short human-readable justification.
    pub rationale: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn time_range_rejects_reversed_dates() {
        let err = TimeRange::new(date("2025-07-31"), date("2025-07-01")).unwrap_err();
        assert_eq!(err.start, date("2025-07-31"));
    }

    #[test]
    fn time_range_allows_single_day() {
        let range = TimeRange::new(date("2025-07-01"), date("2025-07-01")).unwrap();
        assert_eq!(range.start(), range.end());
    }

    #[test]
    fn iso_interval_covers_full_days() {
        let range = TimeRange::new(date("2025-07-01"), date("2025-07-03")).unwrap();
        assert_eq!(
            range.iso_interval(),
            "2025-07-01T00:00:00Z/2025-07-03T23:59:59Z"
        );
    }

    #[test]
    fn time_range_deserialization_validates() {
        let ok: Result<TimeRange, _> =
            serde_json::from_str(r#"{"start":"2025-07-01","end":"2025-07-02"}"#);
        assert!(ok.is_ok());
        let bad: Result<TimeRange, _> =
            serde_json::from_str(r#"{"start":"2025-07-03","end":"2025-07-02"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn canonical_bounds_are_fixed_precision() {
        let bounds = Bounds::new(29.009, 41.037, 29.021, 41.049);
        assert_eq!(
            bounds.canonical(),
            "29.009000000,41.037000000,29.021000000,41.049000000"
        );
        assert!((bounds.center_lat() - 41.043).abs() < 1e-12);
    }

    #[test]
    fn priority_serializes_snake_case() {
        assert_eq!(Priority::High.to_string(), "high");
        assert_eq!(
            serde_json::to_string(&Priority::Medium).unwrap(),
            "\"medium\""
        );
    }
}
