//! Area of interest type and the deterministic offline fallback.

use geo::{Area, BoundingRect, MultiPolygon, Rect, coord};
use microclimate_tile_models::Bounds;
use sha2::{Digest, Sha256};

/// Coordinate reference system of every AOI produced by this crate.
pub const DEFAULT_CRS: &str = "EPSG:4326";

/// Half-width in degrees of the box drawn around a resolved point.
pub const FALLBACK_MARGIN_DEG: f64 = 0.006;

/// Demo places pinned to fixed coordinates so offline runs land somewhere
/// meaningful. Keys are lowercased with spaces replaced by underscores.
const KNOWN_PLACES: &[(&str, f64, f64)] = &[
    ("istanbul_besiktas", 29.015, 41.043),
    ("besiktas", 29.015, 41.043),
];

/// The geographic area being analyzed.
///
/// Immutable once created; the boundary is in geographic coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    name: String,
    boundary: MultiPolygon<f64>,
    crs: String,
}

impl AreaOfInterest {
    /// Creates an AOI from any polygonal boundary.
    #[must_use]
    pub fn new(name: impl Into<String>, boundary: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            name: name.into(),
            boundary: boundary.into(),
            crs: DEFAULT_CRS.to_string(),
        }
    }

    /// Creates a rectangular AOI covering `bounds`.
    #[must_use]
    pub fn from_bounds(name: impl Into<String>, bounds: Bounds) -> Self {
        let rect = Rect::new(
            coord! { x: bounds.min_lon, y: bounds.min_lat },
            coord! { x: bounds.max_lon, y: bounds.max_lat },
        );
        Self::new(name, rect.to_polygon())
    }

    /// Creates a square AOI of half-width `margin_deg` centered on a point.
    #[must_use]
    pub fn around_point(name: impl Into<String>, lon: f64, lat: f64, margin_deg: f64) -> Self {
        Self::from_bounds(
            name,
            Bounds::new(
                lon - margin_deg,
                lat - margin_deg,
                lon + margin_deg,
                lat + margin_deg,
            ),
        )
    }

    /// Name of the place or tile this AOI stands for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Boundary geometry.
    #[must_use]
    pub const fn boundary(&self) -> &MultiPolygon<f64> {
        &self.boundary
    }

    /// Coordinate reference system identifier.
    #[must_use]
    pub fn crs(&self) -> &str {
        &self.crs
    }

    /// Bounding box of the boundary. An empty boundary yields a zero box.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.boundary.bounding_rect().map_or_else(
            || Bounds::new(0.0, 0.0, 0.0, 0.0),
            |rect| Bounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y),
        )
    }

    /// Planar area in square degrees.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.boundary.unsigned_area()
    }
}

/// Builds a deterministic AOI for `place` without any network access.
///
/// The place string is hashed into a pseudo-random point with longitude in
/// `[-180, 180]` and latitude in `[-60, 60]`, then boxed by
/// [`FALLBACK_MARGIN_DEG`]. The same place always yields the same AOI.
#[must_use]
pub fn fallback_aoi(place: &str) -> AreaOfInterest {
    let (lon, lat) = known_place(place).unwrap_or_else(|| hashed_point(place));
    log::debug!("Fallback AOI for '{place}' centered at ({lon:.6}, {lat:.6})");
    AreaOfInterest::around_point(place, lon, lat, FALLBACK_MARGIN_DEG)
}

fn known_place(place: &str) -> Option<(f64, f64)> {
    let key = place.to_lowercase().replace(' ', "_");
    KNOWN_PLACES
        .iter()
        .find(|(name, _, _)| *name == key)
        .map(|&(_, lon, lat)| (lon, lat))
}

fn hashed_point(place: &str) -> (f64, f64) {
    let digest = Sha256::digest(place.as_bytes());
    let lon_word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let lat_word = u32::from_be_bytes([digest[4], digest[5], digest[6], digest[7]]);
    let max = f64::from(u32::MAX);
    let lon = (f64::from(lon_word) / max).mul_add(360.0, -180.0);
    let lat = (f64::from(lat_word) / max).mul_add(120.0, -60.0);
    (lon, lat)
}
