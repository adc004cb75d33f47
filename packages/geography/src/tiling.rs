//! Regular-grid tiling of an AOI.
//!
//! Tile sizes are converted from meters to degrees at the AOI's center
//! latitude. The longitude step uses a floored cosine so that AOIs near the
//! poles do not produce runaway steps.

use geo::{Area, BooleanOps, BoundingRect, Centroid, Intersects, MultiPolygon, Rect, coord};
use microclimate_tile_models::Bounds;

use crate::AreaOfInterest;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Lower bound for `cos(latitude)` in the longitude step.
const MIN_COS_LAT: f64 = 0.2;

/// One analysis tile: a grid cell clipped to the AOI.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    /// Stable identifier (`tile_0000`, `tile_0001`, ...) in traversal order.
    pub tile_id: String,
    /// Cell geometry intersected with the AOI boundary.
    pub geometry: MultiPolygon<f64>,
}

impl Tile {
    /// Centroid as `(lon, lat)`.
    #[must_use]
    pub fn centroid(&self) -> (f64, f64) {
        self.geometry.centroid().map_or_else(
            || {
                let bounds = self.bounds();
                (
                    f64::midpoint(bounds.min_lon, bounds.max_lon),
                    bounds.center_lat(),
                )
            },
            |point| (point.x(), point.y()),
        )
    }

    /// Planar area in square degrees.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.geometry.unsigned_area()
    }

    /// Bounding box of the clipped geometry.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.geometry.bounding_rect().map_or_else(
            || Bounds::new(0.0, 0.0, 0.0, 0.0),
            |rect| Bounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y),
        )
    }

    /// Treats the tile as its own AOI for per-tile provider calls.
    #[must_use]
    pub fn to_aoi(&self) -> AreaOfInterest {
        AreaOfInterest::new(self.tile_id.clone(), self.geometry.clone())
    }
}

fn degrees_lat(tile_size_m: f64) -> f64 {
    tile_size_m / METERS_PER_DEGREE
}

fn degrees_lon(tile_size_m: f64, lat: f64) -> f64 {
    tile_size_m / (METERS_PER_DEGREE * lat.to_radians().cos().max(MIN_COS_LAT))
}

/// Splits `aoi` into approximately square tiles of `tile_size_m` meters.
///
/// Cells are walked row-major from the bounding-box min corner (rows
/// south to north, columns west to east) and capped at the bounding-box
/// max. Each cell that overlaps the AOI with positive area becomes a tile
/// whose geometry is the clipped cell. Degenerate input (empty or
/// zero-area AOI, non-positive or non-finite tile size) yields an empty
/// vector.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn tile_aoi(aoi: &AreaOfInterest, tile_size_m: f64) -> Vec<Tile> {
    if !tile_size_m.is_finite() || tile_size_m <= 0.0 {
        log::warn!("Refusing to tile '{}' with tile size {tile_size_m}", aoi.name());
        return Vec::new();
    }

    let bounds = aoi.bounds();
    let step_lon = degrees_lon(tile_size_m, bounds.center_lat());
    let step_lat = degrees_lat(tile_size_m);
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return Vec::new();
    }

    let cols = (bounds.width() / step_lon).ceil() as usize;
    let rows = (bounds.height() / step_lat).ceil() as usize;
    let boundary = aoi.boundary();

    let mut tiles = Vec::new();
    for row in 0..rows {
        let y = (row as f64).mul_add(step_lat, bounds.min_lat);
        if y >= bounds.max_lat {
            break;
        }
        for col in 0..cols {
            let x = (col as f64).mul_add(step_lon, bounds.min_lon);
            if x >= bounds.max_lon {
                break;
            }
            let cell = Rect::new(
                coord! { x: x, y: y },
                coord! {
                    x: (x + step_lon).min(bounds.max_lon),
                    y: (y + step_lat).min(bounds.max_lat),
                },
            )
            .to_polygon();

            if !cell.intersects(boundary) {
                continue;
            }
            let clipped = cell.intersection(boundary);
            if clipped.unsigned_area() <= 0.0 {
                continue;
            }
            tiles.push(Tile {
                tile_id: format!("tile_{:04}", tiles.len()),
                geometry: clipped,
            });
        }
    }

    log::debug!(
        "Tiled '{}' into {} tiles ({rows}x{cols} grid, {tile_size_m} m)",
        aoi.name(),
        tiles.len()
    );
    tiles
}

#[cfg(test)]
mod tests {
    use geo::{Contains, Polygon, polygon};

    use super::*;

    fn example_aoi() -> AreaOfInterest {
        AreaOfInterest::from_bounds("example", Bounds::new(29.009, 41.037, 29.021, 41.049))
    }

    #[test]
    fn example_box_yields_multiple_tiles() {
        let tiles = tile_aoi(&example_aoi(), 300.0);
        assert!(tiles.len() >= 4, "only {} tiles", tiles.len());
        assert!(tiles.iter().all(|t| t.area() > 0.0));
    }

    #[test]
    fn tile_ids_are_sequential_and_padded() {
        let tiles = tile_aoi(&example_aoi(), 300.0);
        for (idx, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.tile_id, format!("tile_{idx:04}"));
        }
        assert_eq!(tiles[0].tile_id, "tile_0000");
    }

    #[test]
    fn tiles_cover_rectangular_aoi() {
        let aoi = example_aoi();
        let total: f64 = tile_aoi(&aoi, 300.0).iter().map(Tile::area).sum();
        assert!((total - aoi.area()).abs() / aoi.area() < 1e-6);
    }

    #[test]
    fn tiles_are_clipped_to_irregular_aoi() {
        let triangle: Polygon<f64> = polygon![
            (x: 10.0, y: 50.0),
            (x: 10.02, y: 50.0),
            (x: 10.0, y: 50.02),
            (x: 10.0, y: 50.0),
        ];
        let aoi = AreaOfInterest::new("triangle", triangle.clone());
        let tiles = tile_aoi(&aoi, 250.0);
        assert!(!tiles.is_empty());

        let total: f64 = tiles.iter().map(Tile::area).sum();
        assert!((total - aoi.area()).abs() / aoi.area() < 1e-6);

        for tile in &tiles {
            let (lon, lat) = tile.centroid();
            assert!(triangle.contains(&geo::Point::new(lon, lat)) || tile.area() < 1e-8);
        }
    }

    #[test]
    fn first_row_runs_west_to_east() {
        let tiles = tile_aoi(&example_aoi(), 300.0);
        let (first_lon, first_lat) = tiles[0].centroid();
        let (second_lon, second_lat) = tiles[1].centroid();
        assert!(second_lon > first_lon);
        assert!((second_lat - first_lat).abs() < 1e-9);
    }

    #[test]
    fn oversized_tile_covers_whole_aoi() {
        let aoi = example_aoi();
        let tiles = tile_aoi(&aoi, 50_000.0);
        assert_eq!(tiles.len(), 1);
        assert!((tiles[0].area() - aoi.area()).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs_return_empty() {
        let flat = AreaOfInterest::from_bounds("flat", Bounds::new(1.0, 1.0, 1.0, 1.0));
        assert!(tile_aoi(&flat, 300.0).is_empty());
        assert!(tile_aoi(&example_aoi(), 0.0).is_empty());
        assert!(tile_aoi(&example_aoi(), -10.0).is_empty());
        assert!(tile_aoi(&example_aoi(), f64::NAN).is_empty());
    }

    #[test]
    fn polar_aoi_uses_floored_cosine() {
        let polar = AreaOfInterest::from_bounds("polar", Bounds::new(0.0, 89.0, 0.05, 89.01));
        let tiles = tile_aoi(&polar, 300.0);
        // floor of 0.2 gives ~0.0135 degrees per column at this size
        assert!(tiles.len() >= 4);
    }
}
