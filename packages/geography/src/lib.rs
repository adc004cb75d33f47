#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area of interest geometry and tiling.
//!
//! An [`AreaOfInterest`] is the WGS84 polygon being analyzed. The tiler
//! splits it into a regular grid of approximately square [`Tile`]s sized in
//! meters, clipped to the AOI boundary. Distances and areas are planar in
//! degrees.

pub mod aoi;
pub mod tiling;

pub use aoi::{AreaOfInterest, DEFAULT_CRS, FALLBACK_MARGIN_DEG, fallback_aoi};
pub use tiling::{Tile, tile_aoi};
