#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pure feature extraction for microclimate tiles.
//!
//! Every function here is deterministic and free of I/O. Inputs are the
//! grids and vectors that providers return for one tile; outputs are the
//! scalar components of a tile's feature vector.

pub mod morphology;
pub mod physics;
pub mod spectral;
pub mod street_scene;

pub use morphology::{Morphology, morphology_features};
pub use physics::{DEFAULT_STREET_WIDTH_M, PhysicsProxies};
pub use spectral::{albedo_proxy, ndbi, ndvi};
pub use street_scene::{StreetScene, summarize_street_scene};

/// Errors from feature extraction.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// Two band grids that must align have different shapes.
    #[error("Grid shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch {
        /// Shape of the first grid.
        left: (usize, usize),
        /// Shape of the second grid.
        right: (usize, usize),
    },

    /// A provider payload lacks a grid the extractor needs.
    #[error("Payload from '{source_name}' has no '{array}' grid")]
    MissingArray {
        /// Source of the payload.
        source_name: String,
        /// Name of the missing grid.
        array: String,
    },
}

/// Share of the tile covered by vegetation, blending the spectral signal
/// (weight 0.6) with the street-level green view (weight 0.4).
#[must_use]
pub fn vegetation_fraction(mean_ndvi: f64, green_view_ratio: f64) -> f64 {
    mean_ndvi
        .mul_add(0.6, green_view_ratio * 0.4)
        .clamp(0.0, 1.0)
}
