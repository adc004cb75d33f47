#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Payload types returned by microclimate data providers.
//!
//! Every provider produces a [`ProviderPayload`]: named numeric [`Grid`]s
//! for raster-like and sensor-like sources, `GeoJSON` features for vector
//! sources, and free-form metadata. Payloads are transient and consumed by
//! feature extraction within a single tile.

use std::collections::BTreeMap;

use serde::Serialize;

/// Free-form provider metadata, ordered for stable serialization.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Dense row-major 2-D numeric array.
///
/// Always at least 1×1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl Grid {
    /// Builds a grid by evaluating `f(row, col)` for every cell. Zero
    /// dimensions are raised to 1.
    #[must_use]
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        let mut values = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                values.push(f(row, col));
            }
        }
        Self { rows, cols, values }
    }

    /// Wraps existing row-major values. Returns `None` if the dimensions
    /// are zero or do not match the number of values.
    #[must_use]
    pub fn from_values(rows: usize, cols: usize, values: Vec<f64>) -> Option<Self> {
        (rows > 0 && cols > 0 && rows * cols == values.len()).then_some(Self { rows, cols, values })
    }

    /// A 1×1 grid holding `value`.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            rows: 1,
            cols: 1,
            values: vec![value],
        }
    }

    /// `(rows, cols)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row-major cell values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `(row, col)`, if in range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.values[row * self.cols + col])
    }

    /// Arithmetic mean of all cells.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Combines two grids cell by cell. Returns `None` on shape mismatch.
    #[must_use]
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Option<Self> {
        (self.shape() == other.shape()).then(|| Self {
            rows: self.rows,
            cols: self.cols,
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }
}

/// Attribution and license of one data source, as shown in run outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderCredit {
    /// Source name.
    pub source: String,
    /// Attribution text.
    pub attribution: String,
    /// License text.
    pub license: String,
    /// `true` for sources that contribute only when configured for the run.
    pub optional: bool,
}

/// Uniform response of every data provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPayload {
    /// Source name (e.g. `"sentinel2_l2a"`).
    pub source: String,
    /// Named numeric grids (bands or variables).
    pub arrays: BTreeMap<String, Grid>,
    /// `GeoJSON` features for vector sources.
    pub vectors: Vec<geojson::Feature>,
    /// Provenance details (seeds, live item ids, errors).
    pub metadata: Metadata,
}

impl ProviderPayload {
    /// Creates an empty payload for `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            arrays: BTreeMap::new(),
            vectors: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Adds a named grid.
    #[must_use]
    pub fn with_array(mut self, name: impl Into<String>, grid: Grid) -> Self {
        self.arrays.insert(name.into(), grid);
        self
    }

    /// Replaces the vector features.
    #[must_use]
    pub fn with_vectors(mut self, vectors: Vec<geojson::Feature>) -> Self {
        self.vectors = vectors;
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Looks up a grid by name.
    #[must_use]
    pub fn array(&self, name: &str) -> Option<&Grid> {
        self.arrays.get(name)
    }

    /// Returns `true` if the payload carries neither grids nor features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty() && self.vectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fn_never_builds_empty_grids() {
        let grid = Grid::from_fn(0, 0, |_, _| 1.0);
        assert_eq!(grid.shape(), (1, 1));
    }

    #[test]
    fn from_values_checks_length() {
        assert!(Grid::from_values(2, 2, vec![1.0, 2.0, 3.0]).is_none());
        assert!(Grid::from_values(0, 3, vec![]).is_none());
        let grid = Grid::from_values(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(grid.get(1, 0), Some(3.0));
        assert_eq!(grid.get(2, 0), None);
    }

    #[test]
    fn mean_averages_all_cells() {
        let grid = Grid::from_fn(2, 3, |r, c| (r * 3 + c) as f64);
        assert!((grid.mean() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn zip_with_rejects_mismatched_shapes() {
        let a = Grid::from_fn(2, 2, |_, _| 1.0);
        let b = Grid::from_fn(3, 2, |_, _| 1.0);
        assert!(a.zip_with(&b, |x, y| x + y).is_none());
        let sum = a.zip_with(&a, |x, y| x + y).unwrap();
        assert!(sum.values().iter().all(|&v| (v - 2.0).abs() < 1e-12));
    }

    #[test]
    fn payload_emptiness() {
        let payload = ProviderPayload::new("test").with_metadata("seed", 7);
        assert!(payload.is_empty());
        let payload = payload.with_array("x", Grid::scalar(1.0));
        assert!(!payload.is_empty());
        assert_eq!(payload.metadata["seed"], serde_json::json!(7));
    }
}
