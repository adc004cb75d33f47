//! Spectral indices over reflectance grids.

use microclimate_provider_models::Grid;

use crate::FeatureError;

/// Denominators smaller than this in magnitude are replaced by it.
const MIN_DENOMINATOR: f64 = 1e-6;

/// Normalized difference vegetation index, `(nir - red) / (nir + red)`.
///
/// # Errors
///
/// Returns [`FeatureError::ShapeMismatch`] if the grids differ in shape.
pub fn ndvi(nir: &Grid, red: &Grid) -> Result<Grid, FeatureError> {
    normalized_difference(nir, red)
}

/// Normalized difference built-up index, `(swir - nir) / (swir + nir)`.
///
/// # Errors
///
/// Returns [`FeatureError::ShapeMismatch`] if the grids differ in shape.
pub fn ndbi(swir: &Grid, nir: &Grid) -> Result<Grid, FeatureError> {
    normalized_difference(swir, nir)
}

/// Broad-band albedo proxy, `clamp(0.3 red + 0.3 nir + 0.4 swir, 0, 1)`.
///
/// # Errors
///
/// Returns [`FeatureError::ShapeMismatch`] if the grids differ in shape.
pub fn albedo_proxy(red: &Grid, nir: &Grid, swir: &Grid) -> Result<Grid, FeatureError> {
    let visible_nir = zip(red, nir, |r, n| 0.3f64.mul_add(r, 0.3 * n))?;
    zip(&visible_nir, swir, |rn, s| 0.4f64.mul_add(s, rn).clamp(0.0, 1.0))
}

fn normalized_difference(a: &Grid, b: &Grid) -> Result<Grid, FeatureError> {
    zip(a, b, |x, y| {
        let mut denominator = x + y;
        if denominator.abs() < MIN_DENOMINATOR {
            denominator = MIN_DENOMINATOR;
        }
        ((x - y) / denominator).clamp(-1.0, 1.0)
    })
}

fn zip(a: &Grid, b: &Grid, f: impl Fn(f64, f64) -> f64) -> Result<Grid, FeatureError> {
    a.zip_with(b, f).ok_or(FeatureError::ShapeMismatch {
        left: a.shape(),
        right: b.shape(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(values: &[f64]) -> Grid {
        Grid::from_values(1, values.len(), values.to_vec()).unwrap()
    }

    #[test]
    fn ndvi_of_vegetation_is_positive() {
        let result = ndvi(&grid(&[0.5, 0.3]), &grid(&[0.1, 0.3])).unwrap();
        assert!((result.values()[0] - 0.4 / 0.6).abs() < 1e-12);
        assert!(result.values()[1].abs() < 1e-12);
    }

    #[test]
    fn ndbi_of_built_surface_is_positive() {
        let result = ndbi(&grid(&[0.4]), &grid(&[0.2])).unwrap();
        assert!((result.values()[0] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn tiny_denominator_stays_bounded() {
        let result = ndvi(&grid(&[1e-7, 0.0]), &grid(&[0.0, 0.0])).unwrap();
        assert!(result.values().iter().all(|v| (-1.0..=1.0).contains(v)));
        assert!((result.values()[0] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn opposite_sign_reflectance_is_clamped() {
        let result = ndvi(&grid(&[0.5]), &grid(&[-0.49])).unwrap();
        assert!((result.values()[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn albedo_is_weighted_and_clamped() {
        let result = albedo_proxy(&grid(&[0.1, 2.0]), &grid(&[0.2, 2.0]), &grid(&[0.3, 2.0])).unwrap();
        assert!((result.values()[0] - 0.21).abs() < 1e-12);
        assert!((result.values()[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let a = Grid::from_fn(2, 2, |_, _| 0.1);
        let b = Grid::from_fn(3, 3, |_, _| 0.1);
        assert!(matches!(
            ndvi(&a, &b),
            Err(FeatureError::ShapeMismatch { left: (2, 2), right: (3, 3) })
        ));
    }
}
