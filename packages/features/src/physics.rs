//! Closed-form urban climate proxies.
//!
//! The constants are calibrated for plausibility, not derived from
//! physics. Treat the outputs as interpretable heuristics.

use serde::Serialize;

/// Street width assumed when none is configured, in meters.
pub const DEFAULT_STREET_WIDTH_M: f64 = 18.0;

const MIN_STREET_WIDTH_M: f64 = 2.0;

/// Derived proxies for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhysicsProxies {
    /// Building height over street width.
    pub canyon_aspect_ratio: f64,
    /// Visible sky share implied by the canyon, in `[0.05, 1]`.
    pub sky_view_factor_proxy: f64,
    /// Density-weighted height.
    pub roughness_proxy: f64,
    /// Obstruction to airflow.
    pub ventilation_barrier_proxy: f64,
    /// 0 for streets at 90°, 1 for streets aligned with 0°/180°.
    pub orientation_factor: f64,
    /// Blend of vegetation cover and street-level greenery.
    pub vegetation_cooling_proxy: f64,
}

impl PhysicsProxies {
    /// Computes every proxy from tile morphology and vegetation inputs.
    #[must_use]
    pub fn compute(
        building_density: f64,
        mean_building_height_m: f64,
        street_width_m: f64,
        street_orientation_deg: f64,
        vegetation_fraction: f64,
        green_view_ratio: f64,
    ) -> Self {
        let canyon_aspect_ratio = mean_building_height_m / street_width_m.max(MIN_STREET_WIDTH_M);
        let sky_view_factor_proxy = (1.0 - (canyon_aspect_ratio * 0.6).min(0.95)).max(0.05);
        let roughness_proxy = building_density * mean_building_height_m / 25.0;
        let ventilation_barrier_proxy = (1.0 - sky_view_factor_proxy) * (1.0 + roughness_proxy);
        let orientation_factor = (street_orientation_deg.rem_euclid(180.0) - 90.0).abs() / 90.0;
        let vegetation_cooling_proxy = 0.5f64.mul_add(vegetation_fraction, 0.5 * green_view_ratio);

        Self {
            canyon_aspect_ratio,
            sky_view_factor_proxy,
            roughness_proxy,
            ventilation_barrier_proxy,
            orientation_factor,
            vegetation_cooling_proxy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typical_street_canyon() {
        let p = PhysicsProxies::compute(0.5, 18.0, DEFAULT_STREET_WIDTH_M, 45.0, 0.3, 0.2);
        assert!((p.canyon_aspect_ratio - 1.0).abs() < 1e-12);
        assert!((p.sky_view_factor_proxy - 0.4).abs() < 1e-12);
        assert!((p.roughness_proxy - 0.36).abs() < 1e-12);
        assert!((p.ventilation_barrier_proxy - 0.6 * 1.36).abs() < 1e-12);
        assert!((p.orientation_factor - 0.5).abs() < 1e-12);
        assert!((p.vegetation_cooling_proxy - 0.25).abs() < 1e-12);
    }

    #[test]
    fn narrow_streets_use_minimum_width() {
        let p = PhysicsProxies::compute(0.2, 10.0, 0.5, 90.0, 0.0, 0.0);
        assert!((p.canyon_aspect_ratio - 5.0).abs() < 1e-12);
        assert!((p.sky_view_factor_proxy - 0.05).abs() < 1e-12);
        assert!(p.orientation_factor.abs() < 1e-12);
    }

    #[test]
    fn negative_orientation_wraps() {
        let p = PhysicsProxies::compute(0.0, 8.0, 18.0, -180.0, 0.0, 0.0);
        assert!((p.orientation_factor - 1.0).abs() < 1e-12);
    }
}
