//! Street-level scene summary.

use microclimate_provider_models::Grid;
use serde::Serialize;

/// Mean scene ratios of a tile's street samples, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreetScene {
    /// Vegetation share of the view.
    pub green_view_ratio: f64,
    /// Open-sky share of the view.
    pub street_sky_ratio: f64,
    /// Building facade share of the view.
    pub street_facade_ratio: f64,
}

/// Averages the three ratio grids.
#[must_use]
pub fn summarize_street_scene(green_view: &Grid, sky_view: &Grid, facade: &Grid) -> StreetScene {
    StreetScene {
        green_view_ratio: green_view.mean().clamp(0.0, 1.0),
        street_sky_ratio: sky_view.mean().clamp(0.0, 1.0),
        street_facade_ratio: facade.mean().clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_and_clamps() {
        let green = Grid::from_values(1, 2, vec![0.2, 0.4]).unwrap();
        let sky = Grid::scalar(1.3);
        let facade = Grid::scalar(0.5);
        let scene = summarize_street_scene(&green, &sky, &facade);
        assert!((scene.green_view_ratio - 0.3).abs() < 1e-12);
        assert!((scene.street_sky_ratio - 1.0).abs() < 1e-12);
        assert!((scene.street_facade_ratio - 0.5).abs() < 1e-12);
    }
}
