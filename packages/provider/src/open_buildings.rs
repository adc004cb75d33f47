//! Building footprints in the style of Google Open Buildings.
//!
//! Always available offline: the AOI bounding box is split into a 5×5
//! lattice and a 4×4 block of footprint boxes is placed on its interior
//! nodes, each nudged by a seed-derived jitter of at most 0.4 lattice
//! steps so every box stays inside the bounds. Heights cycle through
//! 8–28 m so morphology features have some spread.

use async_trait::async_trait;
use geo::{Rect, coord};

use crate::footprints::footprint_feature;
use crate::{DataProvider, FetchRequest, ProviderPayload, seed};

/// Source name of this provider.
pub const SOURCE: &str = "open_buildings";

const GRID: u32 = 4;
const BOX_FRACTION: f64 = 0.55;
/// Largest jitter as a fraction of the lattice step. The last box ends at
/// `(GRID - 0.5 + MAX_JITTER + BOX_FRACTION)` steps, short of `GRID + 1`.
const MAX_JITTER: f64 = 0.4;

/// Synthetic footprint provider.
#[derive(Debug, Clone, Copy)]
pub struct OpenBuildingsProvider {
    run_seed: u64,
}

impl OpenBuildingsProvider {
    /// Creates a provider seeded by `run_seed`.
    #[must_use]
    pub const fn new(run_seed: u64) -> Self {
        Self { run_seed }
    }
}

#[async_trait]
impl DataProvider for OpenBuildingsProvider {
    fn id(&self) -> &'static str {
        SOURCE
    }

    #[allow(clippy::cast_precision_loss)]
    async fn fetch(&self, request: &FetchRequest<'_>) -> ProviderPayload {
        let bounds = request.aoi.bounds();
        let seed = seed::derive_seed(&seed::material(SOURCE, self.run_seed, request, &[]));
        // Only the top 32 bits drive the jitter.
        let jitter_seed = seed >> 32;

        let divisions = f64::from(GRID + 1);
        let step_x = bounds.width() / divisions;
        let step_y = bounds.height() / divisions;

        let mut vectors = Vec::new();
        for i in 0..GRID {
            for j in 0..GRID {
                let jitter = ((jitter_seed + u64::from(i) * 17 + u64::from(j) * 13) % 1000) as f64
                    / 1000.0
                    * MAX_JITTER;
                let x0 = step_x.mul_add(f64::from(i) + 0.5 + jitter, bounds.min_lon);
                let y0 = step_y.mul_add(f64::from(j) + 0.5 + jitter, bounds.min_lat);
                let footprint = Rect::new(
                    coord! { x: x0, y: y0 },
                    coord! { x: step_x.mul_add(BOX_FRACTION, x0), y: step_y.mul_add(BOX_FRACTION, y0) },
                )
                .to_polygon();
                let height = f64::from(8 + ((i + j) % 6) * 4);
                vectors.push(footprint_feature(&footprint, height, SOURCE));
            }
        }

        let count = vectors.len();
        ProviderPayload::new(SOURCE)
            .with_vectors(vectors)
            .with_metadata("seed", seed)
            .with_metadata("footprint_count", count)
    }

    fn attribution(&self) -> &'static str {
        "Google Open Buildings and derivative fallback geometries by microclimate contributors."
    }

    fn license(&self) -> &'static str {
        "Open Buildings data license where used; fallback geometry under EUPL-1.2."
    }
}
