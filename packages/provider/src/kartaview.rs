//! KartaView street-level scene ratios.
//!
//! Returns three 1×1 grids describing the street scene: the share of
//! vegetation, open sky, and building facade in the view.

use std::ops::Range;

use async_trait::async_trait;
use rand::Rng;

use crate::{DataProvider, FetchRequest, Grid, ProviderPayload, seed};

/// Source name of this provider.
pub const SOURCE: &str = "kartaview";

/// Grid name of the vegetation share of the street view.
pub const GREEN_VIEW: &str = "green_view_ratio";

/// Grid name of the visible sky share.
pub const SKY_VIEW: &str = "sky_view_ratio";

/// Grid name of the facade share.
pub const FACADE: &str = "facade_ratio";

/// Sampling ranges of the three scene ratios.
#[derive(Debug, Clone)]
pub(crate) struct SceneRanges {
    pub green: Range<f64>,
    pub sky: Range<f64>,
    pub facade: Range<f64>,
}

/// Draws the three scene grids from `seed` in a fixed order.
pub(crate) fn scene_payload(source: &str, seed: u64, ranges: SceneRanges) -> ProviderPayload {
    let mut rng = seed::rng(seed);
    let green = rng.gen_range(ranges.green);
    let sky = rng.gen_range(ranges.sky);
    let facade = rng.gen_range(ranges.facade);

    ProviderPayload::new(source)
        .with_array(GREEN_VIEW, Grid::scalar(green))
        .with_array(SKY_VIEW, Grid::scalar(sky))
        .with_array(FACADE, Grid::scalar(facade))
        .with_metadata("seed", seed)
}

/// KartaView provider. Uses no credentials and no network.
#[derive(Debug, Clone, Copy)]
pub struct KartaViewProvider {
    run_seed: u64,
}

impl KartaViewProvider {
    /// Creates a provider seeded by `run_seed`.
    #[must_use]
    pub const fn new(run_seed: u64) -> Self {
        Self { run_seed }
    }
}

#[async_trait]
impl DataProvider for KartaViewProvider {
    fn id(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> ProviderPayload {
        let seed = seed::derive_seed(&seed::material(SOURCE, self.run_seed, request, &[]));
        scene_payload(
            SOURCE,
            seed,
            SceneRanges {
                green: 0.1..0.55,
                sky: 0.2..0.8,
                facade: 0.15..0.6,
            },
        )
    }

    fn attribution(&self) -> &'static str {
        "KartaView community imagery and metadata when available."
    }

    fn license(&self) -> &'static str {
        "KartaView terms; fallback feature synthesis under EUPL-1.2."
    }
}
