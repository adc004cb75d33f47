//! Run progress reporting.
//!
//! [`Pipeline::analyze`](crate::Pipeline::analyze) walks through place
//! resolution, per-tile processing, and scoring, and tells a
//! [`RunObserver`] about each step. Rendering lives in the binaries
//! (`microclimate_cli_utils` draws an `indicatif` bar); library callers
//! and tests pass [`silent()`].

use std::sync::Arc;

/// Totals of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    /// Tiles that produced features.
    pub tiles: usize,
    /// Tiles with at least one degraded provider call or replaced feature.
    pub degraded_tiles: usize,
    /// Tiles selected as cool refuges.
    pub cool_refuges: usize,
    /// Tiles recommended for tree planting.
    pub recommendations: usize,
}

/// Receives the progress of an analysis run.
///
/// Tiles finish on concurrent tasks, so implementations must be
/// `Send + Sync`.
pub trait RunObserver: Send + Sync {
    /// The place is being resolved to an AOI.
    fn resolving(&self, place: &str);

    /// The AOI was split into `tiles` tiles and processing starts.
    fn tiles_planned(&self, tiles: usize);

    /// One tile finished. `degraded` counts its degraded notes.
    fn tile_finished(&self, tile_id: &str, degraded: usize);

    /// Every tile finished and the graph is being scored.
    fn scoring(&self);

    /// The summary was cached.
    fn finished(&self, tally: &RunTally);
}

/// Discards every update.
pub struct Silent;

impl RunObserver for Silent {
    fn resolving(&self, _place: &str) {}
    fn tiles_planned(&self, _tiles: usize) {}
    fn tile_finished(&self, _tile_id: &str, _degraded: usize) {}
    fn scoring(&self) {}
    fn finished(&self, _tally: &RunTally) {}
}

/// A shared [`Silent`] observer.
#[must_use]
pub fn silent() -> Arc<dyn RunObserver> {
    Arc::new(Silent)
}
