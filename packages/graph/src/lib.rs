#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial neighbor graph over tiles.
//!
//! Each tile is linked to its `k` nearest tiles by planar distance between
//! centroids in degrees. Edges are undirected and weighted by
//! `1 / (1 + distance)`, floored at [`MIN_EDGE_WEIGHT`] so coincident
//! centroids still get a usable edge. A node's degree can exceed `k`
//! because other nodes may select it as their neighbor.

use std::collections::{BTreeMap, HashMap};

use microclimate_tile_models::TileFeature;

/// Lower bound of every edge weight.
pub const MIN_EDGE_WEIGHT: f64 = 1e-6;

/// Undirected weighted k-nearest-neighbor graph of tiles.
#[derive(Debug, Clone, Default)]
pub struct AirflowGraph {
    node_ids: Vec<String>,
    features: HashMap<String, TileFeature>,
    adjacency: HashMap<String, BTreeMap<String, f64>>,
}

impl AirflowGraph {
    /// Builds the graph of `features` with `k_neighbors` edges initiated
    /// per node.
    ///
    /// Duplicate tile ids collapse to one node carrying the last feature
    /// seen. Neighbor candidates are sorted by distance with a stable sort,
    /// so ties keep first-seen node order.
    #[must_use]
    pub fn build(features: &[TileFeature], k_neighbors: usize) -> Self {
        let mut graph = Self::default();
        for feature in features {
            if !graph.features.contains_key(&feature.tile_id) {
                graph.node_ids.push(feature.tile_id.clone());
                graph.adjacency.insert(feature.tile_id.clone(), BTreeMap::new());
            }
            graph.features.insert(feature.tile_id.clone(), feature.clone());
        }

        let nodes: Vec<&TileFeature> = graph
            .node_ids
            .iter()
            .filter_map(|id| graph.features.get(id))
            .collect();

        let mut edges = Vec::new();
        for (i, source) in nodes.iter().enumerate() {
            let mut candidates: Vec<(usize, f64)> = nodes
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, target)| (j, distance(source, target)))
                .collect();
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

            for &(j, d) in candidates.iter().take(k_neighbors) {
                edges.push((i, j, (1.0 / (1.0 + d)).max(MIN_EDGE_WEIGHT)));
            }
        }

        let edges: Vec<(String, String, f64)> = edges
            .into_iter()
            .map(|(i, j, w)| (nodes[i].tile_id.clone(), nodes[j].tile_id.clone(), w))
            .collect();
        for (a, b, weight) in edges {
            graph.add_edge(&a, &b, weight);
        }

        log::debug!(
            "Built airflow graph: {} nodes, {} edges (k={k_neighbors})",
            graph.node_count(),
            graph.edge_count()
        );
        graph
    }

    /// Inserts or updates the undirected edge between `a` and `b`.
    fn add_edge(&mut self, a: &str, b: &str, weight: f64) {
        if let Some(neighbors) = self.adjacency.get_mut(a) {
            neighbors.insert(b.to_string(), weight);
        }
        if let Some(neighbors) = self.adjacency.get_mut(b) {
            neighbors.insert(a.to_string(), weight);
        }
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum::<usize>() / 2
    }

    /// Node ids in first-seen order.
    #[must_use]
    pub fn node_ids(&self) -> &[String] {
        &self.node_ids
    }

    /// Returns `true` if `tile_id` is a node.
    #[must_use]
    pub fn has_node(&self, tile_id: &str) -> bool {
        self.features.contains_key(tile_id)
    }

    /// Number of neighbors of `tile_id`; 0 for unknown tiles.
    #[must_use]
    pub fn degree(&self, tile_id: &str) -> usize {
        self.adjacency.get(tile_id).map_or(0, BTreeMap::len)
    }

    /// Returns `true` if `a` and `b` share an edge.
    #[must_use]
    pub fn has_edge(&self, a: &str, b: &str) -> bool {
        self.edge_weight(a, b).is_some()
    }

    /// Weight of the edge between `a` and `b`, if any.
    #[must_use]
    pub fn edge_weight(&self, a: &str, b: &str) -> Option<f64> {
        self.adjacency.get(a)?.get(b).copied()
    }

    /// Neighbors of `tile_id` with edge weights, ordered by id.
    pub fn neighbors(&self, tile_id: &str) -> impl Iterator<Item = (&str, f64)> {
        self.adjacency
            .get(tile_id)
            .into_iter()
            .flat_map(|neighbors| neighbors.iter().map(|(id, &w)| (id.as_str(), w)))
    }

    /// Feature attached to `tile_id`.
    #[must_use]
    pub fn feature(&self, tile_id: &str) -> Option<&TileFeature> {
        self.features.get(tile_id)
    }

    /// Every undirected edge once, as `(a, b, weight)` with `a` before `b`
    /// in node order.
    #[must_use]
    pub fn edges(&self) -> Vec<(&str, &str, f64)> {
        let position: HashMap<&str, usize> = self
            .node_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut edges = Vec::new();
        for id in &self.node_ids {
            for (neighbor, weight) in self.neighbors(id) {
                if position.get(id.as_str()) < position.get(neighbor) {
                    edges.push((id.as_str(), neighbor, weight));
                }
            }
        }
        edges
    }
}

fn distance(a: &TileFeature, b: &TileFeature) -> f64 {
    (a.lon - b.lon).hypot(a.lat - b.lat)
}
