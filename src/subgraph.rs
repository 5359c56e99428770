//! Induced-subgraph extraction.
//!
//! A collaborator hands over a homogeneous set of routes, edges or junctions;
//! the result is a new, independent network containing exactly the implied
//! junctions and edges, produced by copying the source and pruning everything
//! else through the normal removal cascades.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::network::RoadNetwork;
use crate::store::{EdgeHandle, JunctionHandle};

/// The selector for [`RoadNetwork::create_sub_graph`]. Homogeneity is
/// enforced by construction: one variant, one entity kind, external ids.
#[derive(Debug, Clone)]
pub enum SubGraphParts {
    Routes(Vec<String>),
    Edges(Vec<String>),
    Junctions(Vec<String>),
}

impl RoadNetwork {
    /// Derive the induced subnetwork. `None` on an empty selection or when
    /// any requested or implied id is unknown in this network.
    pub fn create_sub_graph(&self, parts: &SubGraphParts) -> Option<RoadNetwork> {
        let mut keep_junctions: FxHashSet<String> = FxHashSet::default();
        let mut keep_edges: FxHashSet<String> = FxHashSet::default();

        match parts {
            SubGraphParts::Routes(ids) => {
                if ids.is_empty() {
                    return None;
                }
                // Merged routes keep interior edges whose endpoint junctions
                // were elided; the implied junction set is the surviving ones
                // (the routes' outer anchors plus still-present interiors).
                for id in ids {
                    let route = self.route_by_id(id)?;
                    for endpoint in [route.from(), route.to()] {
                        if self.junction_by_id(endpoint).is_some() {
                            keep_junctions.insert(endpoint.to_string());
                        }
                    }
                    for &eh in route.edges() {
                        let edge = self.edge(eh)?;
                        keep_edges.insert(edge.id().to_string());
                        for endpoint in [edge.from(), edge.to()] {
                            if self.junction_by_id(endpoint).is_some() {
                                keep_junctions.insert(endpoint.to_string());
                            }
                        }
                    }
                }
            }
            SubGraphParts::Edges(ids) => {
                if ids.is_empty() {
                    return None;
                }
                for id in ids {
                    let edge = self.edge_by_id(id)?;
                    keep_edges.insert(edge.id().to_string());
                    keep_junctions.insert(edge.from().to_string());
                    keep_junctions.insert(edge.to().to_string());
                }
            }
            SubGraphParts::Junctions(ids) => {
                if ids.is_empty() {
                    return None;
                }
                for id in ids {
                    self.junction_by_id(id)?;
                    keep_junctions.insert(id.clone());
                }
                for edge in self.edges() {
                    if keep_junctions.contains(edge.from()) && keep_junctions.contains(edge.to())
                    {
                        keep_edges.insert(edge.id().to_string());
                    }
                }
            }
        }

        // The retained sets must exist in full in the source network.
        for id in &keep_junctions {
            self.junction_by_id(id)?;
        }
        for id in &keep_edges {
            self.edge_by_id(id)?;
        }

        let mut sub = self.clone();
        let doomed_junctions: Vec<JunctionHandle> = sub
            .junctions()
            .filter(|j| !keep_junctions.contains(j.id()))
            .map(|j| j.handle())
            .collect();
        for handle in doomed_junctions {
            if sub.junction(handle).is_some() {
                sub.remove_junction(handle, true, true).ok()?;
            }
        }
        let doomed_edges: Vec<EdgeHandle> = sub
            .edges()
            .filter(|e| !keep_edges.contains(e.id()))
            .map(|e| e.handle())
            .collect();
        for handle in doomed_edges {
            if sub.edge(handle).is_some() {
                sub.remove_edge(handle, true).ok()?;
            }
        }
        let rings: Vec<Vec<String>> = sub
            .take_roundabouts()
            .into_iter()
            .filter(|ring| ring.iter().all(|id| sub.junction_by_id(id).is_some()))
            .collect();
        sub.set_roundabouts(rings);

        let stats = sub.stats();
        debug!(
            junctions = stats.junctions,
            edges = stats.edges,
            routes = stats.routes,
            "extracted induced subgraph"
        );
        Some(sub)
    }
}
