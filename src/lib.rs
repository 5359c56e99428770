//! roadnet — the road-network graph engine of a traffic-scenario toolkit.
//!
//! A typed multigraph of junctions, edges and routes, where a *route* (an
//! ordered contiguous edge sequence) is the unit of traversal: the same
//! physical edge may only be entered from specific predecessors, so
//! connectivity is indexed by arrival context, not by bare edges.
//!
//! On top of the model sit two algorithms:
//!
//! - [`simplify::simplify`] — in-place topology reduction: pass-through
//!   junction elision and roundabout contraction, preserving reachability and
//!   aggregate cost.
//! - [`pathfind::PathFinder`] — single-source A* and cost-capped top-K
//!   alternative-route enumeration over the same search frontier.
//!
//! The crate performs no I/O: a loader feeds a [`desc::NetworkDescription`],
//! and planning/clustering collaborators consume the query surface
//! (lookups, [`network::RoadNetwork::check_edge_sequence`],
//! [`network::RoadNetwork::get_longest_sequence`], subgraph extraction).
//! Everything is single-threaded and synchronous; callers wanting parallelism
//! work on independently owned [`network::RoadNetwork`] instances.

pub mod desc;
pub mod edge;
pub mod error;
pub mod geo;
pub mod junction;
pub mod network;
pub mod pathfind;
pub mod route;
pub mod simplify;
pub mod store;
pub mod subgraph;

pub use desc::NetworkDescription;
pub use edge::{Edge, Lane};
pub use error::{Error, Result};
pub use geo::Point;
pub use junction::{Approach, Junction};
pub use network::{NetworkStats, RoadNetwork};
pub use pathfind::{FoundRoute, PathFinder, RouteFlags, TopKRoutes};
pub use route::Route;
pub use simplify::{simplify, SimplifyStats};
pub use store::{EdgeHandle, JunctionHandle, RouteHandle};
pub use subgraph::SubGraphParts;
