//! The logical network description and the load lifecycle.
//!
//! The engine has no opinion on wire or file formats: whatever loader is in
//! front (XML, JSON, a generator) produces a [`NetworkDescription`] and hands
//! it to [`RoadNetwork::from_description`]. The serde derives are there so any
//! self-describing format works out of the box and so research tooling can
//! dump the logical shape of a (simplified) network.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::edge::{Edge, Lane};
use crate::error::{Error, Result};
use crate::geo::Point;
use crate::junction::Junction;
use crate::network::RoadNetwork;
use crate::store::RouteHandle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JunctionDescription {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub traffic_light: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneDescription {
    pub id: String,
    /// Allowed speed, m/s.
    pub speed: f64,
    /// Driving length, meters.
    pub length: f64,
    #[serde(default)]
    pub shape: Vec<Point>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub id: String,
    pub from: String,
    pub to: String,
    pub lanes: Vec<LaneDescription>,
}

/// "Traffic leaving `from_edge` may continue onto `to_edge`."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescription {
    pub from_edge: String,
    pub to_edge: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDescription {
    pub junctions: Vec<JunctionDescription>,
    pub edges: Vec<EdgeDescription>,
    #[serde(default)]
    pub connections: Vec<ConnectionDescription>,
    /// Ordered junction-id rings.
    #[serde(default)]
    pub roundabouts: Vec<Vec<String>>,
}

impl RoadNetwork {
    /// Build a network from its logical description.
    ///
    /// Load order matters: junctions first, then edges (each with one trivial
    /// single-edge route), then the connection links, then entry marking and
    /// roundabout ring validation. A ring that is not a closed edge cycle is
    /// a structurally invalid description and fails the whole load.
    pub fn from_description(desc: &NetworkDescription) -> Result<RoadNetwork> {
        let mut net = RoadNetwork::new();

        for j in &desc.junctions {
            net.add_junction(Junction::new(
                j.id.clone(),
                Point::new(j.x, j.y),
                j.traffic_light,
            ))?;
        }

        for e in &desc.edges {
            let lanes = e
                .lanes
                .iter()
                .map(|l| Lane {
                    id: l.id.clone(),
                    shape: l.shape.clone(),
                    speed: l.speed,
                    length: l.length,
                })
                .collect();
            net.add_edge(Edge::new(e.id.clone(), e.from.clone(), e.to.clone(), lanes))?;
            // One trivial route per edge, sharing the edge's id. Routes and
            // edges live in separate stores, so the ids cannot collide.
            let route = net.make_route(e.id.clone(), [e.id.as_str()])?;
            net.add_route(route)?;
        }

        for c in &desc.connections {
            let from = route_of_edge(&net, &c.from_edge)?;
            let to = route_of_edge(&net, &c.to_edge)?;
            net.link_continuation(from, to)?;
        }

        // A junction no edge arrives at is a network entry: everything
        // starting there is reachable from the outside.
        for j in &desc.junctions {
            let has_incoming = desc.edges.iter().any(|e| e.to == j.id);
            if has_incoming {
                continue;
            }
            for rh in net.routes_starting_at(&j.id) {
                net.link_entry(rh)?;
            }
        }

        for ring in &desc.roundabouts {
            validate_ring(&net, ring)?;
            net.add_roundabout(ring.clone());
        }

        let stats = net.stats();
        info!(
            junctions = stats.junctions,
            edges = stats.edges,
            routes = stats.routes,
            roundabouts = stats.roundabouts,
            "loaded network description"
        );
        Ok(net)
    }
}

fn route_of_edge(net: &RoadNetwork, edge_id: &str) -> Result<RouteHandle> {
    net.route_by_id(edge_id)
        .and_then(|r| r.handle())
        .ok_or_else(|| Error::not_found("edge", edge_id))
}

/// A ring must be a single closed cycle: every listed junction exists and
/// consecutive members (wrapping around) are joined by an edge.
fn validate_ring(net: &RoadNetwork, ring: &[String]) -> Result<()> {
    let broken = || Error::BrokenRing {
        ring: ring.join(", "),
    };
    if ring.len() < 2 {
        return Err(broken());
    }
    for id in ring {
        if net.junction_by_id(id).is_none() {
            return Err(broken());
        }
    }
    for i in 0..ring.len() {
        let from = &ring[i];
        let to = &ring[(i + 1) % ring.len()];
        let connected = net
            .edges()
            .any(|e| e.from() == from.as_str() && e.to() == to.as_str());
        if !connected {
            debug!(from = %from, to = %to, "roundabout ring gap");
            return Err(broken());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(id: &str, length: f64) -> LaneDescription {
        LaneDescription {
            id: id.to_string(),
            speed: 13.9,
            length,
            shape: Vec::new(),
        }
    }

    fn line_description() -> NetworkDescription {
        NetworkDescription {
            junctions: vec![
                JunctionDescription { id: "a".into(), x: 0.0, y: 0.0, traffic_light: false },
                JunctionDescription { id: "b".into(), x: 100.0, y: 0.0, traffic_light: true },
                JunctionDescription { id: "c".into(), x: 200.0, y: 0.0, traffic_light: false },
            ],
            edges: vec![
                EdgeDescription {
                    id: "ab".into(),
                    from: "a".into(),
                    to: "b".into(),
                    lanes: vec![lane("ab_0", 100.0)],
                },
                EdgeDescription {
                    id: "bc".into(),
                    from: "b".into(),
                    to: "c".into(),
                    lanes: vec![lane("bc_0", 100.0)],
                },
            ],
            connections: vec![ConnectionDescription {
                from_edge: "ab".into(),
                to_edge: "bc".into(),
            }],
            roundabouts: Vec::new(),
        }
    }

    #[test]
    fn load_builds_trivial_routes_and_fringe() {
        let net = RoadNetwork::from_description(&line_description()).unwrap();
        let stats = net.stats();
        assert_eq!(stats.junctions, 3);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.routes, 2);

        // `a` is an entry (nothing arrives), `c` an exit (nothing continues).
        assert!(net.junction_by_id("a").unwrap().is_starting());
        assert!(!net.junction_by_id("a").unwrap().is_ending());
        assert!(net.junction_by_id("c").unwrap().is_ending());
        assert!(!net.junction_by_id("b").unwrap().is_starting());

        // Every edge has a reference from its trivial route.
        assert_eq!(net.edge_by_id("ab").unwrap().ref_count(), 1);
    }

    #[test]
    fn broken_ring_fails_load() {
        let mut desc = line_description();
        desc.roundabouts = vec![vec!["a".into(), "b".into()]];
        // a→b exists but b→a does not: not a closed cycle.
        assert!(matches!(
            RoadNetwork::from_description(&desc),
            Err(Error::BrokenRing { .. })
        ));
    }

    #[test]
    fn connection_to_unknown_edge_fails_load() {
        let mut desc = line_description();
        desc.connections.push(ConnectionDescription {
            from_edge: "bc".into(),
            to_edge: "nope".into(),
        });
        assert!(matches!(
            RoadNetwork::from_description(&desc),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn description_round_trips_through_json() {
        let desc = line_description();
        let json = serde_json::to_string(&desc).unwrap();
        let back: NetworkDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(back.edges.len(), 2);
        assert!(RoadNetwork::from_description(&back).is_ok());
    }
}
