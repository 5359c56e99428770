//! In-place topology reduction.
//!
//! Two ordered passes over a loaded network, both preserving
//! junction-to-junction reachability and aggregate cost through merged routes
//! (edge sequences are kept, not re-synthesized):
//!
//! 1. *Junction elision* — chains of pass-through junctions are collapsed by
//!    merging each hop's route into one combined route anchored at the chain
//!    ends.
//! 2. *Roundabout contraction* — each validated ring is replaced by a single
//!    synthetic junction plus one merged route per reachable (entry, exit)
//!    pair.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::error::Result;
use crate::geo::centroid;
use crate::geo::Point;
use crate::junction::Junction;
use crate::network::RoadNetwork;
use crate::route::Route;
use crate::store::{EdgeHandle, JunctionHandle, RouteHandle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimplifyStats {
    pub junctions_elided: usize,
    pub chains_merged: usize,
    pub roundabouts_contracted: usize,
}

/// Reduce the network in place. Idempotent: a second run finds nothing left
/// to elide or contract.
pub fn simplify(net: &mut RoadNetwork) -> Result<SimplifyStats> {
    let mut stats = SimplifyStats::default();
    elide_junctions(net, &mut stats)?;
    contract_roundabouts(net, &mut stats)?;
    info!(
        junctions_elided = stats.junctions_elided,
        chains_merged = stats.chains_merged,
        roundabouts_contracted = stats.roundabouts_contracted,
        "simplification finished"
    );
    Ok(stats)
}

// ----- pass 1: junction elision -------------------------------------------

/// A junction can be elided iff it is not a fringe junction, not a roundabout
/// member, and its connectivity is a clean pass-through: one or two arrival
/// routes, each with exactly one continuation, continuations pairwise distinct
/// and (for the two-way case) edge-disjoint, so contraction cannot merge two
/// distinct physical paths into one.
fn removable_junctions(net: &RoadNetwork) -> FxHashSet<JunctionHandle> {
    let ring_members: FxHashSet<&str> = net
        .roundabouts()
        .iter()
        .flatten()
        .map(String::as_str)
        .collect();

    let mut removable = FxHashSet::default();
    'junctions: for junction in net.junctions() {
        if junction.is_starting() || junction.is_ending() {
            continue;
        }
        if ring_members.contains(junction.id()) {
            continue;
        }
        let pairs: Vec<(RouteHandle, &[RouteHandle])> = junction
            .approaches()
            .filter_map(|(a, outs)| match a {
                crate::junction::Approach::Via(r) => Some((r, outs)),
                crate::junction::Approach::Entry => None,
            })
            .collect();
        if pairs.len() != 1 && pairs.len() != 2 {
            continue;
        }
        let mut outs = Vec::new();
        for (_, continuation) in &pairs {
            let &[only] = *continuation else {
                continue 'junctions;
            };
            if outs.contains(&only) {
                continue 'junctions;
            }
            outs.push(only);
        }
        if pairs.len() == 2 {
            let edges_of = |h: RouteHandle| -> FxHashSet<EdgeHandle> {
                net.route(h)
                    .map(|r| r.edges().iter().copied().collect())
                    .unwrap_or_default()
            };
            if !edges_of(outs[0]).is_disjoint(&edges_of(outs[1])) {
                continue;
            }
        }
        removable.insert(junction.handle());
    }
    removable
}

fn elide_junctions(net: &mut RoadNetwork, stats: &mut SimplifyStats) -> Result<()> {
    let removable = removable_junctions(net);
    let removable_ids: FxHashSet<String> = removable
        .iter()
        .filter_map(|&h| net.junction(h).map(|j| j.id().to_string()))
        .collect();

    // Chain walks start at routes arriving from outside the removable set.
    let chain_heads: Vec<RouteHandle> = {
        let mut heads = Vec::new();
        for &jh in &removable {
            let Some(junction) = net.junction(jh) else {
                continue;
            };
            for arriving in junction.incoming_routes() {
                let from_outside = net
                    .route(arriving)
                    .map(|r| !removable_ids.contains(r.from()))
                    .unwrap_or(false);
                if from_outside {
                    heads.push(arriving);
                }
            }
        }
        heads
    };

    let mut consumed: FxHashSet<RouteHandle> = FxHashSet::default();
    for head in chain_heads {
        if consumed.contains(&head) {
            continue;
        }
        let mut parts = vec![head];
        loop {
            let cursor = *parts.last().unwrap_or_else(|| unreachable!());
            let at_removable = net
                .route(cursor)
                .and_then(|r| net.junction_by_id(r.to()))
                .map(|j| removable.contains(&j.handle()))
                .unwrap_or(false);
            if !at_removable {
                break;
            }
            // Exactly one continuation, by the removability check.
            let Some(&next) = net.continuations(cursor).first() else {
                break;
            };
            if consumed.contains(&next) || parts.contains(&next) {
                break;
            }
            parts.push(next);
        }
        if parts.len() < 2 {
            continue;
        }
        merge_chain(net, &parts)?;
        consumed.extend(parts.iter().copied());
        stats.chains_merged += 1;
    }

    for rh in &consumed {
        if net.route(*rh).is_some() {
            net.remove_route(*rh, true)?;
        }
    }

    // The interior junctions lost every connection; their interior edges
    // stay alive inside the merged routes.
    for jh in removable {
        let isolated = net
            .junction(jh)
            .map(|j| j.connection_count() == 0)
            .unwrap_or(false);
        if isolated {
            net.remove_junction(jh, true, false)?;
            stats.junctions_elided += 1;
        }
    }
    debug!(
        elided = stats.junctions_elided,
        chains = stats.chains_merged,
        "junction elision pass done"
    );
    Ok(())
}

/// Merge the hop routes of one chain into a single route, attach it at the
/// chain's outer endpoints, and leave the originals for removal.
fn merge_chain(net: &mut RoadNetwork, parts: &[RouteHandle]) -> Result<()> {
    let head = parts[0];
    let tail = parts[parts.len() - 1];
    let tail_continuations = net.continuations(tail);

    let mut id_parts = Vec::new();
    let mut edges = Vec::new();
    for &part in parts {
        let Some(route) = net.route(part) else {
            continue;
        };
        id_parts.push(route.id().to_string());
        edges.extend(route.edges().iter().copied());
    }
    let merged = net.route_from_handles(id_parts.join("~"), edges)?;
    let start_id = merged.from().to_string();
    let merged_handle = net.add_route(merged)?;

    // The merged route is reachable exactly where the head route was.
    let start_handle = net.junction_mut_by_id(&start_id).map(|start| {
        start.replace_continuation(head, merged_handle);
        start.handle()
    });
    if let Some(handle) = start_handle {
        net.check_fringe(handle);
    }
    for next in tail_continuations {
        net.link_continuation(merged_handle, next)?;
    }
    Ok(())
}

// ----- pass 2: roundabout contraction -------------------------------------

fn contract_roundabouts(net: &mut RoadNetwork, stats: &mut SimplifyStats) -> Result<()> {
    let rings = net.take_roundabouts();
    let mut kept = Vec::new();
    for ring in rings {
        match contract_ring(net, &ring)? {
            // A contracted ring stays listed as its hub, which keeps the hub
            // out of later elision passes and marks re-runs as no-ops.
            Some(hub) => {
                kept.push(vec![hub]);
                stats.roundabouts_contracted += 1;
            }
            None => kept.push(ring),
        }
    }
    net.set_roundabouts(kept);
    Ok(())
}

/// Contract one validated ring into its hub junction. Returns the hub id, or
/// `None` (leaving the ring listed) when there is nothing to contract.
fn contract_ring(net: &mut RoadNetwork, ring: &[String]) -> Result<Option<String>> {
    // A single-member "ring" is a hub from an earlier pass.
    if ring.len() < 2 {
        return Ok(None);
    }
    let ring_set: FxHashSet<&str> = ring.iter().map(String::as_str).collect();
    let mut positions: Vec<Point> = Vec::with_capacity(ring.len());
    let mut traffic_light = false;
    for id in ring {
        match net.junction_by_id(id) {
            Some(j) => {
                positions.push(j.position());
                traffic_light |= j.has_traffic_light();
            }
            None => return Ok(None),
        }
    }

    let mut internal = Vec::new();
    let mut entering = Vec::new();
    let mut exiting = Vec::new();
    for route in net.routes() {
        let Some(handle) = route.handle() else {
            continue;
        };
        match (
            ring_set.contains(route.from()),
            ring_set.contains(route.to()),
        ) {
            (true, true) => internal.push(handle),
            (false, true) => entering.push(handle),
            (true, false) => exiting.push(handle),
            (false, false) => {}
        }
    }

    // For every entry, walk around the ring collecting each reachable exit
    // and the ring edges traversed on the way there.
    let mut pairs: Vec<(RouteHandle, Vec<EdgeHandle>, RouteHandle)> = Vec::new();
    for &entry in &entering {
        let mut seen: FxHashSet<RouteHandle> = FxHashSet::default();
        let mut stack: Vec<(RouteHandle, Vec<EdgeHandle>)> = vec![(entry, Vec::new())];
        while let Some((cursor, ring_path)) = stack.pop() {
            for next in net.continuations(cursor) {
                if exiting.contains(&next) {
                    pairs.push((entry, ring_path.clone(), next));
                } else if internal.contains(&next) && seen.insert(next) {
                    let mut extended = ring_path.clone();
                    if let Some(r) = net.route(next) {
                        extended.extend(r.edges().iter().copied());
                    }
                    stack.push((next, extended));
                }
            }
        }
    }

    // The hub goes in first: the merged parts are anchored at it.
    let hub_id = format!("cluster_{}", ring.join("_"));
    net.add_junction(Junction::new(
        hub_id.clone(),
        centroid(&positions),
        traffic_light,
    ))?;

    let mut exit_parts: FxHashMap<RouteHandle, RouteHandle> = FxHashMap::default();
    for (entry, ring_path, exit) in &pairs {
        materialize_pair(net, &hub_id, *entry, ring_path, *exit, &mut exit_parts)?;
    }

    let mut doomed: Vec<RouteHandle> = Vec::new();
    doomed.extend(&entering);
    doomed.extend(&exiting);
    doomed.extend(&internal);
    for rh in doomed {
        if net.route(rh).is_some() {
            net.remove_route(rh, true)?;
        }
    }
    for id in ring {
        if let Some(handle) = net.junction_by_id(id).map(Junction::handle) {
            net.remove_junction(handle, true, false)?;
        }
    }
    debug!(hub = %hub_id, pairs = pairs.len(), "contracted roundabout");
    Ok(Some(hub_id))
}

/// Materialize one (entry, exit) pair as two routes anchored at the hub: an
/// entry part (outer start → hub, carrying the walked ring edges) and an exit
/// part (hub → outer end, shared between pairs reaching the same exit), linked
/// through the hub's approach map.
fn materialize_pair(
    net: &mut RoadNetwork,
    hub_id: &str,
    entry: RouteHandle,
    ring_path: &[EdgeHandle],
    exit: RouteHandle,
    exit_parts: &mut FxHashMap<RouteHandle, RouteHandle>,
) -> Result<()> {
    let (entry_id, entry_edges, outer_start) = {
        let Some(r) = net.route(entry) else {
            return Ok(());
        };
        (r.id().to_string(), r.edges().to_vec(), r.from().to_string())
    };

    let exit_part = match exit_parts.get(&exit) {
        Some(&part) => part,
        None => {
            let (exit_id, exit_edges, outer_end) = {
                let Some(r) = net.route(exit) else {
                    return Ok(());
                };
                (r.id().to_string(), r.edges().to_vec(), r.to().to_string())
            };
            let next_hops = net.continuations(exit);
            let part = Route::from_parts(
                format!("{hub_id}~{exit_id}"),
                exit_edges,
                hub_id,
                outer_end,
            );
            let part = net.add_route(part)?;
            for next in next_hops {
                net.link_continuation(part, next)?;
            }
            exit_parts.insert(exit, part);
            part
        }
    };

    // Two ring paths from the same entry are distinct routes; disambiguate.
    let base = format!("{entry_id}~{hub_id}");
    let mut id = base.clone();
    let mut n = 1;
    while net.route_by_id(&id).is_some() {
        n += 1;
        id = format!("{base}~{n}");
    }
    let mut edges = entry_edges;
    edges.extend_from_slice(ring_path);
    let entry_part = net.add_route(Route::from_parts(id, edges, outer_start.clone(), hub_id))?;

    // Reachable wherever the entry route was reachable.
    let approaches: Vec<crate::junction::Approach> = net
        .junction_by_id(&outer_start)
        .map(|j| {
            j.approaches()
                .filter(|(_, outs)| outs.contains(&entry))
                .map(|(a, _)| a)
                .collect()
        })
        .unwrap_or_default();
    let start_handle = net.junction_mut_by_id(&outer_start).map(|junction| {
        for approach in &approaches {
            junction.link(*approach, entry_part);
        }
        junction.handle()
    });
    if let Some(handle) = start_handle {
        net.check_fringe(handle);
    }
    net.link_continuation(entry_part, exit_part)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::{
        ConnectionDescription, EdgeDescription, JunctionDescription, LaneDescription,
        NetworkDescription,
    };
    use crate::pathfind::{PathFinder, RouteFlags};

    fn junction(id: &str, x: f64, y: f64) -> JunctionDescription {
        JunctionDescription {
            id: id.to_string(),
            x,
            y,
            traffic_light: false,
        }
    }

    fn edge(id: &str, from: &str, to: &str, length: f64) -> EdgeDescription {
        EdgeDescription {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            lanes: vec![LaneDescription {
                id: format!("{id}_0"),
                speed: 13.9,
                length,
                shape: Vec::new(),
            }],
        }
    }

    fn connection(from: &str, to: &str) -> ConnectionDescription {
        ConnectionDescription {
            from_edge: from.to_string(),
            to_edge: to.to_string(),
        }
    }

    /// One-way chain a → b → c → d; b and c are pure pass-throughs.
    fn chain4() -> RoadNetwork {
        RoadNetwork::from_description(&NetworkDescription {
            junctions: vec![
                junction("a", 0.0, 0.0),
                junction("b", 100.0, 0.0),
                junction("c", 200.0, 0.0),
                junction("d", 300.0, 0.0),
            ],
            edges: vec![
                edge("ab", "a", "b", 100.0),
                edge("bc", "b", "c", 100.0),
                edge("cd", "c", "d", 100.0),
            ],
            connections: vec![connection("ab", "bc"), connection("bc", "cd")],
            roundabouts: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn chain_junctions_are_elided() {
        let mut net = chain4();
        let stats = simplify(&mut net).unwrap();
        assert_eq!(stats.junctions_elided, 2);
        assert_eq!(stats.chains_merged, 1);

        let counts = net.stats();
        assert_eq!(counts.junctions, 2);
        assert_eq!(counts.routes, 1);
        // Interior edges survive inside the merged route.
        assert_eq!(counts.edges, 3);

        let merged = net.route_by_id("ab~bc~cd").expect("merged route");
        assert_eq!(merged.from(), "a");
        assert_eq!(merged.to(), "d");
        assert_eq!(merged.edges().len(), 3);
        assert!((net.route_length(merged) - 300.0).abs() < 1e-9);

        // Fringe classification is preserved across the merge.
        assert!(net.junction_by_id("a").unwrap().is_starting());
        assert!(net.junction_by_id("d").unwrap().is_ending());
    }

    #[test]
    fn simplify_is_idempotent() {
        let mut once = chain4();
        simplify(&mut once).unwrap();
        let mut twice = once.clone();
        let stats = simplify(&mut twice).unwrap();
        assert_eq!(stats, SimplifyStats::default());
        assert_eq!(once.stats(), twice.stats());
        assert_eq!(once, twice);
    }

    #[test]
    fn two_way_chain_keeps_directions_apart() {
        // a ↔ b ↔ c, with b a (2-in, 2-out) pass-through whose pairings are
        // u-turn free: ab continues to bc, cb continues to ba.
        let mut net = RoadNetwork::from_description(&NetworkDescription {
            junctions: vec![
                junction("a", 0.0, 0.0),
                junction("b", 100.0, 0.0),
                junction("c", 200.0, 0.0),
            ],
            edges: vec![
                edge("ab", "a", "b", 100.0),
                edge("bc", "b", "c", 100.0),
                edge("cb", "c", "b", 100.0),
                edge("ba", "b", "a", 100.0),
            ],
            connections: vec![connection("ab", "bc"), connection("cb", "ba")],
            roundabouts: Vec::new(),
        })
        .unwrap();

        let stats = simplify(&mut net).unwrap();
        assert_eq!(stats.junctions_elided, 1);
        assert_eq!(stats.chains_merged, 2);
        assert!(net.route_by_id("ab~bc").is_some());
        assert!(net.route_by_id("cb~ba").is_some());
        // The two directions were not conflated into one path.
        assert_eq!(net.route_by_id("ab~bc").unwrap().to(), "c");
        assert_eq!(net.route_by_id("cb~ba").unwrap().to(), "a");
    }

    #[test]
    fn fringe_and_branching_junctions_stay() {
        // a → b → c plus a side arrival x → b: b has two incomings but only
        // one continuation list, so it must not be elided.
        let mut net = RoadNetwork::from_description(&NetworkDescription {
            junctions: vec![
                junction("a", 0.0, 0.0),
                junction("x", 0.0, 100.0),
                junction("b", 100.0, 0.0),
                junction("c", 200.0, 0.0),
            ],
            edges: vec![
                edge("ab", "a", "b", 100.0),
                edge("xb", "x", "b", 150.0),
                edge("bc", "b", "c", 100.0),
            ],
            connections: vec![connection("ab", "bc"), connection("xb", "bc")],
            roundabouts: Vec::new(),
        })
        .unwrap();
        let stats = simplify(&mut net).unwrap();
        assert_eq!(stats.junctions_elided, 0);
        assert_eq!(net.stats().junctions, 4);
    }

    #[test]
    fn roundabout_contracts_to_hub_preserving_reachability() {
        // x → (r1 → r2 → r3 → r1) with exits r2 → y and r3 → z.
        let mut net = RoadNetwork::from_description(&NetworkDescription {
            junctions: vec![
                junction("x", -100.0, 0.0),
                junction("r1", 0.0, 0.0),
                junction("r2", 30.0, 0.0),
                junction("r3", 15.0, 30.0),
                junction("y", 130.0, 0.0),
                junction("z", 15.0, 130.0),
            ],
            edges: vec![
                edge("xr1", "x", "r1", 100.0),
                edge("r1r2", "r1", "r2", 40.0),
                edge("r2r3", "r2", "r3", 40.0),
                edge("r3r1", "r3", "r1", 40.0),
                edge("r2y", "r2", "y", 100.0),
                edge("r3z", "r3", "z", 130.0),
            ],
            connections: vec![
                connection("xr1", "r1r2"),
                connection("r1r2", "r2r3"),
                connection("r1r2", "r2y"),
                connection("r2r3", "r3r1"),
                connection("r2r3", "r3z"),
                connection("r3r1", "r1r2"),
            ],
            roundabouts: vec![vec!["r1".into(), "r2".into(), "r3".into()]],
        })
        .unwrap();

        // Reachability through the ring, before.
        let finder = PathFinder::new(&net);
        let before_y = finder.a_star("x", "y", None, &RouteFlags::new()).unwrap().0;
        let before_z = finder.a_star("x", "z", None, &RouteFlags::new()).unwrap().0;
        assert!((before_y.cost - 240.0).abs() < 1e-9);
        assert!((before_z.cost - 310.0).abs() < 1e-9);

        let stats = simplify(&mut net).unwrap();
        assert_eq!(stats.roundabouts_contracted, 1);
        // The contracted ring stays listed as its hub.
        assert_eq!(net.roundabouts().len(), 1);
        assert_eq!(net.roundabouts()[0], ["cluster_r1_r2_r3"]);
        assert!(net.junction_by_id("r1").is_none());
        assert!(net.junction_by_id("cluster_r1_r2_r3").is_some());

        // Same (entry, exit) pairs, same costs, after.
        let finder = PathFinder::new(&net);
        let after_y = finder.a_star("x", "y", None, &RouteFlags::new()).unwrap().0;
        let after_z = finder.a_star("x", "z", None, &RouteFlags::new()).unwrap().0;
        assert!((after_y.cost - before_y.cost).abs() < 1e-9);
        assert!((after_z.cost - before_z.cost).abs() < 1e-9);
    }

    #[test]
    fn hub_anchors_merged_parts_and_answers_queries() {
        let mut net = RoadNetwork::from_description(&NetworkDescription {
            junctions: vec![
                junction("x", -100.0, 0.0),
                junction("r1", 0.0, 0.0),
                junction("r2", 30.0, 0.0),
                junction("r3", 15.0, 30.0),
                junction("y", 130.0, 0.0),
                junction("z", 15.0, 130.0),
            ],
            edges: vec![
                edge("xr1", "x", "r1", 100.0),
                edge("r1r2", "r1", "r2", 40.0),
                edge("r2r3", "r2", "r3", 40.0),
                edge("r3r1", "r3", "r1", 40.0),
                edge("r2y", "r2", "y", 100.0),
                edge("r3z", "r3", "z", 130.0),
            ],
            connections: vec![
                connection("xr1", "r1r2"),
                connection("r1r2", "r2r3"),
                connection("r1r2", "r2y"),
                connection("r2r3", "r3r1"),
                connection("r2r3", "r3z"),
                connection("r3r1", "r1r2"),
            ],
            roundabouts: vec![vec!["r1".into(), "r2".into(), "r3".into()]],
        })
        .unwrap();
        simplify(&mut net).unwrap();

        // Every merged part starts or ends at the hub.
        let hub = "cluster_r1_r2_r3";
        for route in net.routes() {
            assert!(route.from() == hub || route.to() == hub);
        }

        // The hub itself answers searches, as destination and as origin.
        let finder = PathFinder::new(&net);
        let (to_hub, _) = finder.a_star("x", hub, None, &RouteFlags::new()).unwrap();
        assert!((to_hub.cost - 140.0).abs() < 1e-9); // xr1 + r1r2
        assert_eq!(to_hub.route.to(), hub);
        let (from_hub, _) = finder.a_star(hub, "y", None, &RouteFlags::new()).unwrap();
        assert!((from_hub.cost - 100.0).abs() < 1e-9); // r2y
        assert_eq!(from_hub.route.from(), hub);

        // Re-running leaves the contracted network alone.
        let mut again = net.clone();
        let stats = simplify(&mut again).unwrap();
        assert_eq!(stats, SimplifyStats::default());
        assert_eq!(net.stats(), again.stats());
    }

    #[test]
    fn hub_position_is_ring_centroid() {
        let mut net = RoadNetwork::from_description(&NetworkDescription {
            junctions: vec![
                junction("x", -100.0, 0.0),
                junction("r1", 0.0, 0.0),
                junction("r2", 30.0, 0.0),
                junction("r3", 15.0, 30.0),
                junction("y", 130.0, 0.0),
            ],
            edges: vec![
                edge("xr1", "x", "r1", 100.0),
                edge("r1r2", "r1", "r2", 40.0),
                edge("r2r3", "r2", "r3", 40.0),
                edge("r3r1", "r3", "r1", 40.0),
                edge("r2y", "r2", "y", 100.0),
            ],
            connections: vec![
                connection("xr1", "r1r2"),
                connection("r1r2", "r2r3"),
                connection("r1r2", "r2y"),
                connection("r2r3", "r3r1"),
                connection("r3r1", "r1r2"),
            ],
            roundabouts: vec![vec!["r1".into(), "r2".into(), "r3".into()]],
        })
        .unwrap();
        simplify(&mut net).unwrap();
        let hub = net.junction_by_id("cluster_r1_r2_r3").unwrap();
        assert!((hub.position().x - 15.0).abs() < 1e-9);
        assert!((hub.position().y - 10.0).abs() < 1e-9);
    }
}
