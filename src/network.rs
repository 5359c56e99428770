//! The road network: three entity stores plus every cross-entity invariant.
//!
//! All mutation goes through this type. Each public mutation re-derives the
//! aggregates it can affect (edge reference counts, starting/ending fringe
//! sets) before returning, so callers never observe a transiently broken
//! invariant.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::edge::Edge;
use crate::error::{Error, Result};
use crate::junction::{Approach, Junction};
use crate::route::Route;
use crate::store::{EdgeHandle, JunctionHandle, RouteHandle, Store};

/// Derived edge-to-edge adjacency: for each edge id, the set of edge ids that
/// may immediately precede it on some legal traversal.
pub type EdgeConnections = FxHashMap<String, FxHashSet<String>>;

/// Entity counts, for collaborators' logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub junctions: usize,
    pub edges: usize,
    pub routes: usize,
    pub roundabouts: usize,
    pub starting: usize,
    pub ending: usize,
}

#[derive(Debug, Clone)]
pub struct RoadNetwork {
    junctions: Store<JunctionHandle, Junction>,
    edges: Store<EdgeHandle, Edge>,
    routes: Store<RouteHandle, Route>,
    starting: FxHashSet<JunctionHandle>,
    ending: FxHashSet<JunctionHandle>,
    /// Ordered junction-id rings, as validated by the loader.
    roundabouts: Vec<Vec<String>>,
}

impl Default for RoadNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl RoadNetwork {
    pub fn new() -> Self {
        RoadNetwork {
            junctions: Store::new("junction"),
            edges: Store::new("edge"),
            routes: Store::new("route"),
            starting: FxHashSet::default(),
            ending: FxHashSet::default(),
            roundabouts: Vec::new(),
        }
    }

    // ----- registration ---------------------------------------------------

    pub fn add_junction(&mut self, junction: Junction) -> Result<JunctionHandle> {
        self.junctions.add(junction, false)
    }

    /// Register an edge. Both endpoint junctions must already exist and the
    /// edge must carry at least one lane.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeHandle> {
        if edge.lanes().is_empty() {
            return Err(Error::NoLanes {
                id: edge.id().to_string(),
            });
        }
        for endpoint in [edge.from(), edge.to()] {
            if !self.junctions.contains_id(endpoint) {
                return Err(Error::not_found("junction", endpoint));
            }
        }
        self.edges.add(edge, false)
    }

    /// Build a route over this network from an ordered edge-id list,
    /// validating existence and continuity. The result is unregistered until
    /// passed to [`RoadNetwork::add_route`].
    pub fn make_route<'a, I>(&self, id: impl Into<String>, edge_ids: I) -> Result<Route>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let id = id.into();
        let mut handles = Vec::new();
        for edge_id in edge_ids {
            let handle = self
                .edges
                .handle_of(edge_id)
                .ok_or_else(|| Error::not_found("edge", edge_id))?;
            handles.push(handle);
        }
        self.route_from_handles(id, handles)
    }

    pub(crate) fn route_from_handles(
        &self,
        id: String,
        edges: Vec<EdgeHandle>,
    ) -> Result<Route> {
        if edges.is_empty() {
            return Err(Error::EmptyRoute { id });
        }
        let mut prev: Option<&Edge> = None;
        for &handle in &edges {
            let edge = self
                .edges
                .get(handle)
                .ok_or_else(|| Error::not_found("edge", format!("#{:?}", handle)))?;
            if let Some(p) = prev {
                if p.to() != edge.from() {
                    return Err(Error::BrokenRoute {
                        id,
                        edge: edge.id().to_string(),
                    });
                }
            }
            prev = Some(edge);
        }
        let first = self.edges.get(edges[0]).unwrap_or_else(|| unreachable!());
        let last = self
            .edges
            .get(edges[edges.len() - 1])
            .unwrap_or_else(|| unreachable!());
        let (from, to) = (first.from().to_string(), last.to().to_string());
        Ok(Route::from_parts(id, edges, from, to))
    }

    /// Persist a route: every contained edge gains a reference, and the
    /// route's arrival key is created at its end junction (initially with no
    /// continuations, which is exactly the "ending" predicate).
    pub fn add_route(&mut self, route: Route) -> Result<RouteHandle> {
        for &eh in route.edges() {
            if !self.edges.contains(eh) {
                return Err(Error::not_found("edge", format!("#{:?}", eh)));
            }
        }
        let from = self
            .junctions
            .handle_of(route.from())
            .ok_or_else(|| Error::not_found("junction", route.from()))?;
        let to = self
            .junctions
            .handle_of(route.to())
            .ok_or_else(|| Error::not_found("junction", route.to()))?;

        let edges: Vec<EdgeHandle> = route.edges().to_vec();
        let handle = self.routes.add(route, false)?;
        for eh in edges {
            if let Some(edge) = self.edges.get_mut(eh) {
                edge.retain();
            }
        }
        if let Some(end) = self.junctions.get_mut(to) {
            end.ensure_approach(Approach::Via(handle));
        }
        self.check_fringe(from);
        self.check_fringe(to);
        Ok(handle)
    }

    /// Record that `to` may legally continue traffic arriving via `from`.
    pub fn link_continuation(&mut self, from: RouteHandle, to: RouteHandle) -> Result<()> {
        let (junction_id, to_start) = {
            let from_route = self
                .routes
                .get(from)
                .ok_or_else(|| Error::not_found("route", format!("#{:?}", from)))?;
            let to_route = self
                .routes
                .get(to)
                .ok_or_else(|| Error::not_found("route", format!("#{:?}", to)))?;
            (
                from_route.to().to_string(),
                to_route.from().to_string(),
            )
        };
        if junction_id != to_start {
            return Err(Error::DetachedContext {
                route: self.routes.get(to).map(|r| r.id().to_string()).unwrap_or_default(),
                junction: junction_id,
            });
        }
        let jh = self
            .junctions
            .handle_of(&junction_id)
            .ok_or_else(|| Error::not_found("junction", junction_id.as_str()))?;
        if let Some(junction) = self.junctions.get_mut(jh) {
            junction.link(Approach::Via(from), to);
        }
        self.check_fringe(jh);
        Ok(())
    }

    /// Mark `route` as reachable directly from the network boundary: its
    /// start junction becomes a starting (entry) junction.
    pub fn link_entry(&mut self, route: RouteHandle) -> Result<()> {
        let start = {
            let r = self
                .routes
                .get(route)
                .ok_or_else(|| Error::not_found("route", format!("#{:?}", route)))?;
            r.from().to_string()
        };
        let jh = self
            .junctions
            .handle_of(&start)
            .ok_or_else(|| Error::not_found("junction", start.as_str()))?;
        if let Some(junction) = self.junctions.get_mut(jh) {
            junction.link(Approach::Entry, route);
        }
        self.check_fringe(jh);
        Ok(())
    }

    // ----- removal (cascading) --------------------------------------------

    /// Remove a persisted route: unlink it from its endpoint junctions,
    /// release its edges and, with `cascade_edges`, drop edges that became
    /// unreferenced. Fringe membership of both endpoints is re-derived.
    pub fn remove_route(&mut self, handle: RouteHandle, cascade_edges: bool) -> Result<()> {
        let route = self.routes.remove(handle)?;
        for jid in [route.from(), route.to()] {
            if let Some(junction) = self.junctions.by_id_mut(jid) {
                junction.unlink(handle);
            }
        }
        for &eh in route.edges() {
            let unreferenced = match self.edges.get_mut(eh) {
                Some(edge) => {
                    edge.release();
                    !edge.is_referenced()
                }
                None => false,
            };
            if cascade_edges && unreferenced {
                let _ = self.edges.remove(eh);
            }
        }
        for jid in [route.from(), route.to()] {
            if let Some(jh) = self.junctions.handle_of(jid) {
                self.check_fringe(jh);
            }
        }
        Ok(())
    }

    /// Remove an edge. A still-referenced edge requires `cascade_routes`:
    /// every route containing it is removed first (releasing other edges in
    /// turn), then the edge itself.
    pub fn remove_edge(&mut self, handle: EdgeHandle, cascade_routes: bool) -> Result<()> {
        let (id, referenced) = {
            let edge = self
                .edges
                .get(handle)
                .ok_or_else(|| Error::not_found("edge", format!("#{:?}", handle)))?;
            (edge.id().to_string(), edge.ref_count())
        };
        if referenced > 0 {
            if !cascade_routes {
                return Err(Error::EdgeInUse {
                    id,
                    count: referenced,
                });
            }
            for rh in self.routes_containing_edge(handle) {
                self.remove_route(rh, true)?;
            }
        }
        // The cascade may already have dropped it with its last route.
        if self.edges.contains(handle) {
            self.edges.remove(handle)?;
        }
        Ok(())
    }

    /// Remove a junction with all incident routes (outgoing first, then
    /// incoming) and, per the cascade flags, incident edges.
    pub fn remove_junction(
        &mut self,
        handle: JunctionHandle,
        cascade_edges: bool,
        cascade_routes: bool,
    ) -> Result<()> {
        let id = {
            let junction = self
                .junctions
                .get(handle)
                .ok_or_else(|| Error::not_found("junction", format!("#{:?}", handle)))?;
            junction.id().to_string()
        };

        let outgoing: Vec<RouteHandle> = self
            .routes
            .iter()
            .filter(|r| r.from() == id)
            .filter_map(|r| r.handle())
            .collect();
        let incoming: Vec<RouteHandle> = self
            .routes
            .iter()
            .filter(|r| r.to() == id && r.from() != id)
            .filter_map(|r| r.handle())
            .collect();
        for rh in outgoing.into_iter().chain(incoming) {
            if self.routes.contains(rh) {
                self.remove_route(rh, cascade_edges)?;
            }
        }

        if cascade_edges {
            let incident: Vec<EdgeHandle> = self
                .edges
                .iter()
                .filter(|e| e.from() == id || e.to() == id)
                .map(|e| e.handle())
                .collect();
            for eh in incident {
                if !self.edges.contains(eh) {
                    continue;
                }
                let referenced = self.edges.get(eh).map(Edge::is_referenced).unwrap_or(false);
                if !referenced {
                    self.edges.remove(eh)?;
                } else if cascade_routes {
                    self.remove_edge(eh, true)?;
                }
            }
        }

        self.junctions.remove(handle)?;
        self.starting.remove(&handle);
        self.ending.remove(&handle);
        Ok(())
    }

    /// Re-derive starting/ending membership for one junction. Invoked by
    /// every mutation touching that junction's connectivity.
    pub fn check_fringe(&mut self, handle: JunctionHandle) {
        match self.junctions.get(handle) {
            Some(junction) => {
                if junction.is_starting() {
                    self.starting.insert(handle);
                } else {
                    self.starting.remove(&handle);
                }
                if junction.is_ending() {
                    self.ending.insert(handle);
                } else {
                    self.ending.remove(&handle);
                }
            }
            None => {
                self.starting.remove(&handle);
                self.ending.remove(&handle);
            }
        }
    }

    // ----- lookup ---------------------------------------------------------

    pub fn junction(&self, handle: JunctionHandle) -> Option<&Junction> {
        self.junctions.get(handle)
    }

    pub fn junction_by_id(&self, id: &str) -> Option<&Junction> {
        self.junctions.by_id(id)
    }

    pub fn edge(&self, handle: EdgeHandle) -> Option<&Edge> {
        self.edges.get(handle)
    }

    pub fn edge_by_id(&self, id: &str) -> Option<&Edge> {
        self.edges.by_id(id)
    }

    pub fn route(&self, handle: RouteHandle) -> Option<&Route> {
        self.routes.get(handle)
    }

    pub fn route_by_id(&self, id: &str) -> Option<&Route> {
        self.routes.by_id(id)
    }

    /// Bulk junction lookup; see [`Store::many_by_id`] for the absent policy.
    pub fn junctions_by_id<'a, I>(&self, ids: I, filter_absent: bool) -> Option<Vec<&Junction>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.junctions.many_by_id(ids, filter_absent)
    }

    pub fn edges_by_id<'a, I>(&self, ids: I, filter_absent: bool) -> Option<Vec<&Edge>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.edges.many_by_id(ids, filter_absent)
    }

    pub fn routes_by_id<'a, I>(&self, ids: I, filter_absent: bool) -> Option<Vec<&Route>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.routes.many_by_id(ids, filter_absent)
    }

    pub fn junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn starting_junctions(&self) -> impl Iterator<Item = &Junction> {
        self.starting.iter().filter_map(|&h| self.junctions.get(h))
    }

    pub fn ending_junctions(&self) -> impl Iterator<Item = &Junction> {
        self.ending.iter().filter_map(|&h| self.junctions.get(h))
    }

    pub fn roundabouts(&self) -> &[Vec<String>] {
        &self.roundabouts
    }

    pub fn add_roundabout(&mut self, ring: Vec<String>) {
        self.roundabouts.push(ring);
    }

    pub(crate) fn take_roundabouts(&mut self) -> Vec<Vec<String>> {
        std::mem::take(&mut self.roundabouts)
    }

    pub(crate) fn set_roundabouts(&mut self, rings: Vec<Vec<String>>) {
        self.roundabouts = rings;
    }

    /// Routes that may continue traffic arriving via `route`, at its end
    /// junction.
    pub fn continuations(&self, route: RouteHandle) -> Vec<RouteHandle> {
        let Some(r) = self.routes.get(route) else {
            return Vec::new();
        };
        match self.junctions.by_id(r.to()) {
            Some(junction) => junction.reachable_from(Approach::Via(route)).to_vec(),
            None => Vec::new(),
        }
    }

    /// Distinct routes leaving the given junction under any approach.
    pub fn departures(&self, junction_id: &str) -> Vec<RouteHandle> {
        self.junctions
            .by_id(junction_id)
            .map(|j| j.outgoing_routes())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            junctions: self.junctions.len(),
            edges: self.edges.len(),
            routes: self.routes.len(),
            roundabouts: self.roundabouts.len(),
            starting: self.starting.len(),
            ending: self.ending.len(),
        }
    }

    // ----- derived connectivity -------------------------------------------

    /// Derive the authoritative "edge B may immediately follow edge A"
    /// adjacency, keyed by the *following* edge id. Sources: every persisted
    /// route's internal edge sequence, plus the junction boundary between
    /// each arriving route and its legal continuations.
    pub fn get_edges_connections(&self) -> EdgeConnections {
        let mut connections: EdgeConnections = FxHashMap::default();
        let edge_id = |h: EdgeHandle| self.edges.get(h).map(|e| e.id().to_string());

        for route in self.routes.iter() {
            for pair in route.edges().windows(2) {
                if let (Some(prev), Some(next)) = (edge_id(pair[0]), edge_id(pair[1])) {
                    connections.entry(next).or_default().insert(prev);
                }
            }
        }
        for junction in self.junctions.iter() {
            for (approach, continuations) in junction.approaches() {
                let Approach::Via(arriving) = approach else {
                    continue;
                };
                let Some(prev) = self.routes.get(arriving).and_then(|r| edge_id(r.last_edge()))
                else {
                    continue;
                };
                for &out in continuations {
                    if let Some(next) =
                        self.routes.get(out).and_then(|r| edge_id(r.first_edge()))
                    {
                        connections.entry(next).or_default().insert(prev.clone());
                    }
                }
            }
        }
        connections
    }

    /// Whether the literal edge-id list is traversable in this network.
    pub fn check_edge_sequence<'a, I>(&self, edge_ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids: Vec<&str> = edge_ids.into_iter().collect();
        if ids.is_empty() {
            return false;
        }
        if ids.iter().any(|id| !self.edges.contains_id(id)) {
            return false;
        }
        let connections = self.get_edges_connections();
        ids.windows(2).all(|pair| {
            connections
                .get(pair[1])
                .map(|preds| preds.contains(pair[0]))
                .unwrap_or(false)
        })
    }

    /// Longest contiguous sub-sequence of `edge_ids` that is actually
    /// connected in *this* network. Used to project an externally described
    /// path onto a (sub)network.
    pub fn get_longest_sequence<'a, I>(&self, edge_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids: Vec<&str> = edge_ids.into_iter().collect();
        let connections = self.get_edges_connections();
        let mut best: &[&str] = &[];
        let mut run_start = 0usize;
        let mut run_len = 0usize;
        for (i, id) in ids.iter().enumerate() {
            if !self.edges.contains_id(id) {
                run_len = 0;
                continue;
            }
            let linked = run_len > 0
                && connections
                    .get(*id)
                    .map(|preds| preds.contains(ids[i - 1]))
                    .unwrap_or(false);
            if linked {
                run_len += 1;
            } else {
                run_start = i;
                run_len = 1;
            }
            if run_len > best.len() {
                best = &ids[run_start..run_start + run_len];
            }
        }
        best.iter().map(|s| s.to_string()).collect()
    }

    // ----- set algebra ----------------------------------------------------

    /// Junctions present in both operands (by external id), with edges and
    /// routes pared down by the removal cascade.
    pub fn intersection(&self, other: &RoadNetwork) -> RoadNetwork {
        self.restrict(|id| other.junctions.contains_id(id))
    }

    /// Junctions of `self` minus those also present in `other`.
    pub fn difference(&self, other: &RoadNetwork) -> RoadNetwork {
        self.restrict(|id| !other.junctions.contains_id(id))
    }

    fn restrict(&self, keep: impl Fn(&str) -> bool) -> RoadNetwork {
        let mut result = self.clone();
        let doomed: Vec<JunctionHandle> = result
            .junctions
            .iter()
            .filter(|j| !keep(j.id()))
            .map(|j| j.handle())
            .collect();
        for handle in doomed {
            if result.junctions.contains(handle) {
                // Infallible: the handle was just enumerated.
                let _ = result.remove_junction(handle, true, true);
            }
        }
        result
            .roundabouts
            .retain(|ring| ring.iter().all(|id| result.junctions.contains_id(id)));
        debug!(
            junctions = result.junctions.len(),
            edges = result.edges.len(),
            routes = result.routes.len(),
            "derived restricted network"
        );
        result
    }

    // ----- internals ------------------------------------------------------

    pub(crate) fn routes_containing_edge(&self, edge: EdgeHandle) -> Vec<RouteHandle> {
        self.routes
            .iter()
            .filter(|r| r.contains_edge(edge))
            .filter_map(|r| r.handle())
            .collect()
    }

    pub(crate) fn routes_starting_at(&self, junction_id: &str) -> Vec<RouteHandle> {
        self.routes
            .iter()
            .filter(|r| r.from() == junction_id)
            .filter_map(|r| r.handle())
            .collect()
    }

    pub(crate) fn junction_mut_by_id(&mut self, id: &str) -> Option<&mut Junction> {
        self.junctions.by_id_mut(id)
    }

    /// Total length (meters) of a route's edges, the cost metric of the
    /// path search.
    pub fn route_length(&self, route: &Route) -> f64 {
        route
            .edges()
            .iter()
            .filter_map(|&h| self.edges.get(h))
            .map(Edge::length)
            .sum()
    }

    /// Free-flow travel time (seconds) over a route.
    pub fn route_travel_time(&self, route: &Route) -> f64 {
        route
            .edges()
            .iter()
            .filter_map(|&h| self.edges.get(h))
            .map(Edge::travel_time)
            .sum()
    }
}

/// Two networks are equal iff their junction and edge id sets match and the
/// derived edge-to-edge connectivity is identical. Route identities and
/// handles are deliberately ignored: simplification replaces routes while
/// preserving traversability.
impl PartialEq for RoadNetwork {
    fn eq(&self, other: &Self) -> bool {
        let mut mine: Vec<&str> = self.junctions.ids().collect();
        let mut theirs: Vec<&str> = other.junctions.ids().collect();
        mine.sort_unstable();
        theirs.sort_unstable();
        if mine != theirs {
            return false;
        }
        let mut mine: Vec<&str> = self.edges.ids().collect();
        let mut theirs: Vec<&str> = other.edges.ids().collect();
        mine.sort_unstable();
        theirs.sort_unstable();
        if mine != theirs {
            return false;
        }
        self.get_edges_connections() == other.get_edges_connections()
    }
}
