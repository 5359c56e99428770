//! Route search: A* plus cost-capped alternative enumeration.
//!
//! The search frontier is route-level, not edge-level: expansion follows a
//! junction's approach-indexed connectivity, so turn legality is respected by
//! construction. Loop avoidance is edge-based — a multigraph legally revisits
//! a junction via a different edge, so junction-based cycle checks would be
//! wrong.
//!
//! The heuristic is the straight-line distance to the destination junction,
//! admissible because the cost metric is physical length.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::geo::{straight_distance, Point};
use crate::network::RoadNetwork;
use crate::route::Route;
use crate::store::{EdgeHandle, RouteHandle};

/// Per-search overlay of allowed-first/allowed-last restrictions.
///
/// Routes default to being usable both as the first and the last segment of a
/// result; a caller re-planning a sub-segment can demote specific routes to
/// interior-only. The overlay is owned by the search call, so concurrent or
/// repeated searches over the same network never interfere and nothing has to
/// be reset afterwards.
#[derive(Debug, Clone, Default)]
pub struct RouteFlags {
    overlay: FxHashMap<RouteHandle, (bool, bool)>,
}

impl RouteFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forbid_first(&mut self, route: RouteHandle) {
        self.overlay.entry(route).or_insert((true, true)).0 = false;
    }

    pub fn forbid_last(&mut self, route: RouteHandle) {
        self.overlay.entry(route).or_insert((true, true)).1 = false;
    }

    /// The route may only appear strictly inside a result.
    pub fn interior_only(&mut self, route: RouteHandle) {
        self.overlay.insert(route, (false, false));
    }

    pub fn allowed_first(&self, route: RouteHandle) -> bool {
        self.overlay.get(&route).map(|f| f.0).unwrap_or(true)
    }

    pub fn allowed_last(&self, route: RouteHandle) -> bool {
        self.overlay.get(&route).map(|f| f.1).unwrap_or(true)
    }
}

#[derive(Debug, Clone)]
struct SearchState {
    estimated_total: f64,
    cost: f64,
    route: RouteHandle,
    path: Vec<EdgeHandle>,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.estimated_total == other.estimated_total
    }
}

impl Eq for SearchState {}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior
        other
            .estimated_total
            .partial_cmp(&self.estimated_total)
            .unwrap_or(Ordering::Equal)
    }
}

/// A search result: a temporary route (unregistered, no reference counts) and
/// its accumulated cost in meters.
#[derive(Debug, Clone)]
pub struct FoundRoute {
    pub route: Route,
    pub cost: f64,
}

/// The still-live frontier of a finished search, reusable for alternative
/// enumeration.
#[derive(Debug, Clone)]
pub struct Frontier {
    heap: BinaryHeap<SearchState>,
    start_id: String,
    goal_id: String,
    goal_pos: Point,
}

impl Frontier {
    /// Lowest estimated total cost still queued.
    pub fn min_priority(&self) -> Option<f64> {
        self.heap.peek().map(|s| s.estimated_total)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// The best route plus the alternatives found under the cost cutoff, in
/// discovery order. Alternatives are cutoff-bounded, not guaranteed to be the
/// globally k-shortest beyond the first.
#[derive(Debug, Clone)]
pub struct TopKRoutes {
    pub best: FoundRoute,
    pub alternatives: Vec<FoundRoute>,
}

/// Read-only route queries over one network.
pub struct PathFinder<'a> {
    net: &'a RoadNetwork,
}

impl<'a> PathFinder<'a> {
    pub fn new(net: &'a RoadNetwork) -> Self {
        PathFinder { net }
    }

    /// Shortest route from `start` to `end` by total edge length.
    ///
    /// With `entry_context`, the search resumes as if having just arrived at
    /// `start` via that route (the anchored form used when re-planning a
    /// sub-segment); the context route must end at `start`. Returns the
    /// optimal route together with the live frontier, or `None` when no path
    /// exists — an expected outcome, not an error.
    pub fn a_star(
        &self,
        start: &str,
        end: &str,
        entry_context: Option<RouteHandle>,
        flags: &RouteFlags,
    ) -> Option<(FoundRoute, Frontier)> {
        let goal_pos = self.net.junction_by_id(end)?.position();
        let seeds = match entry_context {
            None => self.net.departures(start),
            Some(context) => {
                let route = self.net.route(context)?;
                if route.to() != start {
                    return None;
                }
                self.net.continuations(context)
            }
        };

        let mut frontier = Frontier {
            heap: BinaryHeap::new(),
            start_id: start.to_string(),
            goal_id: end.to_string(),
            goal_pos,
        };
        for seed in seeds {
            if flags.allowed_first(seed) {
                self.push(&mut frontier, seed, 0.0, &[]);
            }
        }
        let found = self.drive(&mut frontier, flags)?;
        Some((found, frontier))
    }

    /// Optimal route plus up to `k` alternatives whose cost stays within
    /// `c × optimal` (`c > 1`). Degrades to the optimal route alone when no
    /// alternative satisfies the cutoff.
    pub fn top_k_a_star(
        &self,
        start: &str,
        end: &str,
        c: f64,
        k: usize,
        flags: &RouteFlags,
    ) -> Option<TopKRoutes> {
        let (best, mut frontier) = self.a_star(start, end, None, flags)?;
        let cutoff = c * best.cost;
        let mut alternatives = Vec::new();

        while alternatives.len() < k {
            match frontier.min_priority() {
                None => break,
                Some(p) if p > cutoff => break,
                Some(_) => {}
            }
            let state = frontier
                .heap
                .pop()
                .unwrap_or_else(|| unreachable!("peeked non-empty heap"));
            let Some(route) = self.net.route(state.route) else {
                continue;
            };
            if route.to() == frontier.goal_id && flags.allowed_last(state.route) {
                if state.cost <= cutoff {
                    alternatives.push(self.materialize(&state, &frontier));
                }
                // Arrivals terminate their path; no expansion through the
                // destination.
            } else {
                self.expand(&mut frontier, &state);
            }
        }
        debug!(
            cutoff,
            found = alternatives.len(),
            frontier = frontier.len(),
            "alternative enumeration done"
        );
        Some(TopKRoutes { best, alternatives })
    }

    /// Pop until the first admissible arrival at the goal.
    fn drive(&self, frontier: &mut Frontier, flags: &RouteFlags) -> Option<FoundRoute> {
        while let Some(state) = frontier.heap.pop() {
            let Some(route) = self.net.route(state.route) else {
                continue;
            };
            if route.to() == frontier.goal_id && flags.allowed_last(state.route) {
                return Some(self.materialize(&state, frontier));
            }
            self.expand(frontier, &state);
        }
        None
    }

    fn expand(&self, frontier: &mut Frontier, state: &SearchState) {
        for next in self.net.continuations(state.route) {
            let Some(candidate) = self.net.route(next) else {
                continue;
            };
            // Edge-based loop avoidance: no edge may be driven twice, and
            // merged routes can share interior edges, so every candidate
            // edge is checked, not just the first.
            if candidate
                .edges()
                .iter()
                .any(|edge| state.path.contains(edge))
            {
                continue;
            }
            self.push(frontier, next, state.cost, &state.path);
        }
    }

    fn push(
        &self,
        frontier: &mut Frontier,
        route: RouteHandle,
        base_cost: f64,
        base_path: &[EdgeHandle],
    ) {
        let Some(r) = self.net.route(route) else {
            return;
        };
        let cost = base_cost + self.net.route_length(r);
        let mut path = Vec::with_capacity(base_path.len() + r.edges().len());
        path.extend_from_slice(base_path);
        path.extend_from_slice(r.edges());
        // Missing end position degrades to a zero heuristic (plain Dijkstra
        // ordering for that entry).
        let heuristic = self
            .net
            .junction_by_id(r.to())
            .map(|j| straight_distance(j.position(), frontier.goal_pos))
            .unwrap_or(0.0);
        frontier.heap.push(SearchState {
            estimated_total: cost + heuristic,
            cost,
            route,
            path,
        });
    }

    /// Build the temporary result route. Endpoints come from the search, not
    /// from the first/last edge: after simplification a path may begin or end
    /// on a synthetic hub that no edge references.
    fn materialize(&self, state: &SearchState, frontier: &Frontier) -> FoundRoute {
        let route = Route::from_parts(
            format!("{}>{}", frontier.start_id, frontier.goal_id),
            state.path.clone(),
            frontier.start_id.clone(),
            frontier.goal_id.clone(),
        );
        FoundRoute {
            route,
            cost: state.cost,
        }
    }
}
