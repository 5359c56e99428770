//! Routes: the unit of traversal.
//!
//! A raw edge is not enough to describe legal movement, because the same edge
//! may only be entered from specific predecessors depending on prior turns. A
//! route is an ordered contiguous edge sequence; junction connectivity and the
//! path search both operate on routes, never on bare edges.
//!
//! Routes come in two states: *persisted* (registered in a network, holding a
//! handle and a reference count on every contained edge) and *temporary*
//! (search results and merge intermediates; no handle, no reference counts).

use crate::store::{EdgeHandle, Keyed, RouteHandle};

#[derive(Debug, Clone)]
pub struct Route {
    id: String,
    handle: Option<RouteHandle>,
    edges: Vec<EdgeHandle>,
    from: String,
    to: String,
}

impl Keyed<RouteHandle> for Route {
    fn id(&self) -> &str {
        &self.id
    }
    fn assign_handle(&mut self, handle: RouteHandle) {
        self.handle = Some(handle);
    }
}

impl Route {
    /// Build a route from already-validated parts. Callers outside this crate
    /// go through `RoadNetwork::make_route`, which checks edge existence and
    /// continuity against a concrete network.
    pub(crate) fn from_parts(
        id: impl Into<String>,
        edges: Vec<EdgeHandle>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        debug_assert!(!edges.is_empty());
        Route {
            id: id.into(),
            handle: None,
            edges,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle of a persisted route; temporary routes have none.
    pub fn handle(&self) -> Option<RouteHandle> {
        self.handle
    }

    pub fn is_persisted(&self) -> bool {
        self.handle.is_some()
    }

    pub fn edges(&self) -> &[EdgeHandle] {
        &self.edges
    }

    pub fn first_edge(&self) -> EdgeHandle {
        self.edges[0]
    }

    pub fn last_edge(&self) -> EdgeHandle {
        self.edges[self.edges.len() - 1]
    }

    pub fn contains_edge(&self, edge: EdgeHandle) -> bool {
        self.edges.contains(&edge)
    }

    /// External id of the junction this route starts at.
    pub fn from(&self) -> &str {
        &self.from
    }

    /// External id of the junction this route ends at.
    pub fn to(&self) -> &str {
        &self.to
    }
}
