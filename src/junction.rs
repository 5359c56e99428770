//! Junctions and their approach-indexed connectivity.
//!
//! A junction does not map raw edges to edges: which routes may be taken out
//! of a junction depends on how traffic arrived there. The connectivity map is
//! therefore keyed by an [`Approach`] (network entry, or arrival via a
//! specific route) and valued with the routes that may legally continue.

use rustc_hash::FxHashMap;

use crate::geo::Point;
use crate::store::{JunctionHandle, Keyed, RouteHandle};

/// How traffic arrives at a junction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Approach {
    /// Traffic enters the network at this junction.
    Entry,
    /// Traffic arrives via the given route, which ends here.
    Via(RouteHandle),
}

#[derive(Debug, Clone)]
pub struct Junction {
    id: String,
    handle: Option<JunctionHandle>,
    position: Point,
    traffic_light: bool,
    connections: FxHashMap<Approach, Vec<RouteHandle>>,
}

impl Keyed<JunctionHandle> for Junction {
    fn id(&self) -> &str {
        &self.id
    }
    fn assign_handle(&mut self, handle: JunctionHandle) {
        self.handle = Some(handle);
    }
}

impl Junction {
    pub fn new(id: impl Into<String>, position: Point, traffic_light: bool) -> Self {
        Junction {
            id: id.into(),
            handle: None,
            position,
            traffic_light,
            connections: FxHashMap::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> JunctionHandle {
        self.handle.expect("junction not registered in a network")
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn has_traffic_light(&self) -> bool {
        self.traffic_light
    }

    /// Traffic can enter the network here.
    pub fn is_starting(&self) -> bool {
        self.connections.contains_key(&Approach::Entry)
    }

    /// Some approach has no continuation: traffic can leave the network here.
    pub fn is_ending(&self) -> bool {
        self.connections.values().any(Vec::is_empty)
    }

    /// Routes that may be taken out of this junction under `approach`.
    pub fn reachable_from(&self, approach: Approach) -> &[RouteHandle] {
        self.connections
            .get(&approach)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn approaches(&self) -> impl Iterator<Item = (Approach, &[RouteHandle])> {
        self.connections.iter().map(|(a, v)| (*a, v.as_slice()))
    }

    /// Routes arriving at this junction (the `Via` keys).
    pub fn incoming_routes(&self) -> impl Iterator<Item = RouteHandle> + '_ {
        self.connections.keys().filter_map(|a| match a {
            Approach::Via(r) => Some(*r),
            Approach::Entry => None,
        })
    }

    /// Distinct routes leaving this junction under any approach.
    pub fn outgoing_routes(&self) -> Vec<RouteHandle> {
        let mut seen = Vec::new();
        for list in self.connections.values() {
            for &r in list {
                if !seen.contains(&r) {
                    seen.push(r);
                }
            }
        }
        seen
    }

    /// Ensure the approach key exists, without adding continuations.
    pub(crate) fn ensure_approach(&mut self, approach: Approach) {
        self.connections.entry(approach).or_default();
    }

    /// Record `route` as a legal continuation under `approach`.
    pub(crate) fn link(&mut self, approach: Approach, route: RouteHandle) {
        let list = self.connections.entry(approach).or_default();
        if !list.contains(&route) {
            list.push(route);
        }
    }

    /// Drop every trace of `route`: its arrival key and every continuation
    /// slot that mentions it.
    pub(crate) fn unlink(&mut self, route: RouteHandle) {
        self.connections.remove(&Approach::Via(route));
        for list in self.connections.values_mut() {
            list.retain(|&r| r != route);
        }
    }

    /// Substitute `old` with `new` in every continuation list (arrival keys
    /// are untouched; the caller re-keys those through the network).
    pub(crate) fn replace_continuation(&mut self, old: RouteHandle, new: RouteHandle) {
        for list in self.connections.values_mut() {
            for slot in list.iter_mut() {
                if *slot == old {
                    *slot = new;
                }
            }
        }
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
