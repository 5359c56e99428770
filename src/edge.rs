//! Edges: directed physical road segments with lane-level detail.

use crate::geo::Point;
use crate::store::{EdgeHandle, Keyed};

/// One lane of an edge. Aggregate edge speed/length come from the
/// representative (first) lane.
#[derive(Debug, Clone)]
pub struct Lane {
    pub id: String,
    pub shape: Vec<Point>,
    /// Allowed speed, m/s.
    pub speed: f64,
    /// Driving length, meters.
    pub length: f64,
}

#[derive(Debug, Clone)]
pub struct Edge {
    id: String,
    handle: Option<EdgeHandle>,
    from: String,
    to: String,
    lanes: Vec<Lane>,
    /// Number of persisted routes currently containing this edge.
    ref_count: u32,
}

impl Keyed<EdgeHandle> for Edge {
    fn id(&self) -> &str {
        &self.id
    }
    fn assign_handle(&mut self, handle: EdgeHandle) {
        self.handle = Some(handle);
    }
}

impl Edge {
    /// `lanes` must be non-empty; the network checks this before registration.
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        lanes: Vec<Lane>,
    ) -> Self {
        Edge {
            id: id.into(),
            handle: None,
            from: from.into(),
            to: to.into(),
            lanes,
            ref_count: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> EdgeHandle {
        self.handle.expect("edge not registered in a network")
    }

    /// External id of the junction this edge leaves.
    pub fn from(&self) -> &str {
        &self.from
    }

    /// External id of the junction this edge reaches.
    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    fn representative(&self) -> &Lane {
        // Non-empty by construction (checked at add_edge).
        &self.lanes[0]
    }

    /// Aggregate allowed speed, m/s.
    pub fn speed(&self) -> f64 {
        self.representative().speed
    }

    /// Aggregate length, meters.
    pub fn length(&self) -> f64 {
        self.representative().length
    }

    /// Free-flow travel time, seconds.
    pub fn travel_time(&self) -> f64 {
        self.length() / self.speed()
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn is_referenced(&self) -> bool {
        self.ref_count > 0
    }

    pub(crate) fn retain(&mut self) {
        self.ref_count += 1;
    }

    pub(crate) fn release(&mut self) {
        debug_assert!(self.ref_count > 0, "edge `{}` released below zero", self.id);
        self.ref_count = self.ref_count.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_come_from_first_lane() {
        let edge = Edge::new(
            "e",
            "a",
            "b",
            vec![
                Lane {
                    id: "e_0".into(),
                    shape: vec![],
                    speed: 10.0,
                    length: 50.0,
                },
                Lane {
                    id: "e_1".into(),
                    shape: vec![],
                    speed: 20.0,
                    length: 60.0,
                },
            ],
        );
        assert_eq!(edge.speed(), 10.0);
        assert_eq!(edge.length(), 50.0);
        assert!((edge.travel_time() - 5.0).abs() < 1e-12);
    }
}
