//! Error types for the road-network engine.
//!
//! Referential-integrity failures surface as `Err` to the immediate caller;
//! lookups return `Option` so bulk callers can tolerate partial misses; a
//! search that finds no route is `None`, not an error.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An entity with the same external id is already registered.
    #[error("{kind} `{id}` already exists")]
    Duplicate { kind: &'static str, id: String },

    /// The referenced entity is not in the network.
    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },

    /// A route must contain at least one edge.
    #[error("route `{id}` has no edges")]
    EmptyRoute { id: String },

    /// Consecutive edges of a route do not share a junction.
    #[error("route `{id}` breaks continuity at edge `{edge}`")]
    BrokenRoute { id: String, edge: String },

    /// The edge is still contained in live routes and cascading was disabled.
    #[error("edge `{id}` is still referenced by {count} route(s)")]
    EdgeInUse { id: String, count: u32 },

    /// An edge description carried no lanes.
    #[error("edge `{id}` has no lanes")]
    NoLanes { id: String },

    /// A roundabout ring in the description is not a closed cycle of edges.
    #[error("roundabout ring [{ring}] is not a closed cycle")]
    BrokenRing { ring: String },

    /// A route offered as a continuation or as an anchored search context is
    /// not anchored at the junction in question.
    #[error("route `{route}` is not anchored at junction `{junction}`")]
    DetachedContext { route: String, junction: String },
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
