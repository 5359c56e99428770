//! Dual-keyed entity stores.
//!
//! Every entity kind is addressable two ways: by its stable external string id
//! (as given by the network description) and by a dense sequential handle
//! assigned at registration. Handles are cheap copyable keys for internal
//! maps; external ids are the cross-network identity used by set algebra and
//! equality.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

/// A dense sequential index into one entity store.
pub trait Handle: Copy + Eq + std::hash::Hash {
    fn from_index(index: u32) -> Self;
    fn index(self) -> u32;
}

macro_rules! handle_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl Handle for $name {
            fn from_index(index: u32) -> Self {
                $name(index)
            }
            fn index(self) -> u32 {
                self.0
            }
        }
    };
}

handle_type!(
    /// Handle of a registered junction.
    JunctionHandle
);
handle_type!(
    /// Handle of a registered edge.
    EdgeHandle
);
handle_type!(
    /// Handle of a persisted route. Temporary routes never get one.
    RouteHandle
);

/// A stored entity: knows its external id and accepts its handle exactly once,
/// at registration.
pub trait Keyed<H: Handle> {
    fn id(&self) -> &str;
    fn assign_handle(&mut self, handle: H);
}

#[derive(Debug, Clone)]
pub struct Store<H: Handle, T: Keyed<H>> {
    kind: &'static str,
    by_handle: FxHashMap<H, T>,
    by_id: FxHashMap<String, H>,
    next_index: u32,
}

impl<H: Handle, T: Keyed<H>> Store<H, T> {
    pub fn new(kind: &'static str) -> Self {
        Store {
            kind,
            by_handle: FxHashMap::default(),
            by_id: FxHashMap::default(),
            next_index: 0,
        }
    }

    /// Register an entity, assigning it a fresh handle. Fails with
    /// [`Error::Duplicate`] if the external id is taken and `replace` is false.
    pub fn add(&mut self, mut entity: T, replace: bool) -> Result<H> {
        if let Some(&old) = self.by_id.get(entity.id()) {
            if !replace {
                return Err(Error::Duplicate {
                    kind: self.kind,
                    id: entity.id().to_string(),
                });
            }
            self.by_handle.remove(&old);
        }
        let handle = H::from_index(self.next_index);
        self.next_index += 1;
        entity.assign_handle(handle);
        self.by_id.insert(entity.id().to_string(), handle);
        self.by_handle.insert(handle, entity);
        Ok(handle)
    }

    pub fn remove(&mut self, handle: H) -> Result<T> {
        let entity = self.by_handle.remove(&handle).ok_or_else(|| {
            Error::not_found(self.kind, format!("#{}", handle.index()))
        })?;
        self.by_id.remove(entity.id());
        Ok(entity)
    }

    pub fn remove_by_id(&mut self, id: &str) -> Result<T> {
        let handle = self
            .handle_of(id)
            .ok_or_else(|| Error::not_found(self.kind, id))?;
        self.remove(handle)
    }

    pub fn contains(&self, handle: H) -> bool {
        self.by_handle.contains_key(&handle)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn handle_of(&self, id: &str) -> Option<H> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, handle: H) -> Option<&T> {
        self.by_handle.get(&handle)
    }

    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        self.by_handle.get_mut(&handle)
    }

    pub fn by_id(&self, id: &str) -> Option<&T> {
        self.handle_of(id).and_then(|h| self.get(h))
    }

    pub fn by_id_mut(&mut self, id: &str) -> Option<&mut T> {
        let handle = self.handle_of(id)?;
        self.get_mut(handle)
    }

    /// Bulk lookup by external id. With `filter_absent` unknown ids are
    /// silently skipped; otherwise any miss makes the whole lookup `None`.
    pub fn many_by_id<'a, I>(&self, ids: I, filter_absent: bool) -> Option<Vec<&T>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut found = Vec::new();
        for id in ids {
            match self.by_id(id) {
                Some(entity) => found.push(entity),
                None if filter_absent => {}
                None => return None,
            }
        }
        Some(found)
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.by_handle.values()
    }

    pub fn handles(&self) -> impl Iterator<Item = H> + '_ {
        self.by_handle.keys().copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dummy {
        id: String,
        handle: Option<JunctionHandle>,
        payload: u32,
    }

    impl Keyed<JunctionHandle> for Dummy {
        fn id(&self) -> &str {
            &self.id
        }
        fn assign_handle(&mut self, handle: JunctionHandle) {
            self.handle = Some(handle);
        }
    }

    fn dummy(id: &str, payload: u32) -> Dummy {
        Dummy {
            id: id.to_string(),
            handle: None,
            payload,
        }
    }

    #[test]
    fn add_assigns_sequential_handles() {
        let mut store = Store::new("dummy");
        let a = store.add(dummy("a", 1), false).unwrap();
        let b = store.add(dummy("b", 2), false).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(store.get(a).unwrap().handle, Some(a));
    }

    #[test]
    fn duplicate_id_rejected_unless_replace() {
        let mut store = Store::new("dummy");
        store.add(dummy("a", 1), false).unwrap();
        assert!(matches!(
            store.add(dummy("a", 2), false),
            Err(Error::Duplicate { .. })
        ));
        let h = store.add(dummy("a", 2), true).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(h).unwrap().payload, 2);
    }

    #[test]
    fn remove_clears_both_keys() {
        let mut store = Store::new("dummy");
        let h = store.add(dummy("a", 1), false).unwrap();
        store.remove(h).unwrap();
        assert!(!store.contains(h));
        assert!(!store.contains_id("a"));
        assert!(matches!(store.remove_by_id("a"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn bulk_lookup_tolerates_misses_only_when_asked() {
        let mut store = Store::new("dummy");
        store.add(dummy("a", 1), false).unwrap();
        store.add(dummy("b", 2), false).unwrap();
        assert!(store.many_by_id(["a", "missing"], false).is_none());
        let found = store.many_by_id(["a", "missing", "b"], true).unwrap();
        assert_eq!(found.len(), 2);
    }
}
