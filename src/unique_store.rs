//! ID+name registry shared by a frame's connectors and the system's frames.
//!
//! Every entry is reachable both by a numeric uid (assigned once, never reused) and by a name.
//! Names must be unique within one store; see [`UniqueStore::resolve_name`] for the
//! disambiguation policy this crate picked for the spec's open question on duplicate names.

use std::collections::HashMap;

/// Maps `uid -> (name, entry)` and `name -> uid`.
pub(crate) struct UniqueStore<T> {
    next_id: u64,
    by_id: HashMap<u64, (String, T)>,
    by_name: HashMap<String, u64>,
}

impl<T> UniqueStore<T> {
    pub(crate) fn new() -> Self {
        UniqueStore {
            next_id: 0,
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Reserves a fresh uid without storing anything under it yet.
    pub(crate) fn reserve_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Picks a name that is not currently in use, starting from `requested`.
    ///
    /// Duplicate names are not rejected: a colliding request is disambiguated by suffixing the
    /// uid, and a second collision (the suffixed name itself already taken, which can only
    /// happen if a caller requests an already-uid-suffixed name) falls back to the bare uid.
    /// This is the documented choice for the spec's open question — matching the source
    /// system's own behaviour of storing under a generated name rather than failing hard.
    pub(crate) fn resolve_name(&self, requested: &str, uid: u64) -> String {
        if !self.by_name.contains_key(requested) {
            return requested.to_string();
        }
        let suffixed = format!("{requested}-{uid}");
        if !self.by_name.contains_key(&suffixed) {
            return suffixed;
        }
        uid.to_string()
    }

    pub(crate) fn insert(&mut self, uid: u64, name: String, entry: T) {
        self.by_name.insert(name.clone(), uid);
        self.by_id.insert(uid, (name, entry));
    }

    pub(crate) fn for_id(&self, uid: u64) -> Option<&T> {
        self.by_id.get(&uid).map(|(_, entry)| entry)
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Option<&T> {
        let uid = self.by_name.get(name)?;
        self.for_id(*uid)
    }

    /// Removes the entry for `uid`, if any, returning it. Idempotent: a second call for the same
    /// uid returns `None`.
    pub(crate) fn try_release_by_id(&mut self, uid: u64) -> Option<T> {
        let (name, entry) = self.by_id.remove(&uid)?;
        self.by_name.remove(&name);
        Some(entry)
    }

    pub(crate) fn ids(&self) -> Vec<u64> {
        self.by_id.keys().copied().collect()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &T> {
        self.by_id.values().map(|(_, entry)| entry)
    }
}
