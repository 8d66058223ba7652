use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use super::ResolvedName;
use crate::Sid;

/// Append-only map of resolved names.
///
/// Reads load the current map without locking. Writers serialize on `append`
/// and publish a new map; a name, once stored, is never replaced.
#[derive(Debug)]
pub(crate) struct NameCache {
    entries: ArcSwap<HashMap<Sid, ResolvedName>>,
    append: Mutex<()>,
}

impl NameCache {
    pub(crate) fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
            append: Mutex::new(()),
        }
    }

    pub(crate) fn get(&self, sid: &Sid) -> Option<ResolvedName> {
        self.entries.load().get(sid).cloned()
    }

    /// Stores `name` unless `sid` already has one; returns the stored name.
    pub(crate) fn insert(&self, sid: Sid, name: ResolvedName) -> ResolvedName {
        let _append = self.append.lock();
        let current = self.entries.load_full();
        if let Some(existing) = current.get(&sid) {
            return existing.clone();
        }
        let mut next = HashMap::clone(&current);
        next.insert(sid, name.clone());
        self.entries.store(Arc::new(next));
        name
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }
}
