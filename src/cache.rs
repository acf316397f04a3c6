//! Process-local mapping `version -> materialized map`. This is also the
//! store-wide commit lock: the same mutex that guards the map table is
//! held across a commit's rename-then-publish, so no reader can observe a
//! half-published version.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use crate::id::Version;

/// An immutable-once-published snapshot of a store's current key/value
/// pairs. Mutated only while owned by an `UpdateSession`'s working copy;
/// once inserted into the cache it is shared by `Arc` and never mutated.
pub type MaterializedMap = HashMap<Vec<u8>, Vec<u8>>;

pub struct MapCache {
    entries: Mutex<HashMap<Version, Arc<MaterializedMap>>>,
}

impl MapCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached map for `version`, if present.
    pub fn get(&self, version: Version) -> Option<Arc<MaterializedMap>> {
        self.entries.lock().unwrap().get(&version).cloned()
    }

    /// Idempotent insert: populated by both the loader and by commit; either
    /// value is equivalent under invariant 3 of the data model.
    pub fn insert(&self, version: Version, map: Arc<MaterializedMap>) {
        self.entries.lock().unwrap().entry(version).or_insert(map);
    }

    /// Evicts every entry whose version is strictly less than `earliest`.
    pub fn evict_older_than(&self, earliest: Version) {
        self.entries.lock().unwrap().retain(|v, _| *v >= earliest);
    }

    pub fn contains(&self, version: Version) -> bool {
        self.entries.lock().unwrap().contains_key(&version)
    }

    /// The highest version currently cached, if any.
    pub fn max_version(&self) -> Option<Version> {
        self.entries.lock().unwrap().keys().copied().max()
    }

    /// Performs `rename` while holding the store-wide lock, then publishes
    /// `map` into the cache under the same critical section: this is the
    /// commit linearization point. Before this call returns no reader can
    /// observe the new version; after it returns, both the renamed file
    /// and the cache entry are visible together.
    pub fn commit_and_publish(
        &self,
        version: Version,
        map: Arc<MaterializedMap>,
        rename: impl FnOnce() -> io::Result<()>,
    ) -> io::Result<()> {
        let mut guard = self.entries.lock().unwrap();
        rename()?;
        guard.insert(version, map);
        Ok(())
    }
}

impl Default for MapCache {
    fn default() -> Self {
        Self::new()
    }
}
