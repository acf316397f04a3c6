//! One shard's public API: the data for one (operator, partition) pair,
//! shared by readers and the maintainer, with per-writer mutation staged
//! through a freshly obtained [`UpdateSession`].

use std::sync::Arc;

use crate::cache::{MapCache, MaterializedMap};
use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::id::{StoreId, Version};
use crate::layout::FileLayout;
use crate::loader::VersionLoader;
use crate::record::Record;
use crate::session::UpdateSession;

/// One shard: the data for one (operator, partition) pair. Cheap to clone
/// (an `Arc` handle internally) so the registry, the maintainer, and any
/// number of reader threads can share one instance.
#[derive(Clone)]
pub struct Store {
    id: StoreId,
    layout: Arc<FileLayout>,
    cache: Arc<MapCache>,
    config: StoreConfig,
}

impl Store {
    pub fn new(id: StoreId, root: impl AsRef<std::path::Path>, config: StoreConfig) -> Self {
        Self {
            id,
            layout: Arc::new(FileLayout::new(root, id)),
            cache: Arc::new(MapCache::new()),
            config,
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// The file layout backing this store. Exposed so the maintainer and
    /// test harnesses can inspect on-disk state directly.
    pub fn layout(&self) -> &Arc<FileLayout> {
        &self.layout
    }

    /// The in-memory version cache backing this store.
    pub fn cache(&self) -> &Arc<MapCache> {
        &self.cache
    }

    /// A fresh per-writer staging session. `UpdateSession::prepare` must be
    /// called on it before issuing updates or removals.
    pub fn new_session(&self) -> UpdateSession {
        UpdateSession::new(self.layout.clone(), self.cache.clone())
    }

    /// A lazy sequence over the `(key, value)` pairs at `version`.
    pub fn iterator(&self, version: Version) -> StoreResult<impl Iterator<Item = Record>> {
        let loader = VersionLoader::new(&self.layout, &self.cache);
        let map = loader.load_map(version)?;
        Ok(materialized_records(map))
    }

    /// A lazy sequence over the maximum of {versions on disk} ∪ {versions in
    /// the cache}. Returns an empty sequence if the store has no committed
    /// version yet.
    pub fn latest_iterator(&self) -> StoreResult<impl Iterator<Item = Record>> {
        let on_disk = self
            .layout
            .enumerate()
            .ok()
            .and_then(|files| files.into_iter().map(|f| f.version).max());
        let in_cache = self.cache.max_version();

        let latest = match (on_disk, in_cache) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };

        match latest {
            Some(version) => self.iterator(version),
            None => self.iterator(Version::EMPTY),
        }
    }
}

fn materialized_records(map: Arc<MaterializedMap>) -> impl Iterator<Item = Record> {
    let keys: Vec<Vec<u8>> = map.keys().cloned().collect();
    keys.into_iter().map(move |key| {
        let value = map.get(&key).cloned().unwrap_or_default();
        Record::new(key, value)
    })
}
