//! Materializes version *v* by finding the nearest snapshot `<= v` and
//! replaying deltas forward.
//!
//! Implemented as an explicit backward walk followed by a forward replay
//! rather than literal recursion, so recursion depth (bounded in practice
//! by the maintainer's snapshot policy) can never overflow the stack even
//! if maintenance has fallen behind.

use std::sync::Arc;

use crate::cache::{MapCache, MaterializedMap};
use crate::codec::{EventReader, RecordReader};
use crate::error::{StoreError, StoreResult};
use crate::id::Version;
use crate::layout::FileLayout;
use crate::record::StoreUpdate;

pub struct VersionLoader<'a> {
    layout: &'a FileLayout,
    cache: &'a MapCache,
}

impl<'a> VersionLoader<'a> {
    pub fn new(layout: &'a FileLayout, cache: &'a MapCache) -> Self {
        Self { layout, cache }
    }

    pub fn load_map(&self, version: Version) -> StoreResult<Arc<MaterializedMap>> {
        if version.is_empty() {
            return Ok(Arc::new(MaterializedMap::new()));
        }

        if let Some(map) = self.cache.get(version) {
            return Ok(map);
        }

        let mut pending: Vec<Version> = Vec::new();
        let mut cursor = version;

        let base = loop {
            if cursor.is_empty() {
                break Arc::new(MaterializedMap::new());
            }

            if let Some(cached) = self.cache.get(cursor) {
                break cached;
            }

            let snapshot_path = self.layout.snapshot_path(cursor);
            if snapshot_path.exists() {
                let reader =
                    RecordReader::open(&snapshot_path).map_err(|e| StoreError::io(cursor, e))?;

                let mut map = MaterializedMap::new();
                for record in reader {
                    let record = record.map_err(|e| StoreError::io(cursor, e))?;
                    map.insert(record.key, record.value);
                }

                let map = Arc::new(map);
                self.cache.insert(cursor, map.clone());
                break map;
            }

            pending.push(cursor);
            cursor = cursor.predecessor();
        };

        pending.reverse();
        let mut working: MaterializedMap = (*base).clone();

        for v in pending {
            let delta_path = self.layout.delta_path(v);
            if !delta_path.exists() {
                return Err(StoreError::integrity(v, "missing delta file during replay"));
            }

            let reader = EventReader::open(&delta_path).map_err(|e| StoreError::io(v, e))?;
            for event in reader {
                let event = event.map_err(|e| StoreError::io(v, e))?;
                apply(&mut working, event);
            }

            let snapshot = Arc::new(working.clone());
            self.cache.insert(v, snapshot);
        }

        self.cache
            .get(version)
            .ok_or_else(|| StoreError::integrity(version, "load did not populate target version"))
    }
}

fn apply(map: &mut MaterializedMap, event: StoreUpdate) {
    match event {
        StoreUpdate::ValueUpdated { key, value } => {
            map.insert(key, value);
        }
        StoreUpdate::KeyRemoved { key } => {
            map.remove(&key);
        }
    }
}
