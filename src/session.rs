//! Per-writer staging for one in-flight version transition. Not shared
//! across threads: each writer task owns its own `UpdateSession`, so
//! concurrent writers on a single store stage into disjoint temp files
//! without any lock over the session itself.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{MapCache, MaterializedMap};
use crate::codec::{EventReader, EventWriter};
use crate::error::{StoreError, StoreResult};
use crate::id::Version;
use crate::layout::FileLayout;
use crate::loader::VersionLoader;
use crate::record::{Record, StoreUpdate};

enum SessionState {
    Initialized,
    Prepared {
        version: Version,
        working: MaterializedMap,
        writer: EventWriter,
        temp_path: PathBuf,
        final_path: PathBuf,
    },
    Committed {
        version: Version,
        map: Arc<MaterializedMap>,
        final_path: PathBuf,
    },
}

/// Per-writer staging buffer. See the module documentation for the state
/// machine (`INITIALIZED -> PREPARED -> COMMITTED`, with `reset()` callable
/// from any state).
pub struct UpdateSession {
    layout: Arc<FileLayout>,
    cache: Arc<MapCache>,
    state: SessionState,
}

impl UpdateSession {
    pub fn new(layout: Arc<FileLayout>, cache: Arc<MapCache>) -> Self {
        Self {
            layout,
            cache,
            state: SessionState::Initialized,
        }
    }

    /// Loads the predecessor map, duplicates it into a working copy owned by
    /// this session, and opens a temp file for the delta journal. Resets any
    /// prior state first.
    pub fn prepare(&mut self, version: Version) -> StoreResult<()> {
        self.reset();

        if version.is_empty() {
            return Err(StoreError::config("prepare requires a non-negative version"));
        }

        let loader = VersionLoader::new(&self.layout, &self.cache);
        let predecessor = loader.load_map(version.predecessor())?;
        let working = (*predecessor).clone();

        let temp_path = self.layout.temp_path();
        self.layout
            .ensure_dir()
            .map_err(|e| StoreError::io(version, e))?;
        let writer = EventWriter::create(&temp_path).map_err(|e| StoreError::io(version, e))?;

        self.state = SessionState::Prepared {
            version,
            working,
            writer,
            temp_path,
            final_path: self.layout.delta_path(version),
        };

        Ok(())
    }

    /// `f` receives the current value for `key`, if any, and returns the
    /// replacement. The result is written into the working map and appended
    /// to the temp delta journal as a `ValueUpdated` event.
    pub fn update(
        &mut self,
        key: &[u8],
        f: impl FnOnce(Option<&Vec<u8>>) -> Vec<u8>,
    ) -> StoreResult<()> {
        let (version, working, writer) = self.prepared_mut()?;
        let new_value = f(working.get(key));
        working.insert(key.to_vec(), new_value.clone());

        writer
            .write_event(&StoreUpdate::ValueUpdated {
                key: key.to_vec(),
                value: new_value,
            })
            .map_err(|e| StoreError::io(version, e))
    }

    /// Removes every key matching `predicate` from the working map and
    /// appends a `KeyRemoved` event for each. Iterates over a snapshot of
    /// the current keys, so it tolerates the predicate being asked about a
    /// key that this same call has already removed.
    pub fn remove(&mut self, predicate: impl Fn(&[u8]) -> bool) -> StoreResult<()> {
        let (version, working, writer) = self.prepared_mut()?;
        let matching: Vec<Vec<u8>> = working
            .keys()
            .filter(|k| predicate(k))
            .cloned()
            .collect();

        for key in matching {
            if working.remove(&key).is_some() {
                writer
                    .write_event(&StoreUpdate::KeyRemoved { key })
                    .map_err(|e| StoreError::io(version, e))?;
            }
        }

        Ok(())
    }

    /// Closes the temp file, then under the store-wide commit lock renames
    /// it to `<v>.delta` (overwrite permitted) and publishes the working map
    /// into the cache. On any failure the session reverts to `INITIALIZED`
    /// and the error is surfaced; `<v>.delta` is left unchanged.
    pub fn commit(&mut self) -> StoreResult<()> {
        let (version, working, writer, temp_path, final_path) = match std::mem::replace(
            &mut self.state,
            SessionState::Initialized,
        ) {
            SessionState::Prepared {
                version,
                working,
                writer,
                temp_path,
                final_path,
            } => (version, working, writer, temp_path, final_path),
            other => {
                self.state = other;
                return Err(StoreError::precondition("commit requires state PREPARED"));
            }
        };

        let result = (|| -> StoreResult<Arc<MaterializedMap>> {
            writer.finish().map_err(|e| StoreError::io(version, e))?;

            let map = Arc::new(working);
            let map_for_cache = map.clone();
            let rename_temp_path = temp_path.clone();
            let rename_final_path = final_path.clone();

            self.cache
                .commit_and_publish(version, map_for_cache, move || {
                    fs::rename(&rename_temp_path, &rename_final_path)
                })
                .map_err(|e| StoreError::io(version, e))?;

            Ok(map)
        })();

        match result {
            Ok(map) => {
                self.state = SessionState::Committed {
                    version,
                    map,
                    final_path,
                };
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_file(&temp_path);
                self.state = SessionState::Initialized;
                Err(err)
            }
        }
    }

    /// Closes the temp stream if open, deletes the temp file if it exists,
    /// and returns to `INITIALIZED`. Safe to call from any state — this is
    /// the universal cancel primitive.
    pub fn reset(&mut self) {
        if let SessionState::Prepared {
            writer, temp_path, ..
        } = std::mem::replace(&mut self.state, SessionState::Initialized)
        {
            let _ = writer.finish();
            let _ = fs::remove_file(&temp_path);
        }
    }

    /// Requires `COMMITTED`: a lazy iteration of records at the just
    /// committed version, served from the cache (no disk access).
    pub fn last_committed_data(&self) -> StoreResult<CommittedRecords> {
        match &self.state {
            SessionState::Committed { map, .. } => Ok(CommittedRecords {
                keys: map.keys().cloned().collect::<Vec<_>>().into_iter(),
                map: map.clone(),
            }),
            _ => Err(StoreError::precondition(
                "last_committed_data requires state COMMITTED",
            )),
        }
    }

    /// Requires `COMMITTED`: a lazy iteration of the events in the just
    /// committed delta file, re-read from disk.
    pub fn last_committed_updates(&self) -> StoreResult<EventReader> {
        match &self.state {
            SessionState::Committed {
                version,
                final_path,
                ..
            } => EventReader::open(final_path).map_err(|e| StoreError::io(*version, e)),
            _ => Err(StoreError::precondition(
                "last_committed_updates requires state COMMITTED",
            )),
        }
    }

    fn prepared_mut(
        &mut self,
    ) -> StoreResult<(Version, &mut MaterializedMap, &mut EventWriter)> {
        match &mut self.state {
            SessionState::Prepared {
                version,
                working,
                writer,
                ..
            } => Ok((*version, working, writer)),
            _ => Err(StoreError::precondition("operation requires state PREPARED")),
        }
    }
}

impl Drop for UpdateSession {
    /// A session dropped without commit must run `reset()`.
    fn drop(&mut self) {
        self.reset();
    }
}

/// Lazy iteration of `(key, value)` pairs at a just-committed version.
pub struct CommittedRecords {
    map: Arc<MaterializedMap>,
    keys: std::vec::IntoIter<Vec<u8>>,
}

impl Iterator for CommittedRecords {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        let value = self.map.get(&key).cloned().unwrap_or_default();
        Some(Record::new(key, value))
    }
}
