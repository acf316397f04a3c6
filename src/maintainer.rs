//! Periodic per-store maintenance: compacts long delta chains into
//! snapshots and prunes files/cache entries below the retention window.
//! Runs on a single dedicated background thread shared by every store in a
//! registry, firing every `maintenance_period` (10s by default).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::codec::write_all_records;
use crate::id::Version;
use crate::layout::{FileKind, StoreFile};
use crate::record::Record;
use crate::store::Store;

/// Runs one maintenance pass over a single store: snapshot, then cleanup.
/// IO errors during maintenance are logged and swallowed, never
/// propagated; the next tick retries.
pub fn run_maintenance_tick(store: &Store) {
    if let Err(err) = try_snapshot(store) {
        log::warn!("snapshot step failed for store {}: {}", store.id(), err);
    }

    if let Err(err) = try_cleanup(store) {
        log::warn!("cleanup step failed for store {}: {}", store.id(), err);
    }
}

fn try_snapshot(store: &Store) -> std::io::Result<()> {
    let layout = store.layout();
    let files = layout.enumerate()?;

    let Some(latest) = files.last() else {
        return Ok(());
    };
    let latest_version = latest.version;

    let run_length = delta_run_length(&files, latest_version);
    if run_length <= store.config().max_delta_chain_for_snapshots() {
        return Ok(());
    }

    let Some(map) = store.cache().get(latest_version) else {
        log::debug!(
            "store {}: skipping snapshot at version {} (not the active writer)",
            store.id(),
            latest_version
        );
        return Ok(());
    };

    let records: Vec<Record> = map
        .iter()
        .map(|(k, v)| Record::new(k.clone(), v.clone()))
        .collect();

    let path = layout.snapshot_path(latest_version);
    let tmp = layout.temp_path();
    write_all_records(&tmp, records.into_iter())?;
    std::fs::rename(&tmp, &path)?;

    log::info!(
        "store {}: wrote snapshot at version {} (delta run length {})",
        store.id(),
        latest_version,
        run_length
    );

    Ok(())
}

/// Counts the delta run ending at `latest`: how many consecutive `.delta`
/// files precede it (inclusive) since the most recent snapshot, or since
/// version 0 if there is none. This must count only the run since the last
/// snapshot, not every delta on disk.
fn delta_run_length(files: &[StoreFile], latest: Version) -> u64 {
    let by_version: std::collections::HashMap<i64, FileKind> =
        files.iter().map(|f| (f.version.get(), f.kind)).collect();

    let mut run = 0u64;
    let mut cursor = latest.get();

    loop {
        match by_version.get(&cursor) {
            Some(FileKind::Snapshot) => break,
            Some(FileKind::Delta) => {
                run += 1;
                if cursor == 0 {
                    break;
                }
                cursor -= 1;
            }
            None => break,
        }
    }

    run
}

fn try_cleanup(store: &Store) -> std::io::Result<()> {
    let layout = store.layout();
    let files = layout.enumerate()?;

    let Some(latest) = files.last().map(|f| f.version) else {
        return Ok(());
    };

    let retain = store.config().num_batches_to_retain() as i64;
    let earliest_raw = latest.get() - retain;
    if earliest_raw < 0 {
        return Ok(());
    }
    let earliest = Version::new(earliest_raw).expect("checked non-negative above");

    let covering = covering_version(&files, earliest);

    for file in &files {
        if file.version < covering {
            std::fs::remove_file(&file.path)?;
        }
    }

    store.cache().evict_older_than(earliest);

    Ok(())
}

/// The snapshot that covers `earliest` (the most recent snapshot at or
/// before it), or `earliest` itself if no such snapshot exists — meaning
/// `earliest`'s own delta file is the earliest file retained.
fn covering_version(files: &[StoreFile], earliest: Version) -> Version {
    let mut covering = earliest;

    for file in files {
        if file.version > earliest {
            break;
        }
        if file.kind == FileKind::Snapshot {
            covering = file.version;
        }
    }

    covering
}

/// A background thread that invokes a store-list provider every
/// `period` and runs a maintenance tick over each store returned.
pub struct MaintenanceTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceTicker {
    pub fn start(period: Duration, stores: impl Fn() -> Vec<Store> + Send + 'static) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();

        let handle = thread::spawn(move || {
            while !stop_thread.load(Ordering::Relaxed) {
                thread::sleep(period);
                if stop_thread.load(Ordering::Relaxed) {
                    break;
                }
                for store in stores() {
                    run_maintenance_tick(&store);
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MaintenanceTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
