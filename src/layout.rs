//! Names and locates delta and snapshot files on disk, and enumerates a
//! store's directory into a version-ordered file list.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::id::{StoreId, Version};

/// Whether a [`StoreFile`] is an append-only delta log or a full snapshot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileKind {
    Delta,
    Snapshot,
}

/// One file discovered under a store's directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreFile {
    pub version: Version,
    pub path: PathBuf,
    pub kind: FileKind,
}

/// Resolves the filesystem layout for one store: `<root>/<operatorId>/<partitionId>/`.
#[derive(Clone, Debug)]
pub struct FileLayout {
    dir: PathBuf,
}

impl FileLayout {
    pub fn new(root: impl AsRef<Path>, id: StoreId) -> Self {
        let dir = root
            .as_ref()
            .join(id.operator_id.to_string())
            .join(id.partition_id.to_string());

        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn delta_path(&self, version: Version) -> PathBuf {
        self.dir.join(format!("{}.delta", version.get()))
    }

    pub fn snapshot_path(&self, version: Version) -> PathBuf {
        self.dir.join(format!("{}.snapshot", version.get()))
    }

    /// A fresh, collision-resistant temp file name in the store directory,
    /// built from a random nonce so concurrent writers staging into the
    /// same directory never collide.
    pub fn temp_path(&self) -> PathBuf {
        let nonce: u64 = rand::thread_rng().gen();
        self.dir.join(format!("temp-{:016x}", nonce))
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Lists the directory, parses each matching file name, and returns a
    /// sequence sorted by ascending version. If both a delta and a snapshot
    /// exist for the same version, the snapshot wins: the delta becomes
    /// redundant once a full image exists. Names that don't match the
    /// `<version>.delta` / `<version>.snapshot` pattern are logged and
    /// ignored. A missing directory yields an empty list, not an error.
    pub fn enumerate(&self) -> std::io::Result<Vec<StoreFile>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut by_version: std::collections::BTreeMap<i64, StoreFile> =
            std::collections::BTreeMap::new();

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => {
                    log::warn!("skipping non-UTF8 file name in {}", self.dir.display());
                    continue;
                }
            };

            let parsed = parse_file_name(name);
            let (version, kind) = match parsed {
                Some(parsed) => parsed,
                None => {
                    if !name.starts_with("temp-") {
                        log::warn!("ignoring unrecognized file {} in {}", name, self.dir.display());
                    }
                    continue;
                }
            };

            let replace = match by_version.get(&version.get()) {
                None => true,
                Some(existing) => existing.kind == FileKind::Delta && kind == FileKind::Snapshot,
            };

            if replace {
                by_version.insert(version.get(), StoreFile { version, path, kind });
            }
        }

        Ok(by_version.into_values().collect())
    }
}

fn parse_file_name(name: &str) -> Option<(Version, FileKind)> {
    let (stem, kind) = if let Some(stem) = name.strip_suffix(".delta") {
        (stem, FileKind::Delta)
    } else if let Some(stem) = name.strip_suffix(".snapshot") {
        (stem, FileKind::Snapshot)
    } else {
        return None;
    };

    let raw: i64 = stem.parse().ok()?;
    let version = Version::new(raw)?;
    Some((version, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn id() -> StoreId {
        StoreId::new(1, 0)
    }

    #[test]
    fn missing_directory_is_empty() {
        let root = tempdir().unwrap();
        let layout = FileLayout::new(root.path(), id());
        assert_eq!(layout.enumerate().unwrap(), Vec::new());
    }

    #[test]
    fn paths_are_rooted_under_operator_and_partition() {
        let root = tempdir().unwrap();
        let layout = FileLayout::new(root.path(), StoreId::new(7, 3));
        assert_eq!(
            layout.delta_path(Version::new(5).unwrap()),
            root.path().join("7").join("3").join("5.delta")
        );
    }

    #[test]
    fn snapshot_wins_over_delta_for_same_version() {
        let root = tempdir().unwrap();
        let layout = FileLayout::new(root.path(), id());
        layout.ensure_dir().unwrap();
        fs::write(layout.delta_path(Version::new(4).unwrap()), b"d").unwrap();
        fs::write(layout.snapshot_path(Version::new(4).unwrap()), b"s").unwrap();

        let files = layout.enumerate().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].kind, FileKind::Snapshot);
    }

    #[test]
    fn enumeration_is_sorted_ascending_and_skips_junk() {
        let root = tempdir().unwrap();
        let layout = FileLayout::new(root.path(), id());
        layout.ensure_dir().unwrap();
        fs::write(layout.delta_path(Version::new(2).unwrap()), b"").unwrap();
        fs::write(layout.delta_path(Version::new(0).unwrap()), b"").unwrap();
        fs::write(layout.delta_path(Version::new(1).unwrap()), b"").unwrap();
        fs::write(layout.dir().join("garbage.txt"), b"").unwrap();
        fs::write(layout.dir().join("temp-deadbeef"), b"").unwrap();

        let files = layout.enumerate().unwrap();
        let versions: Vec<i64> = files.iter().map(|f| f.version.get()).collect();
        assert_eq!(versions, vec![0, 1, 2]);
    }
}
