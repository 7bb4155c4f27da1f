use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::Result;

/// Directory structure under the configured data root: the key-value
/// store's backing log, the replicated log's segments and metadata, and
/// snapshot checkpoints.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
    pub store_dir: PathBuf,
    pub log_dir: PathBuf,
    pub meta_dir: PathBuf,
    pub snapshot_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let store_dir = base_dir.join("store");
        let log_dir = base_dir.join("log");
        let meta_dir = base_dir.join("meta");
        let snapshot_dir = base_dir.join("snapshot");

        fs::create_dir_all(&store_dir)?;
        fs::create_dir_all(&log_dir)?;
        fs::create_dir_all(&meta_dir)?;
        fs::create_dir_all(&snapshot_dir)?;

        Ok(StorageLayout {
            base_dir,
            store_dir,
            log_dir,
            meta_dir,
            snapshot_dir,
        })
    }

    pub fn store_log_path(&self) -> PathBuf {
        self.store_dir.join("store.log")
    }

    pub fn log_segment_path(&self) -> PathBuf {
        self.log_dir.join("ops.log")
    }

    pub fn log_meta_path(&self) -> PathBuf {
        self.meta_dir.join("log_meta.bin")
    }

    pub fn snapshot_path(&self, id: &str) -> PathBuf {
        self.snapshot_dir.join(id)
    }

    pub fn latest_snapshot(&self) -> Option<PathBuf> {
        let mut snapshots: Vec<PathBuf> = fs::read_dir(&self.snapshot_dir)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        snapshots.sort();
        snapshots.pop()
    }
}

/// Recursively copy a directory; used when installing snapshots.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
