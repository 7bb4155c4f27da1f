use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::core::error::Result;
use crate::replication::log::ReplicatedLog;
use crate::storage::layout::StorageLayout;
use crate::storage::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub id: String,
    pub last_included_index: u64,
    pub created_at: DateTime<Utc>,
}

const META_FILE: &str = "snapshot_meta.bin";

/// Checkpoint the store into a fresh snapshot directory and trim the log
/// entries the snapshot now covers.
pub fn save_snapshot(
    store: &Store,
    layout: &StorageLayout,
    log: &ReplicatedLog,
) -> Result<SnapshotMeta> {
    let meta = SnapshotMeta {
        id: format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S"), Uuid::new_v4()),
        last_included_index: log.commit_index(),
        created_at: Utc::now(),
    };

    let dir = layout.snapshot_path(&meta.id);
    store.snapshot_to(&dir)?;
    std::fs::write(dir.join(META_FILE), bincode::serialize(&meta)?)?;

    log.truncate_until(meta.last_included_index, &meta.id)?;
    info!(id = %meta.id, index = meta.last_included_index, "snapshot saved");

    Ok(meta)
}

pub fn read_meta(dir: &Path) -> Result<SnapshotMeta> {
    Ok(bincode::deserialize(&std::fs::read(dir.join(META_FILE))?)?)
}

/// Replace the local store with a snapshot's copy; the caller reloads
/// its in-memory indices afterwards.
pub fn install_snapshot(store: &Store, dir: &Path) -> Result<SnapshotMeta> {
    let meta = read_meta(dir)?;
    store.restore_from(dir)?;
    info!(id = %meta.id, "snapshot installed");
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::log::LogOp;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn save_and_install_round_trip() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let store = Arc::new(Store::open(&layout.store_log_path()).unwrap());
        let log = ReplicatedLog::open(&layout).unwrap();

        store.insert("key", b"value").unwrap();
        log.append(LogOp::Noop).unwrap();

        let meta = save_snapshot(&store, &layout, &log).unwrap();
        assert_eq!(meta.last_included_index, 1);

        let follower_dir = TempDir::new().unwrap();
        let follower_layout = StorageLayout::new(follower_dir.path().to_path_buf()).unwrap();
        let follower_store = Store::open(&follower_layout.store_log_path()).unwrap();

        let installed = install_snapshot(&follower_store, &layout.snapshot_path(&meta.id)).unwrap();
        assert_eq!(installed.id, meta.id);
        assert_eq!(follower_store.get("key"), Some(b"value".to_vec()));
    }
}
