use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::collection::{Collection, APPLIED_INDEX_KEY};
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::replication::log::{LogEntry, LogOp};
use crate::replication::snapshot::{self, SnapshotMeta};
use crate::replication::state::ReplicationState;
use crate::schema::schema::{FieldDefinition, Schema};
use crate::storage::layout::StorageLayout;
use crate::storage::store::Store;

const META_PREFIX: &str = "$CM_";
const NEXT_COLLECTION_ID_KEY: &str = "$CM$next_id";

#[derive(Debug, Serialize, Deserialize)]
struct CollectionMeta {
    id: u32,
    fields: Vec<FieldDefinition>,
    default_sorting_field: String,
}

/// Fires snapshots on the configured interval for as long as the
/// manager lives.
struct SnapshotTimer {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotTimer {
    fn spawn(replication: Arc<ReplicationState>, interval_secs: u64) -> Self {
        let (stop, stop_rx) = bounded::<()>(1);
        let handle = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(Duration::from_secs(interval_secs.max(1))) {
                Err(RecvTimeoutError::Timeout) => {
                    if replication.is_leader() {
                        if let Err(err) = replication.maybe_snapshot() {
                            warn!(%err, "interval snapshot failed");
                        }
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        SnapshotTimer {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for SnapshotTimer {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Explicitly constructed root object owning the store, the replicated
/// log and every collection. Threaded through call sites instead of
/// living behind a process-global.
pub struct CollectionManager {
    config: Config,
    layout: StorageLayout,
    store: Arc<Store>,
    replication: Arc<ReplicationState>,
    collections: RwLock<HashMap<String, Arc<Collection>>>,
    next_collection_id: AtomicU32,
    _snapshot_timer: SnapshotTimer,
}

impl CollectionManager {
    pub fn new(config: Config) -> Result<Self> {
        let layout = StorageLayout::new(config.data_path.clone())?;
        let store = Arc::new(Store::open(&layout.store_log_path())?);
        let replication = Arc::new(ReplicationState::start(
            store.clone(),
            layout.clone(),
            config.peers.clone(),
            config.election_timeout_ms,
        )?);

        let next_collection_id = store
            .get(NEXT_COLLECTION_ID_KEY)
            .and_then(|raw| bincode::deserialize::<u32>(&raw).ok())
            .unwrap_or(0);

        let snapshot_timer =
            SnapshotTimer::spawn(replication.clone(), config.snapshot_interval_secs);

        Ok(CollectionManager {
            config,
            layout,
            store,
            replication,
            collections: RwLock::new(HashMap::new()),
            next_collection_id: AtomicU32::new(next_collection_id),
            _snapshot_timer: snapshot_timer,
        })
    }

    /// Rebuild every collection from the store, then replay committed
    /// log entries that were never applied.
    pub fn load(&self) -> Result<usize> {
        let metas = self.store.scan_prefix(META_PREFIX);
        info!(collections = metas.len(), "loading collections from the store");

        for (key, raw) in metas {
            let name = key.trim_start_matches(META_PREFIX).to_string();
            let meta: CollectionMeta = bincode::deserialize(&raw)?;
            let schema = Schema::new(meta.fields, &meta.default_sorting_field)?;

            let collection = Arc::new(Collection::new(
                &name,
                meta.id,
                schema,
                self.store.clone(),
                self.replication.clone(),
                self.config.worker_queue_depth,
                self.config.query_cache_entries,
            ));
            collection.load()?;
            self.collections.write().insert(name, collection);
        }

        let applied: u64 = self
            .store
            .get(APPLIED_INDEX_KEY)
            .and_then(|raw| bincode::deserialize(&raw).ok())
            .unwrap_or(0);

        let pending = self.replication.log().committed_after(applied)?;
        let replayed = pending.len();
        for entry in pending {
            self.apply(&entry)?;
            self.store
                .insert(APPLIED_INDEX_KEY, &bincode::serialize(&entry.index)?)?;
        }

        if replayed > 0 {
            info!(replayed, "replayed committed log entries");
        }

        Ok(self.collections.read().len())
    }

    pub fn replication(&self) -> &ReplicationState {
        &self.replication
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("No collection with name `{}` found.", name)))
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn create_collection(
        &self,
        name: &str,
        fields: Vec<FieldDefinition>,
        default_sorting_field: &str,
    ) -> Result<Arc<Collection>> {
        // validate before the operation reaches the log
        Schema::new(fields.clone(), default_sorting_field)?;

        if self.collections.read().contains_key(name) {
            return Err(Error::conflict(format!(
                "A collection with name `{}` already exists.",
                name
            )));
        }

        let entry = self.replication.replicate(LogOp::CreateCollection {
            name: name.to_string(),
            fields: fields.clone(),
            default_sorting_field: default_sorting_field.to_string(),
        })?;

        let collection = self.apply_create(name, fields, default_sorting_field)?;
        self.mark_applied(entry.index)?;
        Ok(collection)
    }

    fn apply_create(
        &self,
        name: &str,
        fields: Vec<FieldDefinition>,
        default_sorting_field: &str,
    ) -> Result<Arc<Collection>> {
        if let Ok(existing) = self.collection(name) {
            return Ok(existing);
        }

        let schema = Schema::new(fields.clone(), default_sorting_field)?;
        let id = self.next_collection_id.fetch_add(1, Ordering::SeqCst);

        let meta = CollectionMeta {
            id,
            fields,
            default_sorting_field: default_sorting_field.to_string(),
        };
        self.store
            .insert(&format!("{}{}", META_PREFIX, name), &bincode::serialize(&meta)?)?;
        self.store.insert(
            NEXT_COLLECTION_ID_KEY,
            &bincode::serialize(&self.next_collection_id.load(Ordering::SeqCst))?,
        )?;

        let collection = Arc::new(Collection::new(
            name,
            id,
            schema,
            self.store.clone(),
            self.replication.clone(),
            self.config.worker_queue_depth,
            self.config.query_cache_entries,
        ));
        self.collections
            .write()
            .insert(name.to_string(), collection.clone());

        info!(collection = name, id, "collection created");
        Ok(collection)
    }

    pub fn drop_collection(&self, name: &str) -> Result<()> {
        self.collection(name)?;

        let entry = self.replication.replicate(LogOp::DropCollection {
            name: name.to_string(),
        })?;
        self.apply_drop(name)?;
        self.mark_applied(entry.index)
    }

    fn apply_drop(&self, name: &str) -> Result<()> {
        let Some(collection) = self.collections.write().remove(name) else {
            return Ok(());
        };

        for (key, _) in self.store.scan_prefix(&collection.key_prefix()) {
            self.store.remove(&key)?;
        }
        self.store.remove(&format!("{}{}", META_PREFIX, name))?;

        info!(collection = name, "collection dropped");
        Ok(())
    }

    fn mark_applied(&self, index: u64) -> Result<()> {
        self.store
            .insert(APPLIED_INDEX_KEY, &bincode::serialize(&index)?)
    }

    /// Apply one committed log entry; the dispatch used during replay
    /// and by followers receiving entries from the leader.
    pub fn apply(&self, entry: &LogEntry) -> Result<()> {
        match &entry.op {
            LogOp::CreateCollection {
                name,
                fields,
                default_sorting_field,
            } => {
                self.apply_create(name, fields.clone(), default_sorting_field)?;
            }
            LogOp::DropCollection { name } => {
                self.apply_drop(name)?;
            }
            LogOp::Write {
                collection,
                mode,
                documents,
            } => match self.collection(collection) {
                Ok(coll) => {
                    coll.apply_write(documents.clone(), *mode)?;
                }
                Err(_) => warn!(%collection, "skipping write for unknown collection"),
            },
            LogOp::Remove {
                collection,
                document_id,
            } => match self.collection(collection) {
                Ok(coll) => {
                    if let Err(err) = coll.apply_remove(document_id) {
                        warn!(%collection, %document_id, %err, "replayed remove failed");
                    }
                }
                Err(_) => warn!(%collection, "skipping remove for unknown collection"),
            },
            LogOp::Noop => {}
        }
        Ok(())
    }

    /// Interval- or operator-triggered snapshot of the store.
    pub fn snapshot(&self) -> Result<SnapshotMeta> {
        self.replication.do_snapshot()
    }

    /// Install a snapshot produced elsewhere: the store is replaced and
    /// every index rebuilt from it.
    pub fn install_snapshot(&self, dir: &std::path::Path) -> Result<SnapshotMeta> {
        let meta = snapshot::install_snapshot(&self.store, dir)?;

        self.collections.write().clear();
        self.store
            .insert(APPLIED_INDEX_KEY, &bincode::serialize(&meta.last_included_index)?)?;
        self.load()?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema::FieldType;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> CollectionManager {
        let config = Config {
            data_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        let manager = CollectionManager::new(config).unwrap();
        manager.load().unwrap();
        manager
    }

    fn books_fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("title", FieldType::String),
            FieldDefinition::new("points", FieldType::Int32),
        ]
    }

    #[test]
    fn create_get_drop_collection() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager
            .create_collection("books", books_fields(), "points")
            .unwrap();
        assert!(manager.collection("books").is_ok());
        assert_eq!(manager.collection_names(), vec!["books".to_string()]);

        let err = manager
            .create_collection("books", books_fields(), "points")
            .unwrap_err();
        assert_eq!(err.code(), 409);

        manager.drop_collection("books").unwrap();
        assert_eq!(manager.collection("books").unwrap_err().code(), 404);
    }

    #[test]
    fn collections_survive_restart() {
        let dir = TempDir::new().unwrap();
        {
            let manager = manager(&dir);
            let coll = manager
                .create_collection("books", books_fields(), "points")
                .unwrap();
            coll.add(
                serde_json::json!({"id": "1", "title": "quick fox", "points": 3}),
                crate::core::types::WriteMode::Create,
            )
            .unwrap();
        }

        let manager = manager(&dir);
        let coll = manager.collection("books").unwrap();
        assert_eq!(coll.num_documents(), 1);
        assert_eq!(
            coll.get("1").unwrap().get("title").unwrap(),
            &serde_json::json!("quick fox")
        );
    }
}
