use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Serialize, Deserialize)]
enum StoreOp {
    Insert { key: String, value: Vec<u8> },
    Remove { key: String },
}

#[derive(Debug)]
struct StoreInner {
    map: BTreeMap<String, Vec<u8>>,
    file: File,
    ops_applied: u64,
}

/// Disk-backed key-value store: an in-memory ordered map fronted by a
/// checksummed append-only log. Thread-safe and shared across the
/// process; index workers never touch it directly for reads on the hot
/// path (indices are in memory).
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let mut map = BTreeMap::new();
        let mut ops_applied = 0u64;

        if path.exists() {
            let mut data = Vec::new();
            File::open(path)?.read_to_end(&mut data)?;
            let mut cursor = 0usize;

            while cursor + 8 <= data.len() {
                let len =
                    u32::from_le_bytes([data[cursor], data[cursor + 1], data[cursor + 2], data[cursor + 3]])
                        as usize;
                let crc = u32::from_le_bytes([
                    data[cursor + 4],
                    data[cursor + 5],
                    data[cursor + 6],
                    data[cursor + 7],
                ]);
                cursor += 8;

                if cursor + len > data.len() {
                    warn!(path = %path.display(), "store log has a truncated tail frame");
                    break;
                }

                let payload = &data[cursor..cursor + len];
                if crc32fast::hash(payload) != crc {
                    warn!(path = %path.display(), "store log frame failed checksum, stopping replay");
                    break;
                }
                cursor += len;

                match bincode::deserialize::<StoreOp>(payload)? {
                    StoreOp::Insert { key, value } => {
                        map.insert(key, value);
                    }
                    StoreOp::Remove { key } => {
                        map.remove(&key);
                    }
                }
                ops_applied += 1;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Store {
            path: path.to_path_buf(),
            inner: Mutex::new(StoreInner {
                map,
                file,
                ops_applied,
            }),
        })
    }

    fn append(inner: &mut StoreInner, op: &StoreOp) -> Result<()> {
        let payload = bincode::serialize(op)?;
        let crc = crc32fast::hash(&payload);

        inner
            .file
            .write_all(&(payload.len() as u32).to_le_bytes())
            .and_then(|_| inner.file.write_all(&crc.to_le_bytes()))
            .and_then(|_| inner.file.write_all(&payload))
            .map_err(|e| Error::new(ErrorKind::Durability, e.to_string()))?;

        inner.ops_applied += 1;
        Ok(())
    }

    pub fn insert(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::append(
            &mut inner,
            &StoreOp::Insert {
                key: key.to_string(),
                value: value.to_vec(),
            },
        )?;
        inner.map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().map.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().map.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::append(&mut inner, &StoreOp::Remove { key: key.to_string() })?;
        inner.map.remove(key);
        Ok(())
    }

    pub fn scan_prefix(&self, prefix: &str) -> Vec<(String, Vec<u8>)> {
        let inner = self.inner.lock();
        inner
            .map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Mutations applied since the log's birth; followers compare this
    /// against the leader to gauge catch-up progress.
    pub fn latest_seq_number(&self) -> u64 {
        self.inner.lock().ops_applied
    }

    pub fn flush(&self) -> Result<()> {
        self.inner
            .lock()
            .file
            .sync_all()
            .map_err(|e| Error::new(ErrorKind::Durability, e.to_string()))
    }

    fn dump_to(map: &BTreeMap<String, Vec<u8>>, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut out = File::create(&tmp)?;
            for (key, value) in map {
                let payload = bincode::serialize(&StoreOp::Insert {
                    key: key.clone(),
                    value: value.clone(),
                })?;
                let crc = crc32fast::hash(&payload);
                out.write_all(&(payload.len() as u32).to_le_bytes())?;
                out.write_all(&crc.to_le_bytes())?;
                out.write_all(&payload)?;
            }
            out.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Write a consistent checkpoint of the store into `dir`.
    pub fn snapshot_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let inner = self.inner.lock();
        Self::dump_to(&inner.map, &dir.join("store.log"))
            .map_err(|e| Error::new(ErrorKind::Durability, e.context))
    }

    /// Replace the store's contents with a snapshot previously produced
    /// by `snapshot_to`.
    pub fn restore_from(&self, dir: &Path) -> Result<()> {
        let snapshot = Store::open(&dir.join("store.log"))?;
        let map = snapshot.inner.lock().map.clone();

        let mut inner = self.inner.lock();
        Self::dump_to(&map, &self.path)?;
        inner.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        inner.ops_applied = map.len() as u64;
        inner.map = map;
        Ok(())
    }

    /// Rewrite the backing log from the live map, dropping dead entries.
    pub fn compact(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let map = inner.map.clone();
        Self::dump_to(&map, &self.path)?;
        inner.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reopen_replays_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.log");

        {
            let store = Store::open(&path).unwrap();
            store.insert("a", b"1").unwrap();
            store.insert("b", b"2").unwrap();
            store.remove("a").unwrap();
            store.flush().unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), Some(b"2".to_vec()));
        assert_eq!(store.latest_seq_number(), 3);
    }

    #[test]
    fn scan_prefix_is_ordered() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("store.log")).unwrap();
        store.insert("doc_2", b"b").unwrap();
        store.insert("doc_1", b"a").unwrap();
        store.insert("meta_1", b"m").unwrap();

        let docs = store.scan_prefix("doc_");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].0, "doc_1");
        assert_eq!(docs[1].0, "doc_2");
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let snap_dir = dir.path().join("snap");

        let store = Store::open(&dir.path().join("store.log")).unwrap();
        store.insert("k", b"v").unwrap();
        store.snapshot_to(&snap_dir).unwrap();
        store.insert("k2", b"v2").unwrap();

        let other = Store::open(&dir.path().join("other.log")).unwrap();
        other.restore_from(&snap_dir).unwrap();
        assert_eq!(other.get("k"), Some(b"v".to_vec()));
        assert_eq!(other.get("k2"), None);
    }

    #[test]
    fn truncated_tail_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.log");
        {
            let store = Store::open(&path).unwrap();
            store.insert("a", b"1").unwrap();
            store.flush().unwrap();
        }
        // chop the file mid-frame
        let data = std::fs::read(&path).unwrap();
        std::fs::write(&path, &data[..data.len() - 2]).unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.get("a"), None);
    }
}
