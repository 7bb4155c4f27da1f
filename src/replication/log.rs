use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::WriteMode;
use crate::storage::layout::StorageLayout;

/// One replicated write operation. Applying the committed sequence in
/// order against an empty store reconstructs the full engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogOp {
    CreateCollection {
        name: String,
        fields: Vec<crate::schema::schema::FieldDefinition>,
        default_sorting_field: String,
    },
    DropCollection {
        name: String,
    },
    Write {
        collection: String,
        mode: WriteMode,
        documents: Vec<serde_json::Value>,
    },
    Remove {
        collection: String,
        document_id: String,
    },
    /// Issued after every snapshot so the next snapshot always has new
    /// log entries to cover.
    Noop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: u64,
    pub term: u64,
    pub timestamp: DateTime<Utc>,
    pub op: LogOp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogMeta {
    pub term: u64,
    pub commit_index: u64,
    pub last_snapshot_index: u64,
    pub last_snapshot_id: Option<String>,
}

#[derive(Debug)]
struct LogInner {
    file: File,
    last_index: u64,
    meta: LogMeta,
}

/// Append-only, checksummed log of write operations plus its metadata
/// file. The leader serializes writes here; followers receive and apply
/// the same sequence.
#[derive(Debug)]
pub struct ReplicatedLog {
    segment_path: PathBuf,
    meta_path: PathBuf,
    inner: Mutex<LogInner>,
}

impl ReplicatedLog {
    pub fn open(layout: &StorageLayout) -> Result<Self> {
        let segment_path = layout.log_segment_path();
        let meta_path = layout.log_meta_path();

        let meta = if meta_path.exists() {
            bincode::deserialize(&std::fs::read(&meta_path)?)?
        } else {
            LogMeta::default()
        };

        let last_index = Self::read_entries(&segment_path)?
            .last()
            .map(|e| e.index)
            .unwrap_or(meta.last_snapshot_index);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&segment_path)?;

        Ok(ReplicatedLog {
            segment_path,
            meta_path,
            inner: Mutex::new(LogInner {
                file,
                last_index,
                meta,
            }),
        })
    }

    fn read_entries(path: &Path) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();
        if !path.exists() {
            return Ok(entries);
        }

        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        let mut cursor = 0usize;

        while cursor + 8 <= data.len() {
            let len = u32::from_le_bytes([
                data[cursor],
                data[cursor + 1],
                data[cursor + 2],
                data[cursor + 3],
            ]) as usize;
            let crc = u32::from_le_bytes([
                data[cursor + 4],
                data[cursor + 5],
                data[cursor + 6],
                data[cursor + 7],
            ]);
            cursor += 8;

            if cursor + len > data.len() {
                warn!(path = %path.display(), "replicated log has a truncated tail entry");
                break;
            }

            let payload = &data[cursor..cursor + len];
            if crc32fast::hash(payload) != crc {
                warn!(path = %path.display(), "replicated log entry failed checksum, stopping");
                break;
            }
            cursor += len;

            entries.push(bincode::deserialize(payload)?);
        }

        Ok(entries)
    }

    fn persist_meta(meta_path: &Path, meta: &LogMeta) -> Result<()> {
        std::fs::write(meta_path, bincode::serialize(meta)?)
            .map_err(|e| Error::new(ErrorKind::Durability, e.to_string()))
    }

    /// Append and immediately commit an operation, returning the entry.
    pub fn append(&self, op: LogOp) -> Result<LogEntry> {
        let mut inner = self.inner.lock();

        let entry = LogEntry {
            index: inner.last_index + 1,
            term: inner.meta.term,
            timestamp: Utc::now(),
            op,
        };

        let payload = bincode::serialize(&entry)?;
        let crc = crc32fast::hash(&payload);

        inner
            .file
            .write_all(&(payload.len() as u32).to_le_bytes())
            .and_then(|_| inner.file.write_all(&crc.to_le_bytes()))
            .and_then(|_| inner.file.write_all(&payload))
            .and_then(|_| inner.file.sync_data())
            .map_err(|e| Error::new(ErrorKind::Durability, e.to_string()))?;

        inner.last_index = entry.index;
        inner.meta.commit_index = entry.index;
        Self::persist_meta(&self.meta_path, &inner.meta)?;

        Ok(entry)
    }

    /// Committed entries with an index above `after`.
    pub fn committed_after(&self, after: u64) -> Result<Vec<LogEntry>> {
        let commit_index = self.inner.lock().meta.commit_index;
        Ok(Self::read_entries(&self.segment_path)?
            .into_iter()
            .filter(|e| e.index > after && e.index <= commit_index)
            .collect())
    }

    pub fn last_index(&self) -> u64 {
        self.inner.lock().last_index
    }

    pub fn commit_index(&self) -> u64 {
        self.inner.lock().meta.commit_index
    }

    pub fn meta(&self) -> LogMeta {
        self.inner.lock().meta.clone()
    }

    pub fn bump_term(&self) -> Result<u64> {
        let mut inner = self.inner.lock();
        inner.meta.term += 1;
        let term = inner.meta.term;
        Self::persist_meta(&self.meta_path, &inner.meta)?;
        Ok(term)
    }

    /// Drop entries covered by a snapshot and record it in the metadata.
    /// The next snapshot is permitted only when new entries exist past
    /// this point (the min-index-gap rule).
    pub fn truncate_until(&self, snapshot_index: u64, snapshot_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();

        let keep: Vec<LogEntry> = Self::read_entries(&self.segment_path)?
            .into_iter()
            .filter(|e| e.index > snapshot_index)
            .collect();

        let tmp = self.segment_path.with_extension("tmp");
        {
            let mut out = File::create(&tmp)?;
            for entry in &keep {
                let payload = bincode::serialize(entry)?;
                out.write_all(&(payload.len() as u32).to_le_bytes())?;
                out.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
                out.write_all(&payload)?;
            }
            out.sync_all()?;
        }
        std::fs::rename(&tmp, &self.segment_path)?;

        inner.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.segment_path)?;
        inner.meta.last_snapshot_index = snapshot_index;
        inner.meta.last_snapshot_id = Some(snapshot_id.to_string());
        Self::persist_meta(&self.meta_path, &inner.meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout(dir: &TempDir) -> StorageLayout {
        StorageLayout::new(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn append_assigns_dense_indices() {
        let dir = TempDir::new().unwrap();
        let log = ReplicatedLog::open(&layout(&dir)).unwrap();

        let first = log.append(LogOp::Noop).unwrap();
        let second = log.append(LogOp::Noop).unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(second.index, 2);
        assert_eq!(log.commit_index(), 2);
    }

    #[test]
    fn reopen_resumes_indexing() {
        let dir = TempDir::new().unwrap();
        {
            let log = ReplicatedLog::open(&layout(&dir)).unwrap();
            log.append(LogOp::Noop).unwrap();
        }
        let log = ReplicatedLog::open(&layout(&dir)).unwrap();
        let entry = log.append(LogOp::Noop).unwrap();
        assert_eq!(entry.index, 2);
        assert_eq!(log.committed_after(0).unwrap().len(), 2);
    }

    #[test]
    fn truncate_keeps_later_entries() {
        let dir = TempDir::new().unwrap();
        let log = ReplicatedLog::open(&layout(&dir)).unwrap();
        for _ in 0..4 {
            log.append(LogOp::Noop).unwrap();
        }

        log.truncate_until(2, "snap-1").unwrap();
        let remaining = log.committed_after(0).unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].index, 3);
        assert_eq!(log.meta().last_snapshot_index, 2);

        // indices keep growing from where they left off
        assert_eq!(log.append(LogOp::Noop).unwrap().index, 5);
    }
}
