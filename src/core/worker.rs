use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Sender};
use tracing::info;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Document, IndexRecord, SeqId};
use crate::index::in_memory::Index;
use crate::search::executor::{QueryExecutor, SearchArgs, SearchOutput};

/// A request handed to an index worker, carrying its completion channel.
enum IndexRequest {
    Search {
        args: Box<SearchArgs>,
        reply: Sender<Result<SearchOutput>>,
    },
    Batch {
        records: Vec<IndexRecord>,
        reply: Sender<(usize, Vec<IndexRecord>)>,
    },
    Remove {
        seq_id: SeqId,
        document: Box<Document>,
        reply: Sender<Result<()>>,
    },
    NumDocuments {
        reply: Sender<usize>,
    },
    Shutdown,
}

/// One worker thread per collection owns that collection's `Index`
/// exclusively. Reads and writes flow through the same bounded channel,
/// serializing access; cross-collection work runs in parallel across
/// workers.
#[derive(Debug)]
pub struct IndexWorker {
    sender: Sender<IndexRequest>,
    handle: Option<JoinHandle<()>>,
}

impl IndexWorker {
    pub fn spawn(index: Index, queue_depth: usize) -> Self {
        let (sender, receiver) = bounded::<IndexRequest>(queue_depth.max(1));
        let name = index.name().to_string();

        let handle = thread::spawn(move || {
            let mut index = index;
            info!(collection = %index.name(), "index worker started");

            while let Ok(request) = receiver.recv() {
                match request {
                    IndexRequest::Search { args, reply } => {
                        let output = QueryExecutor::new(&index, &args).search();
                        let _ = reply.send(output);
                    }
                    IndexRequest::Batch { mut records, reply } => {
                        let indexed = index.batch_index(&mut records);
                        let _ = reply.send((indexed, records));
                    }
                    IndexRequest::Remove {
                        seq_id,
                        document,
                        reply,
                    } => {
                        let _ = reply.send(index.drop_document(seq_id, &document));
                    }
                    IndexRequest::NumDocuments { reply } => {
                        let _ = reply.send(index.num_documents());
                    }
                    IndexRequest::Shutdown => break,
                }
            }

            info!(collection = %name, "index worker stopped");
        });

        IndexWorker {
            sender,
            handle: Some(handle),
        }
    }

    fn disconnected() -> Error {
        Error::new(ErrorKind::InvalidState, "Index worker is not running.")
    }

    pub fn search(&self, args: SearchArgs) -> Result<SearchOutput> {
        let (reply, response) = bounded(1);
        self.sender
            .send(IndexRequest::Search {
                args: Box::new(args),
                reply,
            })
            .map_err(|_| Self::disconnected())?;
        response.recv().map_err(|_| Self::disconnected())?
    }

    pub fn batch_index(&self, records: Vec<IndexRecord>) -> Result<(usize, Vec<IndexRecord>)> {
        let (reply, response) = bounded(1);
        self.sender
            .send(IndexRequest::Batch { records, reply })
            .map_err(|_| Self::disconnected())?;
        response.recv().map_err(|_| Self::disconnected())
    }

    pub fn remove_document(&self, seq_id: SeqId, document: Document) -> Result<()> {
        let (reply, response) = bounded(1);
        self.sender
            .send(IndexRequest::Remove {
                seq_id,
                document: Box::new(document),
                reply,
            })
            .map_err(|_| Self::disconnected())?;
        response.recv().map_err(|_| Self::disconnected())?
    }

    pub fn num_documents(&self) -> usize {
        let (reply, response) = bounded(1);
        if self
            .sender
            .send(IndexRequest::NumDocuments { reply })
            .is_err()
        {
            return 0;
        }
        response.recv().unwrap_or(0)
    }
}

impl Drop for IndexWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(IndexRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema::{FieldDefinition, FieldType, Schema};
    use serde_json::json;

    fn worker() -> IndexWorker {
        let schema = Schema::new(
            vec![
                FieldDefinition::new("title", FieldType::String),
                FieldDefinition::new("points", FieldType::Int32),
            ],
            "points",
        )
        .unwrap();
        IndexWorker::spawn(Index::new("w", schema), 8)
    }

    #[test]
    fn serializes_writes_and_reads() {
        let worker = worker();

        let records = vec![IndexRecord::new(
            0,
            0,
            json!({"title": "hello world", "points": 1}),
        )];
        let (indexed, records) = worker.batch_index(records).unwrap();
        assert_eq!(indexed, 1);
        assert!(records[0].ok());
        assert_eq!(worker.num_documents(), 1);

        worker
            .remove_document(0, json!({"title": "hello world", "points": 1}))
            .unwrap();
        assert_eq!(worker.num_documents(), 0);
    }
}
