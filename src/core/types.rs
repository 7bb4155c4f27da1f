use serde::{Deserialize, Serialize};

use crate::core::error::Error;

/// Dense internal document identifier. Assigned monotonically per
/// collection and never reused; deletions leave gaps.
pub type SeqId = u32;

/// Documents are plain JSON objects validated against the collection
/// schema at write time.
pub type Document = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    Create,
    Upsert,
    Update,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Create => "create",
            WriteMode::Upsert => "upsert",
            WriteMode::Update => "update",
        }
    }
}

/// One record of a batch write, tracked through validation and indexing.
#[derive(Debug)]
pub struct IndexRecord {
    /// Position of the record in the original request.
    pub position: usize,
    pub seq_id: SeqId,
    pub doc: Document,
    /// Stored version of the document, present on updates.
    pub old_doc: Option<Document>,
    /// Fields whose old tokenization must be removed before re-indexing.
    pub del_doc: Option<Document>,
    pub is_update: bool,
    pub outcome: Option<Error>,
}

impl IndexRecord {
    pub fn new(position: usize, seq_id: SeqId, doc: Document) -> Self {
        IndexRecord {
            position,
            seq_id,
            doc,
            old_doc: None,
            del_doc: None,
            is_update: false,
            outcome: None,
        }
    }

    pub fn fail(&mut self, err: Error) {
        self.outcome = Some(err);
    }

    pub fn ok(&self) -> bool {
        self.outcome.is_none()
    }
}

/// Per-record outcome returned from batch imports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub position: usize,
    pub document_id: Option<String>,
    pub success: bool,
    pub code: u16,
    pub error: Option<String>,
}
