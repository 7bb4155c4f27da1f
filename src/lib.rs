pub mod analysis;
pub mod core;
pub mod index;
pub mod query;
pub mod replication;
pub mod schema;
pub mod search;
pub mod storage;

pub use crate::core::collection::Collection;
pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::manager::CollectionManager;
pub use crate::core::types::SeqId;
pub use crate::query::params::SearchParams;
pub use crate::schema::schema::{FieldDefinition, FieldType, Schema};
pub use crate::search::results::{Hit, SearchResults};

/*
 Write path:
   caller -> Collection (validate, assign seq_id)
          -> ReplicationState (leader appends to the replicated log)
          -> on commit: Index worker applies + Store persists
 Read path:
   caller -> Collection -> Index worker (filters, fuzzy candidates,
             scoring, facets) -> Collection (documents, highlights)
*/
