use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::analysis::Tokenizer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Document, IndexRecord, RecordOutcome, SeqId, WriteMode};
use crate::core::worker::IndexWorker;
use crate::index::art::TokenOrdering;
use crate::index::in_memory::Index;
use crate::query::cache::QueryCache;
use crate::query::filter::parse_filters;
use crate::query::params::SearchParams;
use crate::query::sort::parse_sorts;
use crate::replication::log::LogOp;
use crate::replication::state::ReplicationState;
use crate::schema::schema::Schema;
use crate::search::executor::{SearchArgs, SearchOutput, FIELD_LIMIT_NUM};
use crate::search::facets::FacetQuery;
use crate::search::highlight::{highlight_field, HighlightOptions};
use crate::search::results::{
    CollectionSummary, FacetResult, FacetStatsResult, FacetValue, GroupedHit, Hit, SearchResults,
};
use crate::search::topster::Kv;
use crate::storage::store::Store;

/// Hard ceiling on hits per page.
pub const MAX_PER_PAGE: usize = 250;

/// Store key carrying the index of the last applied log entry.
pub const APPLIED_INDEX_KEY: &str = "$RL_applied";

/// A named set of documents with a fixed schema: owns the doc-id to
/// seq-id mapping, routes writes through the replicated log, and serves
/// searches from its index worker.
#[derive(Debug)]
pub struct Collection {
    name: String,
    collection_id: u32,
    schema: Schema,
    store: Arc<Store>,
    replication: Arc<ReplicationState>,
    worker: IndexWorker,
    next_seq_id: AtomicU32,
    cache: QueryCache,
    tokenizer: Tokenizer,
}

impl Collection {
    pub(crate) fn new(
        name: &str,
        collection_id: u32,
        schema: Schema,
        store: Arc<Store>,
        replication: Arc<ReplicationState>,
        queue_depth: usize,
        cache_entries: usize,
    ) -> Self {
        let next_seq_id = store
            .get(&Self::next_seq_key_for(collection_id))
            .and_then(|raw| bincode::deserialize::<u32>(&raw).ok())
            .unwrap_or(0);

        let index = Index::new(name, schema.clone());

        Collection {
            name: name.to_string(),
            collection_id,
            schema,
            store,
            replication,
            worker: IndexWorker::spawn(index, queue_depth),
            next_seq_id: AtomicU32::new(next_seq_id),
            cache: QueryCache::new(cache_entries),
            tokenizer: Tokenizer::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn collection_id(&self) -> u32 {
        self.collection_id
    }

    fn seq_key(&self, document_id: &str) -> String {
        format!("{}_$SI_{}", self.collection_id, document_id)
    }

    fn doc_key(&self, seq_id: SeqId) -> String {
        format!("{}_$SD_{}", self.collection_id, seq_id)
    }

    pub(crate) fn doc_key_prefix(&self) -> String {
        format!("{}_$SD_", self.collection_id)
    }

    pub(crate) fn key_prefix(&self) -> String {
        format!("{}_", self.collection_id)
    }

    fn next_seq_key_for(collection_id: u32) -> String {
        format!("{}_$CN", collection_id)
    }

    /// Rebuild the in-memory index from the persisted documents, after a
    /// restart or a snapshot install.
    pub(crate) fn load(&self) -> Result<usize> {
        let mut records = Vec::new();

        for (key, raw) in self.store.scan_prefix(&self.doc_key_prefix()) {
            let seq_id: SeqId = key
                .rsplit('_')
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    Error::new(ErrorKind::Internal, format!("Malformed document key `{}`.", key))
                })?;
            let document: Document = serde_json::from_slice(&raw)?;
            records.push(IndexRecord::new(records.len(), seq_id, document));
        }

        let total = records.len();
        let (indexed, records) = self.worker.batch_index(records)?;
        for record in records.iter().filter(|r| !r.ok()) {
            warn!(
                collection = %self.name,
                seq_id = record.seq_id,
                "failed to re-index stored document"
            );
        }

        info!(collection = %self.name, loaded = indexed, total, "collection loaded");
        Ok(indexed)
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    pub fn add(&self, document: Document, mode: WriteMode) -> Result<Document> {
        let outcomes = self.add_many(vec![document.clone()], mode)?;
        let outcome = outcomes.into_iter().next().ok_or_else(|| {
            Error::new(ErrorKind::Internal, "Batch write returned no outcome.")
        })?;

        if !outcome.success {
            return Err(Error::new(
                match outcome.code {
                    404 => ErrorKind::NotFound,
                    409 => ErrorKind::Conflict,
                    _ => ErrorKind::InvalidArgument,
                },
                outcome.error.unwrap_or_else(|| "Write failed.".to_string()),
            ));
        }

        let document_id = outcome.document_id.unwrap_or_default();
        self.get(&document_id)
    }

    /// Batch write: the whole batch is one replicated log entry; records
    /// succeed or fail individually. Missing document ids are assigned
    /// here, before the batch is logged, so replay sees the same ids.
    pub fn add_many(
        &self,
        mut documents: Vec<Document>,
        mode: WriteMode,
    ) -> Result<Vec<RecordOutcome>> {
        for document in documents.iter_mut() {
            if document.is_object() && document.get("id").is_none() {
                document["id"] = json!(uuid::Uuid::new_v4().simple().to_string());
            }
        }

        let entry = self.replication.replicate(LogOp::Write {
            collection: self.name.clone(),
            mode,
            documents: documents.clone(),
        })?;

        let outcomes = self.apply_write(documents, mode)?;
        self.mark_applied(entry.index)?;
        Ok(outcomes)
    }

    /// Apply a committed batch to the index and the store. Also invoked
    /// verbatim during log replay, so everything here is deterministic.
    pub(crate) fn apply_write(
        &self,
        documents: Vec<Document>,
        mode: WriteMode,
    ) -> Result<Vec<RecordOutcome>> {
        struct Prepared {
            record: IndexRecord,
            document_id: String,
            stored_doc: Document,
            fresh: bool,
        }

        let mut prepared: Vec<std::result::Result<Prepared, (usize, Error)>> = Vec::new();

        for (position, mut document) in documents.into_iter().enumerate() {
            let outcome = (|| -> Result<Prepared> {
                if !document.is_object() {
                    return Err(Error::invalid("Document must be a JSON object."));
                }

                let document_id = match document.get("id") {
                    Some(Value::String(id)) if !id.is_empty() => id.clone(),
                    Some(Value::String(_)) => {
                        return Err(Error::invalid("Document id cannot be empty."))
                    }
                    Some(_) => return Err(Error::invalid("Document id must be a string.")),
                    None => {
                        let id = uuid::Uuid::new_v4().simple().to_string();
                        document["id"] = json!(id);
                        id
                    }
                };

                let existing_seq: Option<SeqId> = self
                    .store
                    .get(&self.seq_key(&document_id))
                    .and_then(|raw| bincode::deserialize(&raw).ok());

                match (mode, existing_seq) {
                    (WriteMode::Create, Some(_)) => {
                        return Err(Error::conflict(format!(
                            "A document with id {} already exists.",
                            document_id
                        )));
                    }
                    (WriteMode::Update, None) => {
                        return Err(Error::not_found(format!(
                            "Could not find a document with id: {}",
                            document_id
                        )));
                    }
                    _ => {}
                }

                let (seq_id, fresh) = match existing_seq {
                    Some(seq) => (seq, false),
                    None => (self.next_seq_id.fetch_add(1, Ordering::SeqCst), true),
                };

                let mut record = IndexRecord::new(position, seq_id, document.clone());
                let mut stored_doc = document;

                if !fresh {
                    let old_doc: Document = self
                        .store
                        .get(&self.doc_key(seq_id))
                        .map(|raw| serde_json::from_slice(&raw))
                        .transpose()?
                        .ok_or_else(|| {
                            Error::new(
                                ErrorKind::Internal,
                                format!("Stored document missing for seq id {}.", seq_id),
                            )
                        })?;

                    // the delete-set carries the old values of the
                    // fields this write touches
                    let mut del_doc = json!({});
                    if let (Some(new_obj), Some(old_obj)) =
                        (record.doc.as_object(), old_doc.as_object())
                    {
                        for (name, _) in new_obj.iter() {
                            if let Some(old_value) = old_obj.get(name) {
                                del_doc[name] = old_value.clone();
                            }
                        }
                    }

                    // stored view is the old document merged with the
                    // incoming fields
                    let mut merged = old_doc.clone();
                    if let (Some(merged_obj), Some(new_obj)) =
                        (merged.as_object_mut(), record.doc.as_object())
                    {
                        for (name, value) in new_obj.iter() {
                            merged_obj.insert(name.clone(), value.clone());
                        }
                    }

                    record.is_update = true;
                    record.old_doc = Some(old_doc);
                    record.del_doc = Some(del_doc);
                    stored_doc = merged;
                }

                Ok(Prepared {
                    record,
                    document_id,
                    stored_doc,
                    fresh,
                })
            })();

            match outcome {
                Ok(p) => prepared.push(Ok(p)),
                Err(err) => prepared.push(Err((position, err))),
            }
        }

        // schema validation fans out before the serialized apply
        prepared.par_iter_mut().for_each(|slot| {
            if let Ok(p) = slot {
                if let Err(err) =
                    Index::validate_document(&self.schema, &p.record.doc, p.record.is_update)
                {
                    p.record.fail(err);
                }
            }
        });

        let mut outcomes: Vec<RecordOutcome> = Vec::new();
        let mut records = Vec::new();
        let mut sidecar: Vec<(String, Document, bool)> = Vec::new();

        for slot in prepared {
            match slot {
                Ok(p) => {
                    records.push(p.record);
                    sidecar.push((p.document_id, p.stored_doc, p.fresh));
                }
                Err((position, err)) => outcomes.push(RecordOutcome {
                    position,
                    document_id: None,
                    success: false,
                    code: err.code(),
                    error: Some(err.context),
                }),
            }
        }

        let (_, records) = self.worker.batch_index(records)?;

        for (record, (document_id, stored_doc, fresh)) in records.into_iter().zip(sidecar) {
            match record.outcome {
                None => {
                    self.store
                        .insert(&self.doc_key(record.seq_id), &serde_json::to_vec(&stored_doc)?)?;
                    if fresh {
                        self.store.insert(
                            &self.seq_key(&document_id),
                            &bincode::serialize(&record.seq_id)?,
                        )?;
                    }
                    outcomes.push(RecordOutcome {
                        position: record.position,
                        document_id: Some(document_id),
                        success: true,
                        code: if record.is_update { 200 } else { 201 },
                        error: None,
                    });
                }
                Some(err) => outcomes.push(RecordOutcome {
                    position: record.position,
                    document_id: Some(document_id),
                    success: false,
                    code: err.code(),
                    error: Some(err.context),
                }),
            }
        }

        self.store.insert(
            &Self::next_seq_key_for(self.collection_id),
            &bincode::serialize(&self.next_seq_id.load(Ordering::SeqCst))?,
        )?;

        outcomes.sort_by_key(|o| o.position);
        self.cache.clear();
        Ok(outcomes)
    }

    pub fn remove(&self, document_id: &str) -> Result<Document> {
        let entry = self.replication.replicate(LogOp::Remove {
            collection: self.name.clone(),
            document_id: document_id.to_string(),
        })?;

        let doc = self.apply_remove(document_id)?;
        self.mark_applied(entry.index)?;
        Ok(doc)
    }

    pub(crate) fn apply_remove(&self, document_id: &str) -> Result<Document> {
        let seq_id: SeqId = self
            .store
            .get(&self.seq_key(document_id))
            .and_then(|raw| bincode::deserialize(&raw).ok())
            .ok_or_else(|| {
                Error::not_found(format!("Could not find a document with id: {}", document_id))
            })?;

        let document: Document = self
            .store
            .get(&self.doc_key(seq_id))
            .map(|raw| serde_json::from_slice(&raw))
            .transpose()?
            .ok_or_else(|| {
                Error::not_found(format!("Could not find a document with id: {}", document_id))
            })?;

        self.worker.remove_document(seq_id, document.clone())?;
        self.store.remove(&self.doc_key(seq_id))?;
        self.store.remove(&self.seq_key(document_id))?;
        self.cache.clear();
        Ok(document)
    }

    /// Remove by internal sequence id, when the caller already resolved
    /// it; a missing document is not an error.
    pub fn remove_if_found(&self, seq_id: SeqId) -> Result<Option<Document>> {
        let Some(raw) = self.store.get(&self.doc_key(seq_id)) else {
            return Ok(None);
        };
        let document: Document = serde_json::from_slice(&raw)?;
        let document_id = document
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        self.remove(&document_id).map(Some)
    }

    fn mark_applied(&self, index: u64) -> Result<()> {
        self.store
            .insert(APPLIED_INDEX_KEY, &bincode::serialize(&index)?)
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    pub fn get(&self, document_id: &str) -> Result<Document> {
        let seq_id: SeqId = self
            .store
            .get(&self.seq_key(document_id))
            .and_then(|raw| bincode::deserialize(&raw).ok())
            .ok_or_else(|| {
                Error::not_found(format!("Could not find a document with id: {}", document_id))
            })?;

        self.store
            .get(&self.doc_key(seq_id))
            .map(|raw| serde_json::from_slice(&raw).map_err(Error::from))
            .transpose()?
            .ok_or_else(|| {
                Error::not_found(format!("Could not find a document with id: {}", document_id))
            })
    }

    pub fn seq_id_of(&self, document_id: &str) -> Option<SeqId> {
        self.store
            .get(&self.seq_key(document_id))
            .and_then(|raw| bincode::deserialize(&raw).ok())
    }

    pub fn num_documents(&self) -> usize {
        self.worker.num_documents()
    }

    pub fn summary(&self) -> CollectionSummary {
        CollectionSummary {
            name: self.name.clone(),
            num_documents: self.num_documents(),
            fields: self.schema.fields.clone(),
            default_sorting_field: self.schema.default_sorting_field.clone(),
        }
    }

    pub fn search(&self, params: SearchParams) -> Result<SearchResults> {
        let start = Instant::now();
        self.validate_search(&params)?;

        if let Some(cached) = self.cache.get(&params) {
            return Ok(cached);
        }

        let args = self.build_args(&params)?;
        let output = self.worker.search(args)?;

        let mut results = self.assemble(&params, output)?;
        results.took_ms = start.elapsed().as_millis() as u64;

        self.cache.put(params, results.clone());
        Ok(results)
    }

    fn validate_search(&self, params: &SearchParams) -> Result<()> {
        if params.per_page > MAX_PER_PAGE {
            return Err(Error::new(
                ErrorKind::Capacity,
                format!("Only upto {} hits can be fetched per page.", MAX_PER_PAGE),
            ));
        }

        if params.page < 1 {
            return Err(Error::invalid("Page must be an integer of value greater than 0."));
        }

        if params.q.is_empty() {
            return Err(Error::invalid("Query field is empty."));
        }

        if params.query_by.is_empty() {
            return Err(Error::invalid("No fields given to search the query on."));
        }

        for field_name in &params.query_by {
            let field = self.schema.field(field_name).ok_or_else(|| {
                Error::not_found(format!(
                    "Could not find a field named `{}` in the schema.",
                    field_name
                ))
            })?;
            if !field.field_type.is_string() {
                return Err(Error::invalid(format!(
                    "Field `{}` should be a string or a string array.",
                    field_name
                )));
            }
        }

        for field_name in params.facet_by.iter().chain(params.group_by.iter()) {
            let field = self.schema.field(field_name).ok_or_else(|| {
                Error::not_found(format!(
                    "Could not find a facet field named `{}` in the schema.",
                    field_name
                ))
            })?;
            if !field.facet {
                return Err(Error::invalid(format!(
                    "Field `{}` is not a facet field.",
                    field_name
                )));
            }
        }

        if !params.facet_query.is_empty() {
            let field_name = params
                .facet_query
                .split(':')
                .next()
                .unwrap_or_default()
                .trim();
            if !params.facet_by.iter().any(|f| f == field_name) {
                return Err(Error::invalid(format!(
                    "Facet query refers to a facet field `{}` that is not part of facet_by.",
                    field_name
                )));
            }
        }

        Ok(())
    }

    fn build_args(&self, params: &SearchParams) -> Result<SearchArgs> {
        let filters = parse_filters(&params.filter_by, &self.schema)?;
        let sort_fields = parse_sorts(&params.sort_by, &self.schema)?;

        // a leading dash marks an exclusion token
        let mut include_tokens: Vec<String> = Vec::new();
        let mut exclude_tokens: Vec<String> = Vec::new();

        if params.q.trim() == "*" {
            include_tokens.push("*".to_string());
        } else {
            for word in params.q.split_whitespace() {
                if let Some(stripped) = word.strip_prefix('-') {
                    exclude_tokens.extend(self.tokenizer.tokenize_text(stripped));
                } else {
                    include_tokens.extend(self.tokenizer.tokenize_text(word));
                }
            }

            // an exclusion-only query runs as a wildcard with carve-outs
            if include_tokens.is_empty() && !exclude_tokens.is_empty() {
                include_tokens.push("*".to_string());
            }
        }

        if include_tokens.is_empty() {
            return Err(Error::invalid("Query field is empty."));
        }

        let mut included_ids: BTreeMap<usize, SeqId> = BTreeMap::new();
        for (document_id, position) in &params.pinned_hits {
            if let Some(seq_id) = self.seq_id_of(document_id) {
                included_ids.insert(position.saturating_sub(1), seq_id);
            }
        }

        let excluded_ids: Vec<SeqId> = params
            .hidden_hits
            .iter()
            .filter_map(|id| self.seq_id_of(id))
            .collect();

        let facet_query = if params.facet_query.is_empty() {
            FacetQuery::default()
        } else {
            let (field_name, query) = params
                .facet_query
                .split_once(':')
                .ok_or_else(|| Error::invalid("Facet query must be in the `field: value` format."))?;
            FacetQuery {
                field_name: field_name.trim().to_string(),
                query: query.trim().to_string(),
            }
        };

        let synonyms: Vec<Vec<String>> = params
            .synonyms
            .iter()
            .map(|group| {
                group
                    .iter()
                    .flat_map(|phrase| self.tokenizer.tokenize_text(phrase))
                    .collect()
            })
            .collect();

        Ok(SearchArgs {
            include_tokens,
            exclude_tokens,
            synonyms,
            search_fields: params.query_by.clone(),
            filters,
            facets: params.facet_by.clone(),
            facet_query,
            included_ids,
            excluded_ids,
            sort_fields,
            num_typos: params.num_typos,
            max_hits: (params.page * params.per_page).max(1),
            prefix: params.prefix,
            drop_tokens_threshold: params.drop_tokens_threshold,
            typo_tokens_threshold: params.typo_tokens_threshold,
            group_by: params.group_by.clone(),
            group_limit: if params.group_by.is_empty() {
                0
            } else {
                params.group_limit
            },
            token_order: TokenOrdering::Frequency,
        })
    }

    fn assemble(&self, params: &SearchParams, output: SearchOutput) -> Result<SearchResults> {
        // weave curated entries into their caller-requested positions
        let mut merged: Vec<Kv> = output.result_kvs.clone();
        for kv in output.override_kvs.iter() {
            let position = (kv.distinct_id as usize).min(merged.len());
            merged.insert(position, *kv);
        }

        let page_start = (params.page - 1) * params.per_page;
        let page_end = (page_start + params.per_page).min(merged.len());
        let page_slice: &[Kv] = if page_start < merged.len() {
            &merged[page_start..page_end]
        } else {
            &[]
        };

        let highlight_options = HighlightOptions {
            start_tag: params.highlight_start_tag.clone(),
            end_tag: params.highlight_end_tag.clone(),
            affix_num_tokens: params.highlight_affix_num_tokens,
            full_fields: params.highlight_full_fields.clone(),
        };

        let mut hits: Vec<Hit> = Vec::with_capacity(page_slice.len());
        let mut grouped_hits: Vec<GroupedHit> = Vec::new();

        for kv in page_slice {
            if !params.group_by.is_empty() {
                let mut members =
                    output.group_hits.get(&kv.distinct_id).cloned().unwrap_or_default();
                if members.is_empty() {
                    // curated entries carry no organic group
                    members.push(*kv);
                }
                let mut group_docs = Vec::new();
                for member in &members {
                    if let Some(hit) = self.build_hit(member, &output, params, &highlight_options)? {
                        group_docs.push(hit);
                    }
                }
                if let Some(first) = group_docs.first() {
                    let group_key = params
                        .group_by
                        .iter()
                        .filter_map(|f| first.document.get(f).cloned())
                        .collect();
                    grouped_hits.push(GroupedHit {
                        group_key,
                        hits: group_docs,
                    });
                }
            } else if let Some(hit) = self.build_hit(kv, &output, params, &highlight_options)? {
                hits.push(hit);
            }
        }

        let facet_counts = self.assemble_facets(params, &output)?;

        Ok(SearchResults {
            found: output.found,
            page: params.page,
            hits,
            grouped_hits,
            facet_counts,
            took_ms: 0,
        })
    }

    fn build_hit(
        &self,
        kv: &Kv,
        output: &SearchOutput,
        params: &SearchParams,
        highlight_options: &HighlightOptions,
    ) -> Result<Option<Hit>> {
        let Some(raw) = self.store.get(&self.doc_key(kv.seq_id)) else {
            return Ok(None);
        };
        let document: Document = serde_json::from_slice(&raw)?;

        // map the entry's field weight back to the searched field; a
        // synonym tier (odd offset) belongs to the field above it
        let field_index = (FIELD_LIMIT_NUM - kv.field_id as usize) / 2;
        let field_name = params
            .query_by
            .get(field_index)
            .cloned()
            .unwrap_or_else(|| params.query_by.first().cloned().unwrap_or_default());

        let searched_tokens = output
            .searched_tokens
            .get(kv.query_index as usize)
            .cloned()
            .unwrap_or_default();

        let mut highlights = Vec::new();
        if !searched_tokens.is_empty() {
            match document.get(&field_name) {
                Some(Value::String(text)) => {
                    if let Some(h) = highlight_field(
                        &field_name,
                        text,
                        &searched_tokens,
                        params.prefix,
                        highlight_options,
                    ) {
                        highlights.push(h);
                    }
                }
                Some(Value::Array(items)) => {
                    for item in items {
                        if let Some(text) = item.as_str() {
                            if let Some(h) = highlight_field(
                                &field_name,
                                text,
                                &searched_tokens,
                                params.prefix,
                                highlight_options,
                            ) {
                                highlights.push(h);
                                break;
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        let document = project_fields(document, &params.include_fields, &params.exclude_fields);

        Ok(Some(Hit {
            document,
            highlights,
            text_match: kv.match_score(),
        }))
    }

    fn assemble_facets(&self, params: &SearchParams, output: &SearchOutput) -> Result<Vec<FacetResult>> {
        let mut facet_counts = Vec::with_capacity(output.facets.len());

        for facet in &output.facets {
            let Some(field) = self.schema.field(&facet.field_name) else {
                continue;
            };

            let mut entries: Vec<(&u64, &crate::search::facets::FacetCount)> =
                facet.result_map.iter().collect();
            entries.sort_by_key(|(_, count)| {
                std::cmp::Reverse(if params.group_by.is_empty() {
                    count.count
                } else {
                    count.groups.len() as u64
                })
            });
            entries.truncate(params.max_facet_values);

            let mut counts = Vec::with_capacity(entries.len());
            for (_, count) in entries {
                let Some(raw) = self.store.get(&self.doc_key(count.doc_id)) else {
                    continue;
                };
                let document: Document = serde_json::from_slice(&raw)?;
                let value = match document.get(&facet.field_name) {
                    Some(Value::Array(items)) => items
                        .get(count.array_pos)
                        .map(|v| Tokenizer::canonicalize(v, field.field_type))
                        .unwrap_or_default(),
                    Some(other) => Tokenizer::canonicalize(other, field.field_type),
                    None => continue,
                };

                let highlighted = if count.query_token_pos.is_empty() {
                    None
                } else {
                    let matched: Vec<usize> =
                        count.query_token_pos.values().map(|tp| tp.pos).collect();
                    let tokens: Vec<String> = value
                        .split_whitespace()
                        .enumerate()
                        .map(|(i, word)| {
                            if matched.contains(&i) {
                                format!(
                                    "{}{}{}",
                                    params.highlight_start_tag, word, params.highlight_end_tag
                                )
                            } else {
                                word.to_string()
                            }
                        })
                        .collect();
                    Some(tokens.join(" "))
                };

                counts.push(FacetValue {
                    value,
                    count: if params.group_by.is_empty() {
                        count.count
                    } else {
                        count.groups.len() as u64
                    },
                    highlighted,
                });
            }

            let stats = (facet.stats.count > 0).then(|| FacetStatsResult {
                min: facet.stats.min,
                max: facet.stats.max,
                sum: facet.stats.sum,
                avg: facet.stats.avg(),
            });

            facet_counts.push(FacetResult {
                field_name: facet.field_name.clone(),
                counts,
                stats,
            });
        }

        Ok(facet_counts)
    }
}

/// Apply include/exclude projections; `id` always survives.
fn project_fields(document: Document, include: &[String], exclude: &[String]) -> Document {
    if include.is_empty() && exclude.is_empty() {
        return document;
    }

    let Value::Object(map) = document else {
        return document;
    };

    let projected: serde_json::Map<String, Value> = map
        .into_iter()
        .filter(|(name, _)| {
            if name == "id" {
                return true;
            }
            let included = include.is_empty() || include.iter().any(|f| f == name);
            let excluded = exclude.iter().any(|f| f == name);
            included && !excluded
        })
        .collect();

    Value::Object(projected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_projection_keeps_id() {
        let doc = json!({"id": "1", "title": "x", "points": 3});
        let projected = project_fields(
            doc,
            &["title".to_string()],
            &[],
        );
        assert!(projected.get("id").is_some());
        assert!(projected.get("title").is_some());
        assert!(projected.get("points").is_none());
    }

    #[test]
    fn field_projection_exclude_wins() {
        let doc = json!({"id": "1", "title": "x", "points": 3});
        let projected = project_fields(doc, &[], &["points".to_string()]);
        assert!(projected.get("points").is_none());
        assert!(projected.get("title").is_some());
    }
}
