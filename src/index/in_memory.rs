use std::collections::HashMap;

use serde_json::Value;

use crate::analysis::Tokenizer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Document, IndexRecord, SeqId};
use crate::index::art::Art;
use crate::index::num_tree::{float_to_int64, NumTree};
use crate::schema::schema::{FieldDefinition, FieldType, Schema};

/// Separates array elements inside a facet hash vector.
pub const FACET_ARRAY_DELIMITER: u64 = u64::MAX;

/// Stable 64-bit string hash used for facet values. FNV-1a: no seed, no
/// platform dependence, so persisted hashes stay comparable.
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Combines facet-value hashes into a group-by distinct id.
pub fn hash_combine(combined: u64, hash: u64) -> u64 {
    combined
        ^ (hash
            .wrapping_add(0x517c_c1b7_2722_0a95)
            .wrapping_add(combined << 6)
            .wrapping_add(combined >> 2))
}

/// Order-sensitive combination of one facet value's token hashes.
pub fn combine_value_hash(combined: u64, token_hash: u64, token_index: usize) -> u64 {
    combined.wrapping_mul(
        1_779_033_703u64.wrapping_add(2u64.wrapping_mul(token_hash).wrapping_mul(token_index as u64 + 1)),
    )
}

/// Hash of one facet token: identity for numeric/bool values, FNV-1a for
/// strings, float bits for float fields.
pub fn facet_token_hash(field: &FieldDefinition, token: &str) -> u64 {
    if field.field_type.is_float() {
        let f: f32 = token.parse().unwrap_or(0.0);
        f.to_bits() as u64
    } else if field.field_type.is_integer() || field.field_type.is_bool() {
        token.parse::<i64>().unwrap_or(0) as u64
    } else {
        fnv1a(token.as_bytes())
    }
}

/// Per-collection bundle of adaptive radix tries (text), numeric trees
/// (scalars), the facet-value table and the sort-value table. All state
/// is owned exclusively by the collection's index worker.
pub struct Index {
    name: String,
    schema: Schema,
    tokenizer: Tokenizer,
    num_documents: usize,

    /// field name -> trie; non-string facet fields are additionally
    /// indexed under their `faceted_name` alias.
    search_index: HashMap<String, Art>,
    numerical_index: HashMap<String, NumTree>,

    /// seq id -> facet ordinal -> ordered token hashes (with array
    /// delimiters).
    facet_index: HashMap<SeqId, Vec<Vec<u64>>>,

    /// sort field -> seq id -> encoded sort value.
    sort_index: HashMap<String, HashMap<SeqId, i64>>,
}

impl Index {
    pub fn new(name: &str, schema: Schema) -> Self {
        let mut search_index = HashMap::new();
        let mut numerical_index = HashMap::new();
        let mut sort_index = HashMap::new();

        for field in &schema.fields {
            if field.field_type.is_string() {
                search_index.insert(field.name.clone(), Art::new());
            } else {
                numerical_index.insert(field.name.clone(), NumTree::new());
            }

            if field.facet && !field.field_type.is_string() {
                search_index.insert(field.faceted_name(), Art::new());
            }

            if field.field_type.is_single_numeric() {
                sort_index.insert(field.name.clone(), HashMap::new());
            }
        }

        Index {
            name: name.to_string(),
            schema,
            tokenizer: Tokenizer::new(),
            num_documents: 0,
            search_index,
            numerical_index,
            facet_index: HashMap::new(),
            sort_index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_documents(&self) -> usize {
        self.num_documents
    }

    pub fn art(&self, field: &str) -> Option<&Art> {
        self.search_index.get(field)
    }

    pub fn num_tree(&self, field: &str) -> Option<&NumTree> {
        self.numerical_index.get(field)
    }

    pub fn facet_entry(&self, seq_id: SeqId) -> Option<&Vec<Vec<u64>>> {
        self.facet_index.get(&seq_id)
    }

    pub fn sort_value(&self, field: &str, seq_id: SeqId) -> Option<i64> {
        self.sort_index.get(field)?.get(&seq_id).copied()
    }

    /// All live seq ids, taken from the default sorting field's table
    /// (its value is mandatory for every live document).
    pub fn all_seq_ids(&self) -> Vec<SeqId> {
        let mut ids: Vec<SeqId> = self
            .sort_index
            .get(&self.schema.default_sorting_field)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// The document's default-sort value, encoded for heap comparisons.
    /// Float fields map through the order-preserving transform even when
    /// the JSON value arrived as an integer.
    pub fn points_of(document: &Document, schema: &Schema) -> i64 {
        let field = schema.field(&schema.default_sorting_field);
        let is_float = field.map(|f| f.field_type.is_float()).unwrap_or(false);

        match document.get(&schema.default_sorting_field) {
            Some(Value::Number(n)) => {
                if is_float {
                    float_to_int64(n.as_f64().unwrap_or(0.0) as f32)
                } else {
                    n.as_i64().unwrap_or(0)
                }
            }
            _ => 0,
        }
    }

    /// Schema validation run before any write reaches the index. The
    /// widening rule admits integer JSON values for float fields.
    pub fn validate_document(schema: &Schema, document: &Document, is_update: bool) -> Result<()> {
        let sort_field = &schema.default_sorting_field;
        let has_sort_value = document.get(sort_field).is_some();

        if !has_sort_value && !is_update {
            return Err(Error::invalid(format!(
                "Field `{}` has been declared as a default sorting field, but is not found in the document.",
                sort_field
            )));
        }

        if has_sort_value {
            match document.get(sort_field) {
                Some(Value::Number(n)) => {
                    if n.is_f64() && n.as_f64().unwrap_or(0.0) > f32::MAX as f64 {
                        return Err(Error::invalid(format!(
                            "Default sorting field `{}` exceeds maximum value of a float.",
                            sort_field
                        )));
                    }
                }
                _ => {
                    return Err(Error::invalid(format!(
                        "Default sorting field `{}` must be a single valued numerical field.",
                        sort_field
                    )));
                }
            }
        }

        for field in &schema.fields {
            let value = match document.get(&field.name) {
                Some(v) => v,
                None => {
                    if field.optional || is_update {
                        continue;
                    }
                    return Err(Error::invalid(format!(
                        "Field `{}` has been declared in the schema, but is not found in the document.",
                        field.name
                    )));
                }
            };

            Self::validate_value(field, value)?;
        }

        Ok(())
    }

    fn validate_value(field: &FieldDefinition, value: &Value) -> Result<()> {
        let type_error = |expected: &str| {
            Error::invalid(format!("Field `{}` must be {}.", field.name, expected))
        };

        match field.field_type {
            FieldType::String => value.is_string().then_some(()).ok_or(type_error("a string")),
            FieldType::Int32 => {
                if !value.is_i64() && !value.is_u64() {
                    return Err(type_error("an int32"));
                }
                let n = value.as_i64().unwrap_or(i64::MAX);
                if n > i32::MAX as i64 || n < i32::MIN as i64 {
                    return Err(Error::invalid(format!(
                        "Field `{}` exceeds maximum value of int32.",
                        field.name
                    )));
                }
                Ok(())
            }
            FieldType::Int64 => (value.is_i64() || value.is_u64())
                .then_some(())
                .ok_or(type_error("an int64")),
            FieldType::Float => value.is_number().then_some(()).ok_or(type_error("a float")),
            FieldType::Bool => value.is_boolean().then_some(()).ok_or(type_error("a bool")),
            FieldType::StringArray => Self::validate_array(value, Value::is_string)
                .ok_or(type_error("a string array")),
            FieldType::Int32Array => {
                Self::validate_array(value, |v| v.is_i64() || v.is_u64())
                    .ok_or(type_error("an int32 array"))?;
                for item in value.as_array().into_iter().flatten() {
                    let n = item.as_i64().unwrap_or(i64::MAX);
                    if n > i32::MAX as i64 || n < i32::MIN as i64 {
                        return Err(Error::invalid(format!(
                            "Field `{}` exceeds maximum value of int32.",
                            field.name
                        )));
                    }
                }
                Ok(())
            }
            FieldType::Int64Array => Self::validate_array(value, |v| v.is_i64() || v.is_u64())
                .ok_or(type_error("an int64 array")),
            FieldType::FloatArray => Self::validate_array(value, Value::is_number)
                .ok_or(type_error("a float array")),
            FieldType::BoolArray => Self::validate_array(value, Value::is_boolean)
                .ok_or(type_error("a bool array")),
        }
    }

    fn validate_array(value: &Value, check: impl Fn(&Value) -> bool) -> Option<()> {
        let arr = value.as_array()?;
        // mirror the write path: only the first element's type is probed
        match arr.first() {
            Some(first) if !check(first) => None,
            _ => Some(()),
        }
    }

    /// Ingest a validated document into every field index its schema
    /// requires.
    pub fn index_document(&mut self, document: &Document, seq_id: SeqId, is_update: bool) -> Result<()> {
        let sort_field = self.schema.default_sorting_field.clone();
        let points = if is_update && document.get(&sort_field).is_none() {
            self.sort_value(&sort_field, seq_id).unwrap_or(0)
        } else {
            Self::points_of(document, &self.schema)
        };

        // a facet slot exists for every facet field, even optional ones
        let facet_count = self.schema.facet_fields().len();
        self.facet_index
            .entry(seq_id)
            .or_insert_with(|| vec![Vec::new(); facet_count]);

        let fields: Vec<FieldDefinition> = self.schema.fields.clone();
        for field in &fields {
            let Some(value) = document.get(&field.name) else {
                continue;
            };

            let facet_ordinal = self.schema.facet_ordinal(&field.name);

            // non-string faceted fields are additionally indexed as
            // faceted strings so facet queries can expand over them; the
            // canonical value is one verbatim token, never word-split
            if field.facet && !field.field_type.is_string() {
                if field.field_type.is_array() {
                    let strings: Vec<String> = value
                        .as_array()
                        .into_iter()
                        .flatten()
                        .map(|v| Tokenizer::canonicalize(v, field.field_type))
                        .collect();
                    self.index_string_array_field(
                        &strings,
                        points,
                        &field.faceted_name(),
                        seq_id,
                        facet_ordinal,
                        field,
                        true,
                    )?;
                } else {
                    let text = Tokenizer::canonicalize(value, field.field_type);
                    self.index_string_field(
                        &text,
                        points,
                        &field.faceted_name(),
                        seq_id,
                        facet_ordinal,
                        field,
                        true,
                    )?;
                }
            }

            match field.field_type {
                FieldType::String => {
                    let text = value.as_str().unwrap_or_default().to_string();
                    let ordinal = if field.facet { facet_ordinal } else { None };
                    self.index_string_field(&text, points, &field.name, seq_id, ordinal, field, false)?;
                }
                FieldType::StringArray => {
                    let strings: Vec<String> = value
                        .as_array()
                        .map(|items| {
                            items
                                .iter()
                                .map(|v| v.as_str().unwrap_or_default().to_string())
                                .collect()
                        })
                        .unwrap_or_default();
                    let ordinal = if field.facet { facet_ordinal } else { None };
                    self.index_string_array_field(
                        &strings, points, &field.name, seq_id, ordinal, field, false,
                    )?;
                }
                FieldType::Int32 | FieldType::Int64 => {
                    let v = value.as_i64().unwrap_or(0);
                    self.num_tree_insert(&field.name, v, seq_id);
                }
                FieldType::Float => {
                    let v = float_to_int64(value.as_f64().unwrap_or(0.0) as f32);
                    self.num_tree_insert(&field.name, v, seq_id);
                }
                FieldType::Bool => {
                    let v = i64::from(value.as_bool().unwrap_or(false));
                    self.num_tree_insert(&field.name, v, seq_id);
                }
                FieldType::Int32Array | FieldType::Int64Array => {
                    for item in value.as_array().into_iter().flatten() {
                        self.num_tree_insert(&field.name, item.as_i64().unwrap_or(0), seq_id);
                    }
                }
                FieldType::FloatArray => {
                    for item in value.as_array().into_iter().flatten() {
                        let v = float_to_int64(item.as_f64().unwrap_or(0.0) as f32);
                        self.num_tree_insert(&field.name, v, seq_id);
                    }
                }
                FieldType::BoolArray => {
                    for item in value.as_array().into_iter().flatten() {
                        let v = i64::from(item.as_bool().unwrap_or(false));
                        self.num_tree_insert(&field.name, v, seq_id);
                    }
                }
            }

            // single numeric values are mirrored into the sort index
            if field.field_type.is_single_numeric() {
                let encoded = match field.field_type {
                    FieldType::Float => float_to_int64(value.as_f64().unwrap_or(0.0) as f32),
                    FieldType::Bool => i64::from(value.as_bool().unwrap_or(false)),
                    _ => value.as_i64().unwrap_or(0),
                };
                if let Some(table) = self.sort_index.get_mut(&field.name) {
                    table.insert(seq_id, encoded);
                }
            }
        }

        if !is_update {
            self.num_documents += 1;
        }
        Ok(())
    }

    fn num_tree_insert(&mut self, field: &str, value: i64, seq_id: SeqId) {
        if let Some(tree) = self.numerical_index.get_mut(field) {
            tree.insert(value, seq_id);
        }
    }

    /// With `verbatim`, the text is one token at position 0 rather than
    /// a word-split stream (non-string facet values keep their sign and
    /// punctuation).
    #[allow(clippy::too_many_arguments)]
    fn index_string_field(
        &mut self,
        text: &str,
        points: i64,
        tree_name: &str,
        seq_id: SeqId,
        facet_ordinal: Option<usize>,
        field: &FieldDefinition,
        verbatim: bool,
    ) -> Result<()> {
        let mut token_to_offsets: HashMap<String, Vec<u32>> = HashMap::new();

        let tokens = if verbatim {
            vec![crate::analysis::Token::new(text.to_string(), 0)]
        } else {
            self.tokenizer.tokenize(text)
        };

        for token in tokens {
            if let Some(ordinal) = facet_ordinal {
                let hash = facet_token_hash(field, &token.text);
                if let Some(entry) = self.facet_index.get_mut(&seq_id) {
                    entry[ordinal].push(hash);
                }
            }
            token_to_offsets
                .entry(token.text)
                .or_default()
                .push(token.position);
        }

        self.insert_tokens(tree_name, seq_id, points, token_to_offsets)
    }

    /// Array fields append, per element, the element's positions followed
    /// by a repeat of the last position (end-of-element mark) and the
    /// array index. The facet hash vector gets a delimiter per element.
    #[allow(clippy::too_many_arguments)]
    fn index_string_array_field(
        &mut self,
        strings: &[String],
        points: i64,
        tree_name: &str,
        seq_id: SeqId,
        facet_ordinal: Option<usize>,
        field: &FieldDefinition,
        verbatim: bool,
    ) -> Result<()> {
        let mut token_positions: HashMap<String, Vec<u32>> = HashMap::new();

        for (array_index, text) in strings.iter().enumerate() {
            let mut element_tokens: Vec<String> = Vec::new();

            let tokens = if verbatim {
                vec![crate::analysis::Token::new(text.clone(), 0)]
            } else {
                self.tokenizer.tokenize(text)
            };

            for token in tokens {
                if let Some(ordinal) = facet_ordinal {
                    let hash = facet_token_hash(field, &token.text);
                    if let Some(entry) = self.facet_index.get_mut(&seq_id) {
                        entry[ordinal].push(hash);
                    }
                }
                token_positions
                    .entry(token.text.clone())
                    .or_default()
                    .push(token.position);
                if !element_tokens.contains(&token.text) {
                    element_tokens.push(token.text);
                }
            }

            if let Some(ordinal) = facet_ordinal {
                if let Some(entry) = self.facet_index.get_mut(&seq_id) {
                    entry[ordinal].push(FACET_ARRAY_DELIMITER);
                }
            }

            for token in &element_tokens {
                let positions = token_positions.get_mut(token).unwrap();
                let last = *positions.last().unwrap();
                positions.push(last);
                positions.push(array_index as u32);
            }
        }

        self.insert_tokens(tree_name, seq_id, points, token_positions)
    }

    fn insert_tokens(
        &mut self,
        tree_name: &str,
        seq_id: SeqId,
        points: i64,
        token_to_offsets: HashMap<String, Vec<u32>>,
    ) -> Result<()> {
        let art = self.search_index.get_mut(tree_name).ok_or_else(|| {
            Error::new(
                ErrorKind::Internal,
                format!("No search index found for field `{}`.", tree_name),
            )
        })?;

        for (token, offsets) in token_to_offsets {
            art.insert(token.as_bytes(), seq_id, points, &offsets);
        }
        Ok(())
    }

    /// Purge a stored document from every index: each token's posting
    /// loses the seq id (leaf dropped when empty), numeric trees and the
    /// sort table forget the value, the facet entry is cleared.
    pub fn remove_document(&mut self, seq_id: SeqId, document: &Document) -> Result<()> {
        let fields: Vec<FieldDefinition> = self.schema.fields.clone();

        for field in &fields {
            if document.get(&field.name).is_none() {
                continue;
            }

            if field.field_type.is_string() {
                let tokens = self
                    .tokenizer
                    .field_tokens(document, &field.name, field.field_type);
                if let Some(art) = self.search_index.get_mut(&field.name) {
                    for token in &tokens {
                        art.remove_doc(token.as_bytes(), seq_id);
                    }
                }
                if field.facet {
                    self.clear_facet_entry(&field.name, seq_id);
                }
            } else {
                let value = document.get(&field.name).unwrap();
                let encoded: Vec<i64> = match value {
                    Value::Array(items) => items
                        .iter()
                        .map(|v| Self::encode_numeric(v, field.field_type))
                        .collect(),
                    other => vec![Self::encode_numeric(other, field.field_type)],
                };
                if let Some(tree) = self.numerical_index.get_mut(&field.name) {
                    for v in encoded {
                        tree.remove(v, seq_id);
                    }
                }

                if field.facet {
                    // drop the faceted-string alias postings as well
                    let tokens = self
                        .tokenizer
                        .field_tokens(document, &field.name, field.field_type);
                    if let Some(art) = self.search_index.get_mut(&field.faceted_name()) {
                        for token in &tokens {
                            art.remove_doc(token.as_bytes(), seq_id);
                        }
                    }
                    self.clear_facet_entry(&field.name, seq_id);
                }
            }

            if let Some(table) = self.sort_index.get_mut(&field.name) {
                table.remove(&seq_id);
            }
        }

        Ok(())
    }

    /// Full removal of a live document (delete operation, not an update
    /// of selected fields).
    pub fn drop_document(&mut self, seq_id: SeqId, document: &Document) -> Result<()> {
        self.remove_document(seq_id, document)?;
        self.facet_index.remove(&seq_id);
        self.num_documents = self.num_documents.saturating_sub(1);
        Ok(())
    }

    fn clear_facet_entry(&mut self, field_name: &str, seq_id: SeqId) {
        if let Some(ordinal) = self.schema.facet_ordinal(field_name) {
            if let Some(entry) = self.facet_index.get_mut(&seq_id) {
                entry[ordinal].clear();
            }
        }
    }

    fn encode_numeric(value: &Value, field_type: FieldType) -> i64 {
        match field_type {
            FieldType::Float | FieldType::FloatArray => {
                float_to_int64(value.as_f64().unwrap_or(0.0) as f32)
            }
            FieldType::Bool | FieldType::BoolArray => i64::from(value.as_bool().unwrap_or(false)),
            _ => value.as_i64().unwrap_or(0),
        }
    }

    /// Update hygiene: drop unchanged fields from the delete-set and the
    /// re-index set, so only fields whose tokenization actually changed
    /// cause trie churn.
    pub fn scrub_reindex_doc(&self, update_doc: &mut Document, del_doc: &mut Document, old_doc: &Document) {
        let mut unchanged: Vec<String> = Vec::new();

        for field in &self.schema.fields {
            if del_doc.get(&field.name).is_none() {
                continue;
            }

            let matches = if field.field_type.is_string() {
                let new_tokens = self
                    .tokenizer
                    .field_tokens(update_doc, &field.name, field.field_type);
                let old_tokens = self
                    .tokenizer
                    .field_tokens(old_doc, &field.name, field.field_type);
                new_tokens == old_tokens
            } else {
                update_doc.get(&field.name) == old_doc.get(&field.name)
            };

            if matches {
                unchanged.push(field.name.clone());
            }
        }

        for name in unchanged {
            if let Some(obj) = del_doc.as_object_mut() {
                obj.remove(&name);
            }
            if let Some(obj) = update_doc.as_object_mut() {
                obj.remove(&name);
            }
        }
    }

    /// Apply a validated batch. A record that fails mid-flight gets its
    /// pre-update tokenization re-applied (compensating action) and the
    /// batch continues.
    pub fn batch_index(&mut self, records: &mut [IndexRecord]) -> usize {
        let mut num_indexed = 0;

        for record in records.iter_mut() {
            if !record.ok() {
                continue;
            }

            if record.is_update {
                if let (Some(del_doc), Some(_old)) = (record.del_doc.take(), record.old_doc.as_ref()) {
                    let mut del_doc = del_doc;
                    let mut update_doc = record.doc.clone();
                    if let Some(old_doc) = record.old_doc.as_ref() {
                        self.scrub_reindex_doc(&mut update_doc, &mut del_doc, old_doc);
                    }
                    if let Err(err) = self.remove_document(record.seq_id, &del_doc) {
                        record.fail(err);
                        continue;
                    }
                    record.doc = update_doc;
                    record.del_doc = Some(del_doc);
                }
            }

            match self.index_document(&record.doc, record.seq_id, record.is_update) {
                Ok(()) => {
                    if !record.is_update {
                        num_indexed += 1;
                    }
                }
                Err(err) => {
                    if let Some(del_doc) = record.del_doc.as_ref() {
                        // restore the pre-update tokenization
                        let _ = self.index_document(del_doc, record.seq_id, true);
                    }
                    record.fail(err);
                }
            }
        }

        num_indexed
    }

    /// 64-bit combine hash over the group-by fields' facet hashes.
    pub fn distinct_id(&self, group_by_fields: &[String], seq_id: SeqId) -> u64 {
        let mut distinct: u64 = 1;
        let Some(entry) = self.facet_index.get(&seq_id) else {
            return distinct;
        };

        for field in group_by_fields {
            let Some(ordinal) = self.schema.facet_ordinal(field) else {
                continue;
            };
            for &hash in &entry[ordinal] {
                distinct = hash_combine(distinct, hash);
            }
        }
        distinct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema::{FieldDefinition, FieldType};
    use serde_json::json;

    fn books_index() -> Index {
        let schema = Schema::new(
            vec![
                FieldDefinition::new("title", FieldType::String),
                FieldDefinition::new("tags", FieldType::StringArray).faceted(),
                FieldDefinition::new("points", FieldType::Int32),
            ],
            "points",
        )
        .unwrap();
        Index::new("books", schema)
    }

    #[test]
    fn index_and_lookup_tokens() {
        let mut index = books_index();
        let doc = json!({"title": "The quick brown fox", "tags": ["a", "b"], "points": 10});
        index.index_document(&doc, 0, false).unwrap();

        let art = index.art("title").unwrap();
        let leaf = art.search(b"quick").expect("token indexed");
        assert_eq!(art.leaf(leaf).posting.positions_of(0), Some(&[1u32][..]));
        assert_eq!(index.sort_value("points", 0), Some(10));
        assert_eq!(index.num_documents(), 1);
    }

    #[test]
    fn array_field_offsets_carry_sentinel_and_index() {
        let mut index = books_index();
        let doc = json!({"title": "x", "tags": ["red shirt", "red"], "points": 1});
        index.index_document(&doc, 7, false).unwrap();

        let art = index.art("tags").unwrap();
        let leaf = art.search(b"red").unwrap();
        // element 0: pos 0, repeat 0, array index 0; element 1: same for index 1
        assert_eq!(
            art.leaf(leaf).posting.positions_of(7),
            Some(&[0u32, 0, 0, 0, 0, 1][..])
        );

        let facet = index.facet_entry(7).unwrap();
        let delimiters = facet[0]
            .iter()
            .filter(|&&h| h == FACET_ARRAY_DELIMITER)
            .count();
        assert_eq!(delimiters, 2);
    }

    #[test]
    fn remove_purges_every_index() {
        let mut index = books_index();
        let doc = json!({"title": "state trooper", "tags": ["c"], "points": 5});
        index.index_document(&doc, 3, false).unwrap();
        index.drop_document(3, &doc).unwrap();

        assert!(index.art("title").unwrap().search(b"trooper").is_none());
        assert_eq!(index.sort_value("points", 3), None);
        assert!(index.facet_entry(3).is_none());
        assert_eq!(index.num_documents(), 0);
        assert_eq!(
            index.num_tree("points").unwrap().search(crate::index::NumComparator::Equals, 5),
            Vec::<SeqId>::new()
        );
    }

    #[test]
    fn validation_rejects_schema_mismatches() {
        let index = books_index();
        let schema = index.schema();

        let missing = json!({"title": "x", "tags": []});
        assert_eq!(
            Index::validate_document(schema, &missing, false).unwrap_err().code(),
            400
        );

        let wrong_type = json!({"title": 42, "tags": [], "points": 1});
        assert!(Index::validate_document(schema, &wrong_type, false).is_err());

        let too_big = json!({"title": "x", "tags": [], "points": i64::from(i32::MAX) + 1});
        assert!(Index::validate_document(schema, &too_big, false).is_err());

        // updates may omit required fields
        let partial = json!({"points": 3});
        assert!(Index::validate_document(schema, &partial, true).is_ok());
    }

    #[test]
    fn scrub_skips_unchanged_fields() {
        let index = books_index();
        let old_doc = json!({"title": "same title", "tags": ["a"], "points": 5});
        let mut update_doc = json!({"title": "same title", "tags": ["b"], "points": 9});
        let mut del_doc = old_doc.clone();

        index.scrub_reindex_doc(&mut update_doc, &mut del_doc, &old_doc);

        assert!(del_doc.get("title").is_none(), "unchanged field kept in del_doc");
        assert!(update_doc.get("title").is_none());
        assert!(del_doc.get("tags").is_some());
        assert!(update_doc.get("tags").is_some());
    }

    #[test]
    fn distinct_id_groups_equal_facets() {
        let mut index = books_index();
        index
            .index_document(&json!({"title": "a", "tags": ["x"], "points": 1}), 1, false)
            .unwrap();
        index
            .index_document(&json!({"title": "b", "tags": ["x"], "points": 2}), 2, false)
            .unwrap();
        index
            .index_document(&json!({"title": "c", "tags": ["y"], "points": 3}), 3, false)
            .unwrap();

        let group = vec!["tags".to_string()];
        assert_eq!(index.distinct_id(&group, 1), index.distinct_id(&group, 2));
        assert_ne!(index.distinct_id(&group, 1), index.distinct_id(&group, 3));
    }
}
