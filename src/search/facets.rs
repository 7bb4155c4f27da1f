use std::collections::{HashMap, HashSet};

use crate::analysis::Tokenizer;
use crate::core::types::SeqId;
use crate::index::art::TokenOrdering;
use crate::index::in_memory::{combine_value_hash, facet_token_hash, Index, FACET_ARRAY_DELIMITER};
use crate::schema::schema::FieldType;

/// A facet-query token's mapping onto a facet value's tokens, used for
/// highlighting refined facet values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPosCost {
    pub pos: usize,
    pub cost: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FacetStats {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub count: u64,
}

impl FacetStats {
    fn new() -> Self {
        FacetStats {
            min: f64::MAX,
            max: f64::MIN,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    fn update(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.count += 1;
    }
}

/// Aggregated tally for one facet value (identified by the combined hash
/// of its token hashes). `doc_id`/`array_pos` point at one document that
/// carries the value, so the display string can be recovered from the
/// stored document.
#[derive(Debug, Clone)]
pub struct FacetCount {
    pub count: u64,
    pub groups: HashSet<u64>,
    pub doc_id: SeqId,
    pub array_pos: usize,
    pub query_token_pos: HashMap<usize, TokenPosCost>,
}

#[derive(Debug, Clone)]
pub struct Facet {
    pub field_name: String,
    pub result_map: HashMap<u64, FacetCount>,
    pub stats: FacetStats,
}

impl Facet {
    pub fn new(field_name: &str) -> Self {
        Facet {
            field_name: field_name.to_string(),
            result_map: HashMap::new(),
            stats: FacetStats::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FacetQuery {
    pub field_name: String,
    pub query: String,
}

struct FacetInfo {
    use_facet_query: bool,
    should_compute_stats: bool,
    field_type: FieldType,
    ordinal: usize,
    /// facet token hash -> best (query token position, cost)
    fhash_qtoken_pos: HashMap<u64, TokenPosCost>,
}

/// Walk the facet entries of every result document, accumulating value
/// counts (or group counts) and numeric stats. With a facet query, only
/// values containing all query tokens are counted and the per-token
/// mapping is kept for highlighting.
pub fn compute_facets(
    index: &Index,
    facets: &mut [Facet],
    facet_query: &FacetQuery,
    group_by_fields: &[String],
    group_limit: usize,
    result_ids: &[SeqId],
) {
    let mut infos: Vec<FacetInfo> = Vec::with_capacity(facets.len());

    for facet in facets.iter() {
        // facet fields are validated upstream; unknown ones are inert
        let field = index.schema().field(&facet.field_name);
        let ordinal = index.schema().facet_ordinal(&facet.field_name);
        let (Some(field), Some(ordinal)) = (field, ordinal) else {
            infos.push(FacetInfo {
                use_facet_query: false,
                should_compute_stats: false,
                field_type: FieldType::String,
                ordinal: usize::MAX,
                fhash_qtoken_pos: HashMap::new(),
            });
            continue;
        };

        let mut info = FacetInfo {
            use_facet_query: false,
            should_compute_stats: !field.field_type.is_string() && !field.field_type.is_bool(),
            field_type: field.field_type,
            ordinal,
            fhash_qtoken_pos: HashMap::new(),
        };

        if facet.field_name == facet_query.field_name && !facet_query.query.is_empty() {
            info.use_facet_query = true;

            let mut query = facet_query.query.clone();
            if field.field_type.is_bool() {
                if query == "true" {
                    query = "1".to_string();
                } else if query == "false" {
                    query = "0".to_string();
                }
            }

            let tree_name = if field.field_type.is_string() {
                field.name.clone()
            } else {
                field.faceted_name()
            };

            if let Some(art) = index.art(&tree_name) {
                // non-string facet values are single verbatim tokens
                let query_tokens = if field.field_type.is_string() {
                    Tokenizer::new().tokenize_text(&query)
                } else {
                    vec![query.clone()]
                };
                for (qtoken_index, qtoken) in query_tokens.iter().enumerate() {
                    let bounded_cost = if qtoken.len() < 3 { 0 } else { 1 };
                    // only the last token is prefix-expanded
                    let prefix_search = qtoken_index == query_tokens.len() - 1;

                    let leaves = art.fuzzy_search(
                        qtoken.as_bytes(),
                        0,
                        bounded_cost,
                        10_000,
                        TokenOrdering::MaxScore,
                        prefix_search,
                    );

                    for candidate in leaves {
                        let token = art.leaf(candidate.leaf).token();
                        let hash = facet_token_hash(field, &token);
                        let entry = TokenPosCost {
                            pos: qtoken_index,
                            cost: candidate.cost,
                        };
                        // keep the lowest-cost mapping per facet token
                        info.fhash_qtoken_pos
                            .entry(hash)
                            .and_modify(|existing| {
                                if candidate.cost < existing.cost {
                                    *existing = entry;
                                }
                            })
                            .or_insert(entry);
                    }
                }
            }
        }

        infos.push(info);
    }

    for &seq_id in result_ids {
        let Some(facet_entry) = index.facet_entry(seq_id) else {
            continue;
        };

        let distinct_id = if group_limit > 0 {
            index.distinct_id(group_by_fields, seq_id)
        } else {
            0
        };

        for (facet, info) in facets.iter_mut().zip(infos.iter()) {
            if info.ordinal == usize::MAX {
                continue;
            }
            let fhashes = &facet_entry[info.ordinal];

            let mut array_pos = 0usize;
            let mut fvalue_found = false;
            let mut combined_hash: u64 = 1;
            let mut query_token_positions: HashMap<usize, TokenPosCost> = HashMap::new();
            let mut field_token_index: usize = 0;

            for (j, &fhash) in fhashes.iter().enumerate() {
                if fhash != FACET_ARRAY_DELIMITER {
                    combined_hash = combine_value_hash(combined_hash, fhash, field_token_index);
                    field_token_index += 1;

                    if info.should_compute_stats {
                        facet.stats.update(raw_facet_value(fhash, info.field_type));
                    }

                    if !info.use_facet_query {
                        fvalue_found = true;
                    } else if let Some(qtoken_pos) = info.fhash_qtoken_pos.get(&fhash) {
                        fvalue_found = true;
                        // a query token keeps its lowest-cost field token
                        let mapped = TokenPosCost {
                            pos: field_token_index - 1,
                            cost: qtoken_pos.cost,
                        };
                        query_token_positions
                            .entry(qtoken_pos.pos)
                            .and_modify(|existing| {
                                if qtoken_pos.cost <= existing.cost {
                                    *existing = mapped;
                                }
                            })
                            .or_insert(mapped);
                    }
                }

                let value_ends = fhash == FACET_ARRAY_DELIMITER
                    || (*fhashes.last().unwrap() != FACET_ARRAY_DELIMITER && j == fhashes.len() - 1);

                if value_ends {
                    if !info.use_facet_query || fvalue_found {
                        let slot = facet.result_map.entry(combined_hash).or_insert(FacetCount {
                            count: 0,
                            groups: HashSet::new(),
                            doc_id: seq_id,
                            array_pos,
                            query_token_pos: HashMap::new(),
                        });

                        slot.doc_id = seq_id;
                        slot.array_pos = array_pos;
                        if group_limit > 0 {
                            slot.groups.insert(distinct_id);
                        } else {
                            slot.count += 1;
                        }
                        if info.use_facet_query {
                            slot.query_token_pos = query_token_positions.clone();
                        }
                    }

                    array_pos += 1;
                    fvalue_found = false;
                    combined_hash = 1;
                    query_token_positions.clear();
                    field_token_index = 0;
                }
            }
        }
    }
}

/// Recover the numeric value carried in a facet token hash.
fn raw_facet_value(hash: u64, field_type: FieldType) -> f64 {
    if field_type.is_float() {
        f32::from_bits(hash as u32) as f64
    } else {
        hash as i64 as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema::{FieldDefinition, Schema};
    use serde_json::json;

    fn facet_index() -> Index {
        let schema = Schema::new(
            vec![
                FieldDefinition::new("title", FieldType::String),
                FieldDefinition::new("tags", FieldType::StringArray).faceted(),
                FieldDefinition::new("points", FieldType::Int32).faceted(),
            ],
            "points",
        )
        .unwrap();
        let mut index = Index::new("facets", schema);
        index
            .index_document(&json!({"title": "a", "tags": ["red", "blue"], "points": 4}), 0, false)
            .unwrap();
        index
            .index_document(&json!({"title": "b", "tags": ["red"], "points": 10}), 1, false)
            .unwrap();
        index
    }

    #[test]
    fn counts_values_across_results() {
        let index = facet_index();
        let mut facets = vec![Facet::new("tags")];
        compute_facets(&index, &mut facets, &FacetQuery::default(), &[], 0, &[0, 1]);

        let counts: Vec<u64> = facets[0].result_map.values().map(|c| c.count).collect();
        let mut counts = counts;
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2]); // blue x1, red x2
    }

    #[test]
    fn numeric_facets_accumulate_stats() {
        let index = facet_index();
        let mut facets = vec![Facet::new("points")];
        compute_facets(&index, &mut facets, &FacetQuery::default(), &[], 0, &[0, 1]);

        let stats = &facets[0].stats;
        assert_eq!(stats.min, 4.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.sum, 14.0);
        assert_eq!(stats.avg(), 7.0);
    }

    #[test]
    fn facet_query_restricts_counted_values() {
        let index = facet_index();
        let mut facets = vec![Facet::new("tags")];
        let query = FacetQuery {
            field_name: "tags".to_string(),
            query: "re".to_string(),
        };
        compute_facets(&index, &mut facets, &query, &[], 0, &[0, 1]);

        assert_eq!(facets[0].result_map.len(), 1);
        let only = facets[0].result_map.values().next().unwrap();
        assert_eq!(only.count, 2);
        assert_eq!(only.query_token_pos.len(), 1);
    }

    #[test]
    fn group_limit_counts_groups_not_documents() {
        let index = facet_index();
        let mut facets = vec![Facet::new("tags")];
        let group_by = vec!["points".to_string()];
        compute_facets(&index, &mut facets, &FacetQuery::default(), &group_by, 2, &[0, 1]);

        for count in facets[0].result_map.values() {
            assert_eq!(count.count, 0);
            assert!(!count.groups.is_empty());
        }
    }
}
