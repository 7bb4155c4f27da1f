use std::collections::{BTreeMap, HashMap, HashSet};

use roaring::RoaringBitmap;
use tracing::debug;

use crate::core::error::Result;
use crate::core::types::SeqId;
use crate::index::art::{Art, NodeId, TokenOrdering};
use crate::index::in_memory::{combine_value_hash, facet_token_hash, Index, FACET_ARRAY_DELIMITER};
use crate::index::num_tree::float_to_int64;
use crate::index::posting::{intersect_sorted, union_sorted};
use crate::query::filter::{Filter, FilterComparator};
use crate::query::sort::{SortBy, TEXT_MATCH};
use crate::search::facets::{compute_facets, Facet, FacetQuery};
use crate::search::matcher::{populate_token_positions, Match};
use crate::search::topster::{Kv, Topster};

/// Highest field weight; the first searched field gets this, each later
/// field two less, leaving the odd slot between for its synonym tier.
pub const FIELD_LIMIT_NUM: usize = 100;

/// Bound on candidate/cost combinations explored per token set.
const COMBINATION_LIMIT: i64 = 10;

/// Typo cost attributed to cross-field approximate scores.
const APPROX_MATCH_COST: u32 = 100;

/// Fully resolved inputs for one search, produced by the collection
/// layer from the raw parameters.
#[derive(Debug, Clone)]
pub struct SearchArgs {
    pub include_tokens: Vec<String>,
    pub exclude_tokens: Vec<String>,
    pub synonyms: Vec<Vec<String>>,
    pub search_fields: Vec<String>,
    pub filters: Vec<Filter>,
    pub facets: Vec<String>,
    pub facet_query: FacetQuery,
    /// 0-based result position -> curated seq id.
    pub included_ids: BTreeMap<usize, SeqId>,
    pub excluded_ids: Vec<SeqId>,
    pub sort_fields: Vec<SortBy>,
    pub num_typos: u32,
    /// Entries retained by the top-K heap: max(1, page * per_page).
    pub max_hits: usize,
    pub prefix: bool,
    pub drop_tokens_threshold: usize,
    pub typo_tokens_threshold: usize,
    pub group_by: Vec<String>,
    pub group_limit: usize,
    pub token_order: TokenOrdering,
}

/// Raw ranked output; document fetch, paging and highlighting happen in
/// the collection layer.
#[derive(Debug)]
pub struct SearchOutput {
    pub result_kvs: Vec<Kv>,
    pub override_kvs: Vec<Kv>,
    /// distinct id -> collapsed group members, when grouping.
    pub group_hits: HashMap<u64, Vec<Kv>>,
    pub found: usize,
    pub facets: Vec<Facet>,
    /// Index tokens actually matched, per query index; drives highlights.
    pub searched_tokens: Vec<Vec<String>>,
}

struct TokenCandidates {
    token: String,
    cost: u32,
    candidates: Vec<NodeId>,
}

/// Executes one search against an index. All mutable state lives here
/// for the duration of the call; the index itself is only read.
pub struct QueryExecutor<'a> {
    index: &'a Index,
    args: &'a SearchArgs,

    searched_tokens: Vec<Vec<String>>,
    all_result_ids: Vec<SeqId>,
    groups_processed: HashSet<u64>,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(index: &'a Index, args: &'a SearchArgs) -> Self {
        QueryExecutor {
            index,
            args,
            searched_tokens: Vec::new(),
            all_result_ids: Vec::new(),
            groups_processed: HashSet::new(),
        }
    }

    pub fn search(mut self) -> Result<SearchOutput> {
        let args = self.args;

        // Stage 1: filters resolve to a sorted id list
        let has_filters = !args.filters.is_empty();
        let filter_ids = self.do_filtering()?;

        // curated ids are carved out of the organic results
        let mut curated_ids: Vec<SeqId> = args.included_ids.values().copied().collect();
        curated_ids.extend_from_slice(&args.excluded_ids);
        curated_ids.sort_unstable();
        curated_ids.dedup();

        // Stage 2: documents containing excluded tokens, across fields
        let mut excluded_by_tokens = RoaringBitmap::new();
        for field in &args.search_fields {
            let Some(art) = self.index.art(field) else {
                continue;
            };
            for token in &args.exclude_tokens {
                if let Some(leaf) = art.search(token.as_bytes()) {
                    for id in art.leaf(leaf).posting.ids() {
                        excluded_by_tokens.insert(id);
                    }
                }
            }
        }
        for &id in &curated_ids {
            excluded_by_tokens.insert(id);
        }

        let mut topster = Topster::new(args.max_hits, args.group_limit);
        let mut curated_topster = Topster::new(args.max_hits, args.group_limit);

        let wildcard = args.include_tokens.first().map(String::as_str) == Some("*");

        if wildcard {
            let field_id = FIELD_LIMIT_NUM as u8;
            let mut ids = if has_filters {
                filter_ids.clone()
            } else {
                self.index.all_seq_ids()
            };
            ids.retain(|id| !excluded_by_tokens.contains(*id));

            let field = args.search_fields[0].clone();
            self.score_results(&mut topster, field_id, 0, &field, &[], &ids);
            self.all_result_ids = ids;
        } else {
            // Stage 3: per-field candidate search
            let mut topster_ids: HashMap<SeqId, Vec<Kv>> = HashMap::new();

            for (i, field) in args.search_fields.iter().enumerate() {
                if has_filters && filter_ids.is_empty() {
                    break;
                }
                let field_id = (FIELD_LIMIT_NUM - 2 * i) as u8;

                let mut ftopster = Topster::new(args.max_hits, args.group_limit);

                self.search_field(
                    field_id,
                    field,
                    args.include_tokens.clone(),
                    args.include_tokens.clone(),
                    0,
                    &filter_ids,
                    has_filters,
                    &excluded_by_tokens,
                    &mut ftopster,
                )?;

                // synonym tier sits one weight below its field
                for synonym_tokens in &args.synonyms {
                    self.search_field(
                        field_id - 1,
                        field,
                        synonym_tokens.clone(),
                        synonym_tokens.clone(),
                        0,
                        &filter_ids,
                        has_filters,
                        &excluded_by_tokens,
                        &mut ftopster,
                    )?;
                }

                ftopster.collect_by_seq_id(&mut topster_ids);
            }

            // Stage 4: cross-field aggregation
            self.aggregate_fields(&mut topster, topster_ids)?;
        }

        // Stage 6: curated entries ranked by caller-given positions
        self.collate_included_ids(&mut curated_topster);

        // Stage 7: facets over organic + curated results
        let mut facets: Vec<Facet> = args.facets.iter().map(|f| Facet::new(f)).collect();
        let included_seq_ids: Vec<SeqId> = args.included_ids.values().copied().collect();
        compute_facets(
            self.index,
            &mut facets,
            &args.facet_query,
            &args.group_by,
            args.group_limit,
            &self.all_result_ids,
        );
        compute_facets(
            self.index,
            &mut facets,
            &args.facet_query,
            &args.group_by,
            args.group_limit,
            &included_seq_ids,
        );

        let found = self.all_result_ids.len() + curated_topster.len();

        let mut group_hits = HashMap::new();
        if args.group_limit > 0 {
            for kv in topster.sorted() {
                group_hits.insert(kv.distinct_id, topster.group_hits(kv.distinct_id));
            }
        }

        Ok(SearchOutput {
            result_kvs: topster.sorted(),
            override_kvs: curated_topster.sorted(),
            group_hits,
            found,
            facets,
            searched_tokens: self.searched_tokens,
        })
    }

    /// Stage 1. Conjunctive across filters, disjunctive across one
    /// filter's values.
    fn do_filtering(&self) -> Result<Vec<SeqId>> {
        let mut filter_ids: Option<Vec<SeqId>> = None;

        for filter in &self.args.filters {
            let Some(field) = self.index.schema().field(&filter.field_name) else {
                continue;
            };
            let field = field.clone();

            let mut result_ids: Vec<SeqId> = Vec::new();

            if !field.field_type.is_string() {
                let Some(tree) = self.index.num_tree(&field.name) else {
                    continue;
                };
                for value in &filter.values {
                    let encoded = if field.field_type.is_bool() {
                        i64::from(value == "true" || value == "1")
                    } else if field.field_type.is_float() {
                        float_to_int64(value.parse::<f64>().unwrap_or(0.0) as f32)
                    } else {
                        value.parse::<i64>().unwrap_or(0)
                    };
                    let ids = tree.search(filter.comparator.to_num(), encoded);
                    result_ids = union_sorted(&result_ids, &ids);
                }
            } else {
                let Some(art) = self.index.art(&field.name) else {
                    continue;
                };
                let tokenizer = crate::analysis::Tokenizer::new();

                for value in &filter.values {
                    // multiple tokens inside one value are conjunctive,
                    // e.g. country: South Africa
                    let tokens = tokenizer.tokenize_text(value);
                    let mut value_ids: Option<Vec<SeqId>> = None;
                    let mut leaves: Vec<NodeId> = Vec::new();

                    for token in &tokens {
                        let Some(leaf) = art.search(token.as_bytes()) else {
                            value_ids = Some(Vec::new());
                            break;
                        };
                        leaves.push(leaf);
                        let ids = art.leaf(leaf).posting.ids();
                        value_ids = Some(match value_ids {
                            None => ids,
                            Some(prev) => intersect_sorted(&prev, &ids),
                        });
                    }

                    let mut value_ids = value_ids.unwrap_or_default();

                    if filter.comparator == FilterComparator::ExactEquals && !value_ids.is_empty() {
                        if field.facet {
                            value_ids = self.exact_filter_by_facet_hash(&field, &tokens, &value_ids);
                        } else {
                            value_ids = self.exact_filter_by_positions(art, &leaves, &value_ids);
                        }
                    }

                    result_ids = union_sorted(&result_ids, &value_ids);
                }
            }

            filter_ids = Some(match filter_ids {
                None => result_ids,
                Some(prev) => intersect_sorted(&prev, &result_ids),
            });
        }

        Ok(filter_ids.unwrap_or_default())
    }

    /// `:=` on a faceted field: the combined hash of the filter value's
    /// tokens must equal the combined hash of one whole facet value.
    fn exact_filter_by_facet_hash(
        &self,
        field: &crate::schema::schema::FieldDefinition,
        tokens: &[String],
        candidate_ids: &[SeqId],
    ) -> Vec<SeqId> {
        let Some(ordinal) = self.index.schema().facet_ordinal(&field.name) else {
            return candidate_ids.to_vec();
        };

        let mut filter_hash: u64 = 1;
        for (i, token) in tokens.iter().enumerate() {
            filter_hash = combine_value_hash(filter_hash, facet_token_hash(field, token), i);
        }

        candidate_ids
            .iter()
            .copied()
            .filter(|&seq_id| {
                let Some(entry) = self.index.facet_entry(seq_id) else {
                    return false;
                };
                let fhashes = &entry[ordinal];
                if fhashes.is_empty() {
                    return false;
                }
                let mut value_hash: u64 = 1;
                let mut token_index = 0usize;

                for (j, &fhash) in fhashes.iter().enumerate() {
                    if fhash != FACET_ARRAY_DELIMITER {
                        value_hash = combine_value_hash(value_hash, fhash, token_index);
                        token_index += 1;
                    }

                    let value_ends = fhash == FACET_ARRAY_DELIMITER
                        || (*fhashes.last().unwrap() != FACET_ARRAY_DELIMITER
                            && j == fhashes.len() - 1);
                    if value_ends {
                        if value_hash == filter_hash {
                            return true;
                        }
                        value_hash = 1;
                        token_index = 0;
                    }
                }
                false
            })
            .collect()
    }

    /// `:=` on a non-faceted string field: token i of the filter value
    /// must sit at position i of one element.
    fn exact_filter_by_positions(
        &self,
        art: &Art,
        leaves: &[NodeId],
        candidate_ids: &[SeqId],
    ) -> Vec<SeqId> {
        candidate_ids
            .iter()
            .copied()
            .filter(|&seq_id| {
                let token_offsets: Vec<Option<&[u32]>> = leaves
                    .iter()
                    .map(|&leaf| art.leaf(leaf).posting.positions_of(seq_id))
                    .collect();
                let elements = populate_token_positions(&token_offsets);

                elements.values().any(|token_positions| {
                    token_positions.len() == leaves.len()
                        && token_positions
                            .iter()
                            .enumerate()
                            .all(|(i, positions)| positions.contains(&(i as u32)))
                })
            })
            .collect()
    }

    /// Stage 3 for one field: enumerate cost combinations, resolve fuzzy
    /// candidates per token, then intersect and score. Tokens with no
    /// candidates lose costs and are eventually dropped.
    #[allow(clippy::too_many_arguments)]
    fn search_field(
        &mut self,
        field_id: u8,
        field: &str,
        query_tokens: Vec<String>,
        search_tokens: Vec<String>,
        num_tokens_dropped: usize,
        filter_ids: &[SeqId],
        has_filters: bool,
        excluded: &RoaringBitmap,
        topster: &mut Topster,
    ) -> Result<()> {
        if self.index.art(field).is_none() {
            return Ok(());
        }

        let mut query_tokens = query_tokens;
        let mut search_tokens = search_tokens;

        let max_cost = self.args.num_typos.min(2);
        let mut field_num_results = 0usize;

        let mut token_to_costs: Vec<Vec<u32>> = search_tokens
            .iter()
            .map(|t| (0..=bounded_typo_cost(max_cost, t.chars().count())).collect())
            .collect();

        // avoid re-running the same (token, cost) trie walk per combination
        let mut token_cost_cache: HashMap<(String, u32), Vec<NodeId>> = HashMap::new();

        let product =
            |costs: &[Vec<u32>]| -> i64 { costs.iter().map(|c| c.len() as i64).product::<i64>() };

        let mut n: i64 = 0;
        let mut total = product(&token_to_costs);

        'typo_loop: while n < total && n < COMBINATION_LIMIT {
            // combination n spells one cost per token, e.g. [0, 0, 1]
            let mut costs = vec![0u32; token_to_costs.len()];
            {
                let mut q = n;
                for i in (0..token_to_costs.len()).rev() {
                    let size = token_to_costs[i].len() as i64;
                    costs[i] = token_to_costs[i][(q % size) as usize];
                    q /= size;
                }
            }

            let mut token_candidates_vec: Vec<TokenCandidates> = Vec::new();
            let mut token_index = 0usize;

            while token_index < search_tokens.len() {
                let token = search_tokens[token_index].clone();
                let cost = costs[token_index];
                let cache_key = (token.clone(), cost);

                let leaves: Vec<NodeId> = match token_cost_cache.get(&cache_key) {
                    Some(cached) => cached.clone(),
                    None => {
                        let Some(art) = self.index.art(field) else {
                            return Ok(());
                        };
                        // prefix applies only to the final token
                        let prefix_search =
                            self.args.prefix && token_index == search_tokens.len() - 1;
                        let max_candidates = if prefix_search { 10 } else { 3 };

                        let found = art
                            .fuzzy_search(
                                token.as_bytes(),
                                cost,
                                cost,
                                max_candidates,
                                self.args.token_order,
                                prefix_search,
                            )
                            .into_iter()
                            .map(|c| c.leaf)
                            .collect::<Vec<_>>();

                        if !found.is_empty() {
                            token_cost_cache.insert(cache_key, found.clone());
                        }
                        found
                    }
                };

                if leaves.is_empty() {
                    // no candidates at this cost: retire the cost, and the
                    // token itself once it has no costs left
                    if let Some(pos) = token_to_costs[token_index].iter().position(|&c| c == cost) {
                        token_to_costs[token_index].remove(pos);
                        if token_to_costs[token_index].is_empty() {
                            token_to_costs.remove(token_index);
                            search_tokens.remove(token_index);
                            if token_index < query_tokens.len() {
                                query_tokens.remove(token_index);
                            }
                        }
                    }

                    if search_tokens.is_empty() {
                        break 'typo_loop;
                    }

                    n = 0;
                    total = product(&token_to_costs);
                    continue 'typo_loop;
                }

                token_candidates_vec.push(TokenCandidates {
                    token,
                    cost,
                    candidates: leaves,
                });
                token_index += 1;
            }

            if !token_candidates_vec.is_empty() {
                self.search_candidates(
                    field_id,
                    field,
                    filter_ids,
                    has_filters,
                    excluded,
                    &token_candidates_vec,
                    num_tokens_dropped as u32,
                    topster,
                    &mut field_num_results,
                )?;
            }

            if field_num_results >= self.args.drop_tokens_threshold
                || field_num_results >= self.args.typo_tokens_threshold
            {
                return Ok(());
            }

            n += 1;
        }

        // Stage 3f: token dropping, from the right then from the left
        if !query_tokens.is_empty() && num_tokens_dropped < query_tokens.len() {
            let num_tokens_dropped = num_tokens_dropped + 1;
            let mid_index = query_tokens.len() / 2;

            let truncated: Vec<String> = if num_tokens_dropped <= mid_index {
                let end_index = query_tokens.len() - 1 - num_tokens_dropped;
                query_tokens[..=end_index].to_vec()
            } else {
                let start_index = (num_tokens_dropped - mid_index).min(query_tokens.len() - 1);
                query_tokens[start_index..].to_vec()
            };

            if truncated.is_empty() || truncated.len() == query_tokens.len() {
                return Ok(());
            }

            debug!(field, dropped = num_tokens_dropped, "dropping query tokens");

            return self.search_field(
                field_id,
                field,
                query_tokens,
                truncated,
                num_tokens_dropped,
                filter_ids,
                has_filters,
                excluded,
                topster,
            );
        }

        Ok(())
    }

    /// Stage 3c-3d: iterate combinations of one candidate leaf per token,
    /// intersect their postings, carve out exclusions, apply filters and
    /// score the survivors.
    #[allow(clippy::too_many_arguments)]
    fn search_candidates(
        &mut self,
        field_id: u8,
        field: &str,
        filter_ids: &[SeqId],
        has_filters: bool,
        excluded: &RoaringBitmap,
        token_candidates_vec: &[TokenCandidates],
        drop_cost: u32,
        topster: &mut Topster,
        field_num_results: &mut usize,
    ) -> Result<()> {
        let total: i64 = token_candidates_vec
            .iter()
            .map(|tc| tc.candidates.len() as i64)
            .product();
        // every dropped query token weighs like one extra typo
        let total_cost: u32 =
            token_candidates_vec.iter().map(|tc| tc.cost).sum::<u32>() + drop_cost;

        for n in 0..total.min(COMBINATION_LIMIT) {
            let art = match self.index.art(field) {
                Some(art) => art,
                None => return Ok(()),
            };

            // one leaf per token, preserving the query's token order
            let mut query_suggestion: Vec<NodeId> = Vec::with_capacity(token_candidates_vec.len());
            {
                let mut q = n;
                for tc in token_candidates_vec {
                    let size = tc.candidates.len() as i64;
                    query_suggestion.push(tc.candidates[(q % size) as usize]);
                    q /= size;
                }
            }

            // intersect smallest posting first
            let mut by_size = query_suggestion.clone();
            by_size.sort_by_key(|&leaf| art.leaf(leaf).posting.len());

            let mut result_ids = art.leaf(by_size[0]).posting.ids();
            for &leaf in &by_size[1..] {
                if result_ids.is_empty() {
                    break;
                }
                result_ids = art.leaf(leaf).posting.intersect(&result_ids);
            }

            if result_ids.is_empty() {
                continue;
            }

            result_ids.retain(|id| !excluded.contains(*id));

            if has_filters {
                result_ids = intersect_sorted(filter_ids, &result_ids);
            }

            if result_ids.is_empty() {
                continue;
            }

            self.all_result_ids = union_sorted(&self.all_result_ids, &result_ids);

            let searched: Vec<String> = query_suggestion
                .iter()
                .map(|&leaf| art.leaf(leaf).token())
                .collect();

            self.score_results(
                topster,
                field_id,
                total_cost,
                field,
                &query_suggestion,
                &result_ids,
            );

            *field_num_results += result_ids.len();
            self.searched_tokens.push(searched);

            if *field_num_results >= self.args.typo_tokens_threshold {
                break;
            }
        }

        Ok(())
    }

    /// Stage 3d + Stage 5: match-score each id and push it with its sort
    /// keys into the topster.
    fn score_results(
        &mut self,
        topster: &mut Topster,
        field_id: u8,
        total_cost: u32,
        field: &str,
        query_suggestion: &[NodeId],
        result_ids: &[SeqId],
    ) {
        let art = self.index.art(field);

        // batch-resolve each leaf's posting positions for the result set
        let mut leaf_to_indices: Vec<Vec<usize>> = Vec::with_capacity(query_suggestion.len());
        if let Some(art) = art {
            for &leaf in query_suggestion {
                let mut indices = Vec::new();
                art.leaf(leaf).posting.index_of_each(result_ids, &mut indices);
                leaf_to_indices.push(indices);
            }
        }

        let single_token_score = Match::new(1, 0).score(total_cost, field_id);
        let query_index = self.searched_tokens.len() as u16;
        let sort_fields = &self.args.sort_fields;

        for (i, &seq_id) in result_ids.iter().enumerate() {
            let match_score = match art {
                Some(art) if query_suggestion.len() > 1 => {
                    let token_offsets: Vec<Option<&[u32]>> = query_suggestion
                        .iter()
                        .zip(leaf_to_indices.iter())
                        .map(|(&leaf, indices)| {
                            let posting = &art.leaf(leaf).posting;
                            let pos = indices[i];
                            (pos != posting.len()).then(|| posting.positions_at(pos))
                        })
                        .collect();

                    // the best-scoring array element wins
                    populate_token_positions(&token_offsets)
                        .values()
                        .map(|positions| {
                            Match::from_token_positions(positions).score(total_cost, field_id)
                        })
                        .max()
                        .unwrap_or(single_token_score)
                }
                _ => single_token_score,
            };

            let mut scores = [0i64; 3];
            let mut match_score_index = 0usize;

            for (slot, sort_by) in sort_fields.iter().enumerate().take(3) {
                let value = if sort_by.name == TEXT_MATCH {
                    match_score_index = slot;
                    match_score as i64
                } else {
                    self.index.sort_value(&sort_by.name, seq_id).unwrap_or(0)
                };
                scores[slot] = if sort_by.ascending { -value } else { value };
            }

            let distinct_id = if self.args.group_limit > 0 {
                let id = self.index.distinct_id(&self.args.group_by, seq_id);
                self.groups_processed.insert(id);
                id
            } else {
                seq_id as u64
            };

            topster.add(Kv {
                field_id,
                query_index,
                seq_id,
                distinct_id,
                match_score_index,
                scores,
            });
        }
    }

    /// Stage 4: union per-field topsters by seq id; the primary entry
    /// absorbs other fields' match scores, with a lightweight estimate
    /// for fields that never scored the document.
    fn aggregate_fields(
        &mut self,
        topster: &mut Topster,
        topster_ids: HashMap<SeqId, Vec<Kv>>,
    ) -> Result<()> {
        let num_fields = self.args.search_fields.len();

        for (seq_id, kvs) in topster_ids {
            let mut primary = kvs[0];

            if num_fields > 1 {
                let mut existing: HashMap<u8, &Kv> = HashMap::new();
                for kv in &kvs {
                    existing.entry(kv.field_id).or_insert(kv);
                }

                for (i, field) in self.args.search_fields.iter().enumerate() {
                    let field_id = (FIELD_LIMIT_NUM - 2 * i) as u8;
                    if field_id == primary.field_id {
                        continue;
                    }

                    if let Some(kv) = existing.get(&field_id) {
                        primary.scores[primary.match_score_index] +=
                            kv.scores[kv.match_score_index];
                        continue;
                    }

                    // approximate: per include token, the offsets this
                    // document holds for the token's closest leaf
                    let Some(art) = self.index.art(field) else {
                        continue;
                    };
                    let mut words_present = 0usize;

                    for (token_index, token) in self.args.include_tokens.iter().enumerate() {
                        let prefix_search =
                            self.args.prefix && token_index == self.args.include_tokens.len() - 1;
                        let leaves = art.fuzzy_search(
                            token.as_bytes(),
                            0,
                            0,
                            1,
                            self.args.token_order,
                            prefix_search,
                        );
                        let Some(first) = leaves.first() else {
                            continue;
                        };
                        if let Some(positions) = art.leaf(first.leaf).posting.positions_of(seq_id) {
                            words_present += positions.len();
                        }
                    }

                    if words_present > 0 {
                        let approx = Match::new(words_present.min(255) as u8, 0)
                            .score(APPROX_MATCH_COST, field_id);
                        primary.scores[primary.match_score_index] += approx as i64;
                    }
                }
            }

            debug_assert_eq!(primary.seq_id, seq_id);
            topster.add(primary);
        }

        Ok(())
    }

    /// Stage 6: curated inclusions get synthetic scores that force them
    /// to their caller-requested positions.
    fn collate_included_ids(&mut self, curated_topster: &mut Topster) {
        if self.args.included_ids.is_empty() {
            return;
        }

        // remember the exact tokens so curated hits highlight like
        // organic ones
        let mut override_tokens: Vec<String> = Vec::new();
        if let Some(field) = self.args.search_fields.first() {
            if let Some(art) = self.index.art(field) {
                for token in &self.args.include_tokens {
                    if art.search(token.as_bytes()).is_some() {
                        override_tokens.push(token.clone());
                    }
                }
            }
        }

        let query_index = self.searched_tokens.len() as u16;

        for (&position, &seq_id) in &self.args.included_ids {
            let match_score = 64_000i64 - position as i64;
            curated_topster.add(Kv {
                field_id: FIELD_LIMIT_NUM as u8,
                query_index,
                seq_id,
                distinct_id: position as u64,
                match_score_index: 0,
                scores: [match_score, 1, 1],
            });
        }

        self.searched_tokens.push(override_tokens);
    }
}

/// Typo budget for a token: tokens of length 1 or 2 cap at length - 1,
/// so very short tokens never fan out into nonsense.
pub fn bounded_typo_cost(max_cost: u32, token_len: usize) -> u32 {
    if token_len > 0 && max_cost >= token_len as u32 && (token_len == 1 || token_len == 2) {
        token_len as u32 - 1
    } else {
        max_cost
    }
}
