use std::collections::BTreeMap;

/// Everything a search accepts. Field defaults mirror the engine's
/// behavior when the transport omits a knob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchParams {
    pub q: String,
    pub query_by: Vec<String>,
    pub filter_by: String,
    pub sort_by: Vec<String>,
    pub facet_by: Vec<String>,
    pub facet_query: String,
    pub max_facet_values: usize,

    pub num_typos: u32,
    pub prefix: bool,
    pub drop_tokens_threshold: usize,
    pub typo_tokens_threshold: usize,

    pub page: usize,
    pub per_page: usize,

    pub include_fields: Vec<String>,
    pub exclude_fields: Vec<String>,

    pub highlight_full_fields: Vec<String>,
    pub highlight_affix_num_tokens: usize,
    pub highlight_start_tag: String,
    pub highlight_end_tag: String,

    pub group_by: Vec<String>,
    pub group_limit: usize,

    /// Synonym token groups searched alongside the query tokens.
    pub synonyms: Vec<Vec<String>>,

    /// Curated inclusions: document id -> 1-based result position.
    pub pinned_hits: BTreeMap<String, usize>,
    /// Curated exclusions by document id.
    pub hidden_hits: Vec<String>,
}

impl SearchParams {
    pub fn new(q: &str, query_by: &[&str]) -> Self {
        SearchParams {
            q: q.to_string(),
            query_by: query_by.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter_by: &str) -> Self {
        self.filter_by = filter_by.to_string();
        self
    }

    pub fn with_sort(mut self, sort_by: &[&str]) -> Self {
        self.sort_by = sort_by.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_facets(mut self, facet_by: &[&str]) -> Self {
        self.facet_by = facet_by.iter().map(|s| s.to_string()).collect();
        self
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            q: String::new(),
            query_by: Vec::new(),
            filter_by: String::new(),
            sort_by: Vec::new(),
            facet_by: Vec::new(),
            facet_query: String::new(),
            max_facet_values: 10,
            num_typos: 2,
            prefix: false,
            drop_tokens_threshold: 10,
            typo_tokens_threshold: 100,
            page: 1,
            per_page: 10,
            include_fields: Vec::new(),
            exclude_fields: Vec::new(),
            highlight_full_fields: Vec::new(),
            highlight_affix_num_tokens: 4,
            highlight_start_tag: "<mark>".to_string(),
            highlight_end_tag: "</mark>".to_string(),
            group_by: Vec::new(),
            group_limit: 3,
            synonyms: Vec::new(),
            pinned_hits: BTreeMap::new(),
            hidden_hits: Vec::new(),
        }
    }
}
