use serde::Serialize;
use serde_json::Value;

use crate::core::types::Document;

/// One highlighted field of a hit.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Highlight {
    pub field: String,
    pub snippet: String,
    pub matched_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub document: Document,
    pub highlights: Vec<Highlight>,
    /// Packed text-match score, exposed for debugging and tie inspection.
    pub text_match: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupedHit {
    pub group_key: Vec<Value>,
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacetValue {
    pub value: String,
    pub count: u64,
    /// Present when a facet query refined this facet; the matching
    /// portion is wrapped in the highlight tags.
    pub highlighted: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacetStatsResult {
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub avg: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacetResult {
    pub field_name: String,
    pub counts: Vec<FacetValue>,
    pub stats: Option<FacetStatsResult>,
}

/// The search response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub found: usize,
    pub page: usize,
    pub hits: Vec<Hit>,
    pub grouped_hits: Vec<GroupedHit>,
    pub facet_counts: Vec<FacetResult>,
    pub took_ms: u64,
}

impl SearchResults {
    pub fn empty(page: usize) -> Self {
        SearchResults {
            found: 0,
            page,
            hits: Vec::new(),
            grouped_hits: Vec::new(),
            facet_counts: Vec::new(),
            took_ms: 0,
        }
    }
}

/// Collection summary returned by the management surface.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    pub num_documents: usize,
    pub fields: Vec<crate::schema::schema::FieldDefinition>,
    pub default_sorting_field: String,
}
