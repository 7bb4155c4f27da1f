//! End-to-end search behavior through the collection manager, on the
//! catalog-style schema {title: string, points: int32, tags: string[]}.

use serde_json::json;
use tempfile::TempDir;

use strix::core::types::WriteMode;
use strix::schema::schema::{FieldDefinition, FieldType};
use strix::{CollectionManager, Config, SearchParams};

fn manager(dir: &TempDir) -> CollectionManager {
    let config = Config {
        data_path: dir.path().to_path_buf(),
        ..Config::default()
    };
    let manager = CollectionManager::new(config).unwrap();
    manager.load().unwrap();
    manager
}

fn books(manager: &CollectionManager) -> std::sync::Arc<strix::Collection> {
    manager
        .create_collection(
            "books",
            vec![
                FieldDefinition::new("title", FieldType::String),
                FieldDefinition::new("points", FieldType::Int32),
                FieldDefinition::new("tags", FieldType::StringArray).faceted(),
            ],
            "points",
        )
        .unwrap()
}

fn seed(coll: &strix::Collection) {
    coll.add(
        json!({"id": "1", "title": "The quick brown fox", "points": 10, "tags": ["a", "b"]}),
        WriteMode::Create,
    )
    .unwrap();
    coll.add(
        json!({"id": "2", "title": "State Trooper", "points": 5, "tags": ["c"]}),
        WriteMode::Create,
    )
    .unwrap();
    coll.add(
        json!({"id": "3", "title": "Down There by the Train", "points": 7, "tags": ["c"]}),
        WriteMode::Create,
    )
    .unwrap();
}

fn hit_ids(results: &strix::SearchResults) -> Vec<String> {
    results
        .hits
        .iter()
        .map(|h| h.document["id"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn typo_search_finds_and_highlights() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let params = SearchParams {
        num_typos: 1,
        ..SearchParams::new("quik", &["title"])
    };
    let results = coll.search(params).unwrap();

    assert_eq!(results.found, 1);
    assert_eq!(hit_ids(&results), vec!["1"]);
    assert_eq!(
        results.hits[0].highlights[0].snippet,
        "The <mark>quick</mark> brown fox"
    );
    assert_eq!(
        results.hits[0].highlights[0].matched_tokens,
        vec!["quick".to_string()]
    );
}

#[test]
fn dropped_tokens_rank_earlier_matches_first() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let results = coll
        .search(SearchParams::new("trooper train", &["title"]))
        .unwrap();

    assert_eq!(results.found, 2);
    assert_eq!(hit_ids(&results), vec!["2", "3"]);
}

#[test]
fn wildcard_with_filter_and_sort() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let params = SearchParams::new("*", &["title"])
        .with_filter("points:>=7")
        .with_sort(&["points:DESC"]);
    let results = coll.search(params).unwrap();

    assert_eq!(hit_ids(&results), vec!["1", "3"]);
}

#[test]
fn exclusion_only_query_behaves_as_carved_wildcard() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let results = coll
        .search(SearchParams::new("-trooper", &["title"]))
        .unwrap();

    assert_eq!(hit_ids(&results), vec!["1", "3"]);
}

#[test]
fn update_changes_sort_order() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    coll.add(json!({"id": "1", "points": 100}), WriteMode::Update)
        .unwrap();

    let params = SearchParams::new("*", &["title"]).with_sort(&["points:DESC"]);
    let results = coll.search(params).unwrap();
    assert_eq!(hit_ids(&results)[0], "1");

    // the stored document is the merge of old and new
    let doc = coll.get("1").unwrap();
    assert_eq!(doc["points"], json!(100));
    assert_eq!(doc["title"], json!("The quick brown fox"));
}

#[test]
fn duplicate_create_conflicts() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let err = coll
        .add(
            json!({"id": "1", "title": "again", "points": 1, "tags": []}),
            WriteMode::Create,
        )
        .unwrap_err();
    assert_eq!(err.code(), 409);
}

#[test]
fn add_then_remove_leaves_no_trace() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    coll.remove("2").unwrap();
    assert_eq!(coll.get("2").unwrap_err().code(), 404);

    let results = coll
        .search(SearchParams::new("trooper", &["title"]))
        .unwrap();
    assert_eq!(results.found, 0);
    assert_eq!(coll.num_documents(), 2);
}

#[test]
fn upsert_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);

    let doc = json!({"id": "9", "title": "repeat me", "points": 4, "tags": ["z"]});
    coll.add(doc.clone(), WriteMode::Upsert).unwrap();
    coll.add(doc.clone(), WriteMode::Upsert).unwrap();

    assert_eq!(coll.num_documents(), 1);
    let results = coll.search(SearchParams::new("repeat", &["title"])).unwrap();
    assert_eq!(results.found, 1);
    assert_eq!(hit_ids(&results), vec!["9"]);
}

#[test]
fn single_character_token_never_expands() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);

    coll.add(
        json!({"id": "x", "title": "x marks the spot", "points": 1, "tags": []}),
        WriteMode::Create,
    )
    .unwrap();
    coll.add(
        json!({"id": "y", "title": "y not here", "points": 2, "tags": []}),
        WriteMode::Create,
    )
    .unwrap();

    let params = SearchParams {
        num_typos: 2,
        ..SearchParams::new("x", &["title"])
    };
    let results = coll.search(params).unwrap();
    assert_eq!(hit_ids(&results), vec!["x"]);
}

#[test]
fn per_page_ceiling_is_enforced() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let params = SearchParams {
        per_page: 251,
        ..SearchParams::new("*", &["title"])
    };
    assert_eq!(coll.search(params).unwrap_err().code(), 422);

    let params = SearchParams {
        page: 0,
        ..SearchParams::new("*", &["title"])
    };
    assert_eq!(coll.search(params).unwrap_err().code(), 400);
}

#[test]
fn unknown_and_non_string_query_fields_fail() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let err = coll
        .search(SearchParams::new("quick", &["missing"]))
        .unwrap_err();
    assert_eq!(err.code(), 404);

    let err = coll
        .search(SearchParams::new("quick", &["points"]))
        .unwrap_err();
    assert_eq!(err.code(), 400);

    let err = coll
        .search(SearchParams::new("quick", &["title"]).with_filter("missing:5"))
        .unwrap_err();
    assert_eq!(err.code(), 404);
}

#[test]
fn wildcard_without_filter_returns_all_in_sort_order() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let results = coll
        .search(SearchParams::new("*", &["title"]).with_sort(&["points:DESC"]))
        .unwrap();
    assert_eq!(results.found, 3);
    assert_eq!(hit_ids(&results), vec!["1", "3", "2"]);
}

#[test]
fn facet_counts_and_empty_facet_query() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let params = SearchParams::new("*", &["title"]).with_facets(&["tags"]);
    let results = coll.search(params).unwrap();

    assert_eq!(results.facet_counts.len(), 1);
    let tags = &results.facet_counts[0];
    assert_eq!(tags.field_name, "tags");

    // c appears twice, a and b once each; counts ordered descending
    assert_eq!(tags.counts[0].value, "c");
    assert_eq!(tags.counts[0].count, 2);
    let mut rest: Vec<(String, u64)> = tags.counts[1..]
        .iter()
        .map(|c| (c.value.clone(), c.count))
        .collect();
    rest.sort();
    assert_eq!(rest, vec![("a".to_string(), 1), ("b".to_string(), 1)]);
}

#[test]
fn facet_query_narrows_values() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let params = SearchParams {
        facet_query: "tags:c".to_string(),
        ..SearchParams::new("*", &["title"]).with_facets(&["tags"])
    };
    let results = coll.search(params).unwrap();

    let tags = &results.facet_counts[0];
    assert_eq!(tags.counts.len(), 1);
    assert_eq!(tags.counts[0].value, "c");
    assert_eq!(tags.counts[0].count, 2);
    assert_eq!(tags.counts[0].highlighted.as_deref(), Some("<mark>c</mark>"));
}

#[test]
fn string_exact_filter_uses_whole_value() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);

    coll.add(
        json!({"id": "a", "title": "t", "points": 1, "tags": ["science fiction"]}),
        WriteMode::Create,
    )
    .unwrap();
    coll.add(
        json!({"id": "b", "title": "t", "points": 2, "tags": ["science"]}),
        WriteMode::Create,
    )
    .unwrap();

    // containment matches both, exact match only the single-token value
    let results = coll
        .search(SearchParams::new("*", &["title"]).with_filter("tags:science"))
        .unwrap();
    assert_eq!(results.found, 2);

    let results = coll
        .search(SearchParams::new("*", &["title"]).with_filter("tags:=science"))
        .unwrap();
    assert_eq!(hit_ids(&results), vec!["b"]);
}

#[test]
fn pinned_and_hidden_hits() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let mut params = SearchParams::new("*", &["title"]).with_sort(&["points:DESC"]);
    params.pinned_hits.insert("2".to_string(), 1);
    params.hidden_hits.push("3".to_string());
    let results = coll.search(params).unwrap();

    // doc 2 is pinned to the top, doc 3 hidden, doc 1 follows organically
    assert_eq!(hit_ids(&results), vec!["2", "1"]);
}

#[test]
fn grouping_collapses_by_facet_value() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let mut params = SearchParams::new("*", &["title"]).with_sort(&["points:DESC"]);
    params.group_by = vec!["tags".to_string()];
    params.group_limit = 2;
    let results = coll.search(params).unwrap();

    assert!(results.hits.is_empty());
    assert_eq!(results.grouped_hits.len(), 2);

    // the c-group holds docs 3 and 2, best points first
    let c_group = results
        .grouped_hits
        .iter()
        .find(|g| g.group_key == vec![json!(["c"])])
        .unwrap();
    let ids: Vec<&str> = c_group
        .hits
        .iter()
        .map(|h| h.document["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["3", "2"]);
}

#[test]
fn prefix_search_matches_token_starts() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);
    seed(&coll);

    let params = SearchParams {
        prefix: true,
        ..SearchParams::new("troop", &["title"])
    };
    let results = coll.search(params).unwrap();
    assert_eq!(hit_ids(&results), vec!["2"]);
}

#[test]
fn synonyms_rank_below_original_tokens() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = books(&manager);

    coll.add(
        json!({"id": "s1", "title": "fast car", "points": 5, "tags": []}),
        WriteMode::Create,
    )
    .unwrap();
    coll.add(
        json!({"id": "s2", "title": "quick car", "points": 5, "tags": []}),
        WriteMode::Create,
    )
    .unwrap();

    let mut params = SearchParams::new("quick", &["title"]);
    params.synonyms = vec![vec!["fast".to_string()]];
    let results = coll.search(params).unwrap();

    assert_eq!(results.found, 2);
    assert_eq!(hit_ids(&results), vec!["s2", "s1"]);
}

#[test]
fn int_widens_to_float_field() {
    let dir = TempDir::new().unwrap();
    let manager = manager(&dir);
    let coll = manager
        .create_collection(
            "prices",
            vec![
                FieldDefinition::new("name", FieldType::String),
                FieldDefinition::new("price", FieldType::Float),
            ],
            "price",
        )
        .unwrap();

    coll.add(json!({"id": "1", "name": "widget", "price": 3}), WriteMode::Create)
        .unwrap();

    let results = coll
        .search(SearchParams::new("*", &["name"]).with_filter("price:>2.5"))
        .unwrap();
    assert_eq!(results.found, 1);
}
