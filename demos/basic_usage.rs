use serde_json::json;
use tempfile::TempDir;

use strix::core::types::WriteMode;
use strix::schema::schema::{FieldDefinition, FieldType};
use strix::{CollectionManager, Config, SearchParams};

fn main() -> strix::Result<()> {
    let dir = TempDir::new()?;
    let config = Config {
        data_path: dir.path().to_path_buf(),
        ..Config::default()
    };

    let manager = CollectionManager::new(config)?;
    manager.load()?;

    let books = manager.create_collection(
        "books",
        vec![
            FieldDefinition::new("title", FieldType::String),
            FieldDefinition::new("tags", FieldType::StringArray).faceted(),
            FieldDefinition::new("points", FieldType::Int32),
        ],
        "points",
    )?;

    books.add(
        json!({"id": "1", "title": "The quick brown fox", "points": 10, "tags": ["classic"]}),
        WriteMode::Create,
    )?;
    books.add(
        json!({"id": "2", "title": "State Trooper", "points": 5, "tags": ["song"]}),
        WriteMode::Create,
    )?;

    // typo-tolerant search: "quik" still finds "quick"
    let results = books.search(SearchParams::new("quik", &["title"]))?;
    for hit in &results.hits {
        println!(
            "{} -> {}",
            hit.document["id"],
            hit.highlights
                .first()
                .map(|h| h.snippet.as_str())
                .unwrap_or_default()
        );
    }

    let faceted = books.search(
        SearchParams::new("*", &["title"])
            .with_facets(&["tags"])
            .with_sort(&["points:DESC"]),
    )?;
    println!("found {} documents", faceted.found);
    for facet in &faceted.facet_counts {
        for value in &facet.counts {
            println!("  {}: {} ({})", facet.field_name, value.value, value.count);
        }
    }

    Ok(())
}
