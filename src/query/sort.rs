use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::schema::Schema;

/// Synthetic sort field denoting the packed text-match score.
pub const TEXT_MATCH: &str = "_text_match";

/// At most this many sort criteria may be combined.
pub const MAX_SORT_FIELDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    pub name: String,
    pub ascending: bool,
}

/// Parse `field:ASC|DESC` specs. An empty list falls back to
/// `_text_match` then the default sorting field, both descending.
pub fn parse_sorts(sort_by: &[String], schema: &Schema) -> Result<Vec<SortBy>> {
    if sort_by.len() > MAX_SORT_FIELDS {
        return Err(Error::new(
            ErrorKind::Capacity,
            format!("Only up to {} sort fields are allowed.", MAX_SORT_FIELDS),
        ));
    }

    let mut sorts = Vec::new();

    for spec in sort_by {
        let (name, order) = match spec.rsplit_once(':') {
            Some((name, order)) => (name.trim(), order.trim()),
            None => (spec.trim(), "DESC"),
        };

        let ascending = match order.to_ascii_uppercase().as_str() {
            "ASC" => true,
            "DESC" => false,
            _ => {
                return Err(Error::invalid(format!(
                    "Order of sorting field `{}` must be either ASC or DESC.",
                    name
                )))
            }
        };

        if name != TEXT_MATCH {
            schema.validate_sortable(name)?;
        }

        sorts.push(SortBy {
            name: name.to_string(),
            ascending,
        });
    }

    if sorts.is_empty() {
        sorts.push(SortBy {
            name: TEXT_MATCH.to_string(),
            ascending: false,
        });
        sorts.push(SortBy {
            name: schema.default_sorting_field.clone(),
            ascending: false,
        });
    }

    Ok(sorts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema::{FieldDefinition, FieldType};

    fn schema() -> Schema {
        Schema::new(
            vec![
                FieldDefinition::new("title", FieldType::String),
                FieldDefinition::new("points", FieldType::Int32),
                FieldDefinition::new("weight", FieldType::Float).optional(),
            ],
            "points",
        )
        .unwrap()
    }

    #[test]
    fn parses_order_suffix() {
        let sorts = parse_sorts(&["points:ASC".to_string()], &schema()).unwrap();
        assert_eq!(sorts[0].name, "points");
        assert!(sorts[0].ascending);
    }

    #[test]
    fn empty_spec_defaults_to_text_match_then_points() {
        let sorts = parse_sorts(&[], &schema()).unwrap();
        assert_eq!(sorts[0].name, TEXT_MATCH);
        assert_eq!(sorts[1].name, "points");
        assert!(!sorts[0].ascending);
    }

    #[test]
    fn rejects_optional_sort_field() {
        let err = parse_sorts(&["weight:DESC".to_string()], &schema()).unwrap_err();
        assert_eq!(err.code(), 422);
    }

    #[test]
    fn rejects_more_than_three_sorts() {
        let specs: Vec<String> = (0..4).map(|_| "points:DESC".to_string()).collect();
        let err = parse_sorts(&specs, &schema()).unwrap_err();
        assert_eq!(err.code(), 422);
    }

    #[test]
    fn rejects_bad_order_word() {
        let err = parse_sorts(&["points:UP".to_string()], &schema()).unwrap_err();
        assert_eq!(err.code(), 400);
    }
}
