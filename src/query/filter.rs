use crate::core::error::{Error, Result};
use crate::index::num_tree::NumComparator;
use crate::schema::schema::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterComparator {
    /// `=`: numeric equality; token containment for strings.
    Equals,
    /// `:=`: exact string match enforced via value hashing.
    ExactEquals,
    NotEquals,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
}

impl FilterComparator {
    pub fn to_num(self) -> NumComparator {
        match self {
            FilterComparator::Equals | FilterComparator::ExactEquals => NumComparator::Equals,
            FilterComparator::NotEquals => NumComparator::NotEquals,
            FilterComparator::GreaterThan => NumComparator::GreaterThan,
            FilterComparator::GreaterThanEquals => NumComparator::GreaterThanEquals,
            FilterComparator::LessThan => NumComparator::LessThan,
            FilterComparator::LessThanEquals => NumComparator::LessThanEquals,
        }
    }
}

/// One `field:op value[,value...]` clause. Values inside a clause are
/// disjunctive; clauses compose conjunctively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field_name: String,
    pub comparator: FilterComparator,
    pub values: Vec<String>,
}

/// Parse a `filter_by` expression: clauses joined with `&&`.
pub fn parse_filters(filter_by: &str, schema: &Schema) -> Result<Vec<Filter>> {
    let mut filters = Vec::new();

    for raw_clause in filter_by.split("&&") {
        let clause = raw_clause.trim();
        if clause.is_empty() {
            continue;
        }

        let colon = clause.find(':').ok_or_else(|| {
            Error::invalid(format!("Could not parse the filter query: `{}`.", clause))
        })?;

        let field_name = clause[..colon].trim().to_string();
        let rest = clause[colon + 1..].trim();

        let field = schema.field(&field_name).ok_or_else(|| {
            Error::not_found(format!(
                "Could not find a filter field named `{}` in the schema.",
                field_name
            ))
        })?;

        let (comparator, value_str) = if let Some(v) = rest.strip_prefix(">=") {
            (FilterComparator::GreaterThanEquals, v)
        } else if let Some(v) = rest.strip_prefix("<=") {
            (FilterComparator::LessThanEquals, v)
        } else if let Some(v) = rest.strip_prefix('>') {
            (FilterComparator::GreaterThan, v)
        } else if let Some(v) = rest.strip_prefix("!=") {
            (FilterComparator::NotEquals, v)
        } else if let Some(v) = rest.strip_prefix('<') {
            (FilterComparator::LessThan, v)
        } else if let Some(v) = rest.strip_prefix('=') {
            if field.field_type.is_string() {
                (FilterComparator::ExactEquals, v)
            } else {
                (FilterComparator::Equals, v)
            }
        } else {
            (FilterComparator::Equals, rest)
        };

        if field.field_type.is_string()
            && matches!(
                comparator,
                FilterComparator::GreaterThan
                    | FilterComparator::GreaterThanEquals
                    | FilterComparator::LessThan
                    | FilterComparator::LessThanEquals
            )
        {
            return Err(Error::invalid(format!(
                "Field `{}` does not support range filtering.",
                field_name
            )));
        }

        let value_str = value_str.trim();
        let values: Vec<String> = if value_str.starts_with('[') && value_str.ends_with(']') {
            value_str[1..value_str.len() - 1]
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        } else {
            vec![value_str.to_string()]
        };

        if values.is_empty() || values.iter().any(|v| v.is_empty()) {
            return Err(Error::invalid(format!(
                "Filter on field `{}` has no value.",
                field_name
            )));
        }

        // numeric values must parse up front so bad input fails the
        // query instead of silently matching nothing
        if !field.field_type.is_string() {
            for value in &values {
                let numeric_ok = if field.field_type.is_bool() {
                    matches!(value.as_str(), "true" | "false" | "0" | "1")
                } else if field.field_type.is_float() {
                    value.parse::<f64>().is_ok()
                } else {
                    value.parse::<i64>().is_ok()
                };
                if !numeric_ok {
                    return Err(Error::invalid(format!(
                        "Error with field `{}`: Numerical field has an invalid comparator value.",
                        field_name
                    )));
                }
            }
        }

        filters.push(Filter {
            field_name,
            comparator,
            values,
        });
    }

    Ok(filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::schema::{FieldDefinition, FieldType};

    fn schema() -> Schema {
        Schema::new(
            vec![
                FieldDefinition::new("title", FieldType::String),
                FieldDefinition::new("tags", FieldType::StringArray).faceted(),
                FieldDefinition::new("points", FieldType::Int32),
            ],
            "points",
        )
        .unwrap()
    }

    #[test]
    fn parses_numeric_range_clause() {
        let filters = parse_filters("points:>=7", &schema()).unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].field_name, "points");
        assert_eq!(filters[0].comparator, FilterComparator::GreaterThanEquals);
        assert_eq!(filters[0].values, vec!["7"]);
    }

    #[test]
    fn parses_conjunction_and_value_lists() {
        let filters = parse_filters("points:>5 && tags:[red, blue]", &schema()).unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[1].values, vec!["red", "blue"]);
        assert_eq!(filters[1].comparator, FilterComparator::Equals);
    }

    #[test]
    fn exact_string_match_operator() {
        let filters = parse_filters("tags:= red", &schema()).unwrap();
        assert_eq!(filters[0].comparator, FilterComparator::ExactEquals);
        assert_eq!(filters[0].values, vec!["red"]);
    }

    #[test]
    fn unknown_field_is_not_found() {
        let err = parse_filters("missing:5", &schema()).unwrap_err();
        assert_eq!(err.code(), 404);
    }

    #[test]
    fn bad_numeric_value_is_rejected() {
        let err = parse_filters("points:>abc", &schema()).unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn string_fields_reject_range_operators() {
        let err = parse_filters("title:>x", &schema()).unwrap_err();
        assert_eq!(err.code(), 400);
    }
}
