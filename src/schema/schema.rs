use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Int32,
    Int64,
    Float,
    Bool,
    StringArray,
    Int32Array,
    Int64Array,
    FloatArray,
    BoolArray,
}

impl FieldType {
    pub fn is_string(&self) -> bool {
        matches!(self, FieldType::String | FieldType::StringArray)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            FieldType::Int32 | FieldType::Int64 | FieldType::Int32Array | FieldType::Int64Array
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, FieldType::Float | FieldType::FloatArray)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, FieldType::Bool | FieldType::BoolArray)
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            FieldType::StringArray
                | FieldType::Int32Array
                | FieldType::Int64Array
                | FieldType::FloatArray
                | FieldType::BoolArray
        )
    }

    /// Scalar fields are indexed in the numeric tree and are sort-eligible.
    pub fn is_numeric(&self) -> bool {
        !self.is_string()
    }

    pub fn is_single_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Int32 | FieldType::Int64 | FieldType::Float | FieldType::Bool
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub facet: bool,
    #[serde(default)]
    pub optional: bool,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        FieldDefinition {
            name: name.to_string(),
            field_type,
            facet: false,
            optional: false,
        }
    }

    pub fn faceted(mut self) -> Self {
        self.facet = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Alias under which a non-string faceted field is additionally indexed
    /// as a string, so its values participate in facet hashing.
    pub fn faceted_name(&self) -> String {
        format!("$facet_{}", self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<FieldDefinition>,
    pub default_sorting_field: String,
}

impl Schema {
    pub fn new(fields: Vec<FieldDefinition>, default_sorting_field: &str) -> Result<Self> {
        let schema = Schema {
            fields,
            default_sorting_field: default_sorting_field.to_string(),
        };

        let sort_field = schema.field(default_sorting_field).ok_or_else(|| {
            Error::invalid(format!(
                "Default sorting field `{}` is not declared in the schema.",
                default_sorting_field
            ))
        })?;

        if !sort_field.field_type.is_single_numeric() || sort_field.field_type.is_bool() {
            return Err(Error::invalid(format!(
                "Default sorting field `{}` must be a single valued numerical field.",
                default_sorting_field
            )));
        }

        if sort_field.optional {
            return Err(Error::invalid(format!(
                "Default sorting field `{}` cannot be an optional field.",
                default_sorting_field
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for field in &schema.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::invalid(format!(
                    "Field `{}` is declared more than once.",
                    field.name
                )));
            }
        }

        Ok(schema)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Facet fields in declaration order. Their position here is the
    /// facet ordinal used by the facet index.
    pub fn facet_fields(&self) -> Vec<&FieldDefinition> {
        self.fields.iter().filter(|f| f.facet).collect()
    }

    pub fn facet_ordinal(&self, name: &str) -> Option<usize> {
        self.facet_fields().iter().position(|f| f.name == name)
    }

    /// Fields whose values are mirrored into the sort index.
    pub fn sort_fields(&self) -> Vec<&FieldDefinition> {
        self.fields
            .iter()
            .filter(|f| f.field_type.is_single_numeric())
            .collect()
    }

    pub fn validate_sortable(&self, name: &str) -> Result<()> {
        let field = self
            .field(name)
            .ok_or_else(|| Error::not_found(format!("Could not find a field named `{}`.", name)))?;

        if !field.field_type.is_single_numeric() {
            return Err(Error::invalid(format!(
                "Field `{}` is not a sortable numerical field.",
                name
            )));
        }

        if field.optional {
            return Err(Error::new(
                ErrorKind::Capacity,
                format!("Cannot sort by `{}`: it is an optional field.", name),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn books_schema() -> Schema {
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
    fn default_sorting_field_must_exist() {
        let err = Schema::new(
            vec![FieldDefinition::new("title", FieldType::String)],
            "points",
        )
        .unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn default_sorting_field_must_be_numeric() {
        let err = Schema::new(
            vec![FieldDefinition::new("title", FieldType::String)],
            "title",
        )
        .unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn facet_ordinals_follow_declaration_order() {
        let schema = books_schema();
        assert_eq!(schema.facet_ordinal("tags"), Some(0));
        assert_eq!(schema.facet_ordinal("title"), None);
    }

    #[test]
    fn optional_fields_are_not_sortable() {
        let schema = Schema::new(
            vec![
                FieldDefinition::new("title", FieldType::String),
                FieldDefinition::new("points", FieldType::Int32),
                FieldDefinition::new("weight", FieldType::Float).optional(),
            ],
            "points",
        )
        .unwrap();

        assert!(schema.validate_sortable("points").is_ok());
        assert_eq!(schema.validate_sortable("weight").unwrap_err().code(), 422);
        assert_eq!(schema.validate_sortable("missing").unwrap_err().code(), 404);
    }
}
