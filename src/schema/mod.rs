pub mod schema;

pub use schema::{FieldDefinition, FieldType, Schema};
