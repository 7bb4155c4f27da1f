use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::Token;
use crate::core::types::Document;
use crate::schema::schema::FieldType;

const MAX_TOKEN_LENGTH: usize = 255;

/// Locale-agnostic tokenizer: casefold to lower, fold diacritics to
/// ASCII, split on non-alphanumeric Unicode boundaries, emit tokens with
/// their 0-based positional index.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer;

impl Tokenizer {
    pub fn new() -> Self {
        Tokenizer
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let folded = fold(text);
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for word in folded.unicode_words() {
            if word.len() > MAX_TOKEN_LENGTH {
                continue;
            }
            tokens.push(Token::new(word.to_string(), position));
            position += 1;
        }

        tokens
    }

    pub fn tokenize_text(&self, text: &str) -> Vec<String> {
        self.tokenize(text).into_iter().map(|t| t.text).collect()
    }

    /// Canonical string form of one element of a field value, so that
    /// non-string facet values flow through the same token/hash scheme.
    pub fn canonicalize(value: &serde_json::Value, field_type: FieldType) -> String {
        match value {
            serde_json::Value::Bool(b) => {
                if *b {
                    "1".to_string()
                } else {
                    "0".to_string()
                }
            }
            serde_json::Value::Number(n) => {
                if field_type.is_float() {
                    format!("{}", n.as_f64().unwrap_or(0.0))
                } else {
                    format!("{}", n.as_i64().unwrap_or(0))
                }
            }
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Tokens of a document field, flattened across array elements.
    /// Used when removing a stored document from the index and when
    /// diffing old/new values on update. Non-string values are not
    /// split: their canonical form is the token.
    pub fn field_tokens(&self, document: &Document, name: &str, field_type: FieldType) -> Vec<String> {
        let mut out = Vec::new();
        let Some(value) = document.get(name) else {
            return out;
        };

        let mut push = |item: &serde_json::Value| {
            let text = Self::canonicalize(item, field_type);
            if field_type.is_string() {
                out.extend(self.tokenize_text(&text));
            } else {
                out.push(text);
            }
        };

        match value {
            serde_json::Value::Array(items) => {
                for item in items {
                    push(item);
                }
            }
            other => push(other),
        }

        out
    }
}

/// Lowercase and strip combining marks, folding e.g. "Crème" to "creme".
fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
