use crate::analysis::Tokenizer;
use crate::search::results::Highlight;

/// Knobs for snippet construction, filled from the search params.
#[derive(Debug, Clone)]
pub struct HighlightOptions {
    pub start_tag: String,
    pub end_tag: String,
    /// Tokens kept on either side of the matched window in snippets.
    pub affix_num_tokens: usize,
    /// Fields whose full value is returned tagged instead of a snippet.
    pub full_fields: Vec<String>,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        HighlightOptions {
            start_tag: "<mark>".to_string(),
            end_tag: "</mark>".to_string(),
            affix_num_tokens: 4,
            full_fields: Vec::new(),
        }
    }
}

/// Wrap matched tokens of one field value. `searched_tokens` are the
/// index tokens the query actually matched (typo-corrected); the last
/// one may match by prefix when the query ran in prefix mode.
pub fn highlight_field(
    field_name: &str,
    text: &str,
    searched_tokens: &[String],
    prefix: bool,
    options: &HighlightOptions,
) -> Option<Highlight> {
    if searched_tokens.is_empty() {
        return None;
    }

    let tokenizer = Tokenizer::new();
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut matched_indices: Vec<usize> = Vec::new();
    let mut matched_tokens: Vec<String> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        // normalize the word the same way the index did
        let normalized = tokenizer
            .tokenize(word)
            .into_iter()
            .map(|t| t.text)
            .collect::<Vec<_>>()
            .join("");
        if normalized.is_empty() {
            continue;
        }

        let is_match = searched_tokens.iter().enumerate().any(|(ti, token)| {
            if prefix && ti == searched_tokens.len() - 1 {
                normalized.starts_with(token.as_str()) || token.starts_with(&normalized)
            } else {
                normalized == *token
            }
        });

        if is_match {
            matched_indices.push(i);
            if !matched_tokens.contains(&normalized) {
                matched_tokens.push(normalized);
            }
        }
    }

    if matched_indices.is_empty() {
        return None;
    }

    let full = options.full_fields.iter().any(|f| f == field_name);
    let (window_start, window_end) = if full {
        (0, words.len() - 1)
    } else {
        let first = *matched_indices.first().unwrap();
        let last = *matched_indices.last().unwrap();
        (
            first.saturating_sub(options.affix_num_tokens),
            (last + options.affix_num_tokens).min(words.len() - 1),
        )
    };

    let mut parts: Vec<String> = Vec::with_capacity(window_end - window_start + 1);
    for i in window_start..=window_end {
        if matched_indices.contains(&i) {
            parts.push(format!("{}{}{}", options.start_tag, words[i], options.end_tag));
        } else {
            parts.push(words[i].to_string());
        }
    }

    Some(Highlight {
        field: field_name.to_string(),
        snippet: parts.join(" "),
        matched_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> HighlightOptions {
        HighlightOptions::default()
    }

    #[test]
    fn wraps_matched_token() {
        let h = highlight_field(
            "title",
            "The quick brown fox",
            &["quick".to_string()],
            false,
            &opts(),
        )
        .unwrap();
        assert_eq!(h.snippet, "The <mark>quick</mark> brown fox");
        assert_eq!(h.matched_tokens, vec!["quick".to_string()]);
    }

    #[test]
    fn snippet_window_trims_long_fields() {
        let mut options = opts();
        options.affix_num_tokens = 1;
        let h = highlight_field(
            "title",
            "one two three four five six seven",
            &["four".to_string()],
            false,
            &options,
        )
        .unwrap();
        assert_eq!(h.snippet, "three <mark>four</mark> five");
    }

    #[test]
    fn full_field_keeps_every_token() {
        let mut options = opts();
        options.affix_num_tokens = 1;
        options.full_fields = vec!["title".to_string()];
        let h = highlight_field(
            "title",
            "one two three four five",
            &["two".to_string()],
            false,
            &options,
        )
        .unwrap();
        assert_eq!(h.snippet, "one <mark>two</mark> three four five");
    }

    #[test]
    fn prefix_mode_matches_word_starts() {
        let h = highlight_field(
            "title",
            "State Trooper",
            &["troop".to_string()],
            true,
            &opts(),
        )
        .unwrap();
        assert_eq!(h.snippet, "State <mark>Trooper</mark>");
    }

    #[test]
    fn no_match_returns_none() {
        assert!(highlight_field("title", "alpha beta", &["gamma".to_string()], false, &opts())
            .is_none());
    }
}
