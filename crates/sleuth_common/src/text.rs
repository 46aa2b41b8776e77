//! Small text helpers shared by the collaborators and the loop

/// Longest query sent to the search provider
pub const MAX_QUERY_CHARS: usize = 100;

/// Collapse every whitespace run into a single space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Normalise a model-produced search query: no quotes, one line,
/// single spaces, bounded length.
pub fn clean_query(raw: &str) -> String {
    let unquoted = raw.replace('"', "").replace(['\n', '\r'], " ");
    let collapsed = collapse_whitespace(&unquoted);
    truncate_chars(&collapsed, MAX_QUERY_CHARS).trim().to_string()
}

/// First `n` sentences of a snippet, with an ellipsis when more follow
pub fn first_sentences(text: &str, n: usize) -> String {
    let sentences: Vec<&str> = text.split('.').collect();
    if sentences.len() <= n {
        return text.trim().to_string();
    }
    format!("{}...", sentences[..n].join(".").trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_query() {
        assert_eq!(
            clean_query("  \"rust   tokio\"\nrelease notes "),
            "rust tokio release notes"
        );
        let long = "word ".repeat(50);
        assert!(clean_query(&long).chars().count() <= MAX_QUERY_CHARS);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("short", 50), "short");
    }

    #[test]
    fn test_first_sentences() {
        assert_eq!(first_sentences("One. Two", 3), "One. Two");
        assert_eq!(first_sentences("A. B. C. D. E.", 3), "A. B. C...");
    }
}
