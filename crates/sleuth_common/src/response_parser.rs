//! Strict parsing of free-text model output
//!
//! Prompts ask the model for labelled lines (`Query: ...`, `Decision: ...`).
//! This module only finds those sections; deciding what a section means, and
//! failing closed when it means nothing, is the caller's job.

use regex::Regex;

/// Labelled sections found in a model response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    values: Vec<(String, String)>,
}

impl Sections {
    /// Value of the first occurrence of `label` (case-insensitive)
    pub fn get(&self, label: &str) -> Option<&str> {
        let key = canonical(label);
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

fn canonical(label: &str) -> String {
    label
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split `text` into sections headed by any of `labels`.
///
/// A label must start a line (leading markdown such as `**`, `-`, `#` is
/// tolerated) and be followed by a colon. A section runs until the next
/// label or the end of the text. Repeated labels keep every occurrence but
/// `Sections::get` returns the first, so a model that rambles on into a
/// second answer does not override its first one.
pub fn parse_sections(text: &str, labels: &[&str]) -> Sections {
    if labels.is_empty() {
        return Sections::default();
    }

    let mut sorted: Vec<&str> = labels.to_vec();
    sorted.sort_by_key(|l| std::cmp::Reverse(l.len()));
    let alternatives = sorted
        .iter()
        .map(|l| {
            canonical(l)
                .split(' ')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"[\s_]+")
        })
        .collect::<Vec<_>>()
        .join("|");

    let pattern = format!(r"(?im)^[\s>*#_\-]*({})[\s*_]*:[\s*_]*", alternatives);
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return Sections::default(),
    };

    let heads: Vec<(usize, usize, String)> = re
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?;
            Some((whole.start(), whole.end(), canonical(label.as_str())))
        })
        .collect();

    let mut values = Vec::with_capacity(heads.len());
    for (i, (_, body_start, label)) in heads.iter().enumerate() {
        let body_end = heads.get(i + 1).map(|h| h.0).unwrap_or(text.len());
        let body = text[*body_start..body_end]
            .trim()
            .trim_matches('*')
            .trim()
            .to_string();
        values.push((label.clone(), body));
    }

    Sections { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLANNER_LABELS: &[&str] = &["Reasoning", "Query", "Time Range"];

    #[test]
    fn test_parse_planner_sections() {
        let text = "Reasoning: The user wants a date.\nIt is historical.\nQuery: berlin wall fall year\nTime Range: none";
        let sections = parse_sections(text, PLANNER_LABELS);

        assert_eq!(
            sections.get("reasoning"),
            Some("The user wants a date.\nIt is historical.")
        );
        assert_eq!(sections.get("Query"), Some("berlin wall fall year"));
        assert_eq!(sections.get("time range"), Some("none"));
    }

    #[test]
    fn test_parse_markdown_labels() {
        let text = "**Query:** rust 1.80 release\n- **Time_Range**: y";
        let sections = parse_sections(text, PLANNER_LABELS);
        assert_eq!(sections.get("query"), Some("rust 1.80 release"));
        assert_eq!(sections.get("time range"), Some("y"));
        assert_eq!(sections.get("reasoning"), None);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let text = "Decision: SUFFICIENT\nUser: next question\nDecision: INSUFFICIENT";
        let sections = parse_sections(text, &["Decision"]);
        assert_eq!(sections.len(), 2);
        assert!(sections.get("decision").unwrap().starts_with("SUFFICIENT"));
    }

    #[test]
    fn test_label_must_start_line() {
        let text = "I think the query: is fine";
        let sections = parse_sections(text, &["Query"]);
        assert!(sections.is_empty());
    }
}
