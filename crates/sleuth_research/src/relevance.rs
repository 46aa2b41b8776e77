//! Relevance selection: which results are worth fetching in full.
//!
//! The model names results by number (or, occasionally, by URL). Every pick
//! is checked against the candidate list; anything not in it is dropped and
//! never fetched.

use sleuth_common::response_parser::parse_sections;
use sleuth_common::{Question, ResearchError, SearchResult};
use tracing::{info, warn};

use crate::model_step::{ModelStep, SHORT_REPLY_TOKENS};
use crate::prompts::build_selector_prompt;

/// Most results fetched per round
pub const MAX_SELECTED: usize = 2;

/// Validated picks for one round
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// In the model's order, unique by URL, at most `MAX_SELECTED`
    pub selected: Vec<SearchResult>,
    /// Picks that named nothing in the candidate list
    pub discarded: Vec<String>,
    pub failure: Option<ResearchError>,
}

pub struct RelevanceSelector {
    model: ModelStep,
}

impl RelevanceSelector {
    pub fn new(model: ModelStep) -> Self {
        Self { model }
    }

    pub async fn select(&self, question: &Question, candidates: &[SearchResult]) -> Selection {
        if candidates.is_empty() {
            return Selection::default();
        }

        let prompt = build_selector_prompt(question, candidates, MAX_SELECTED);
        let response = match self.model.run("select", &prompt, SHORT_REPLY_TOKENS).await {
            Ok(response) => response,
            Err(e) => {
                return Selection {
                    failure: Some(e),
                    ..Selection::default()
                }
            }
        };

        let selection = parse_selection(&response, candidates);
        if !selection.discarded.is_empty() {
            warn!(
                "Discarded selections not among the results: {:?}",
                selection.discarded
            );
        }
        info!(
            "Selected {} of {} results",
            selection.selected.len(),
            candidates.len()
        );
        selection
    }
}

/// Map the `Selected:` line onto `candidates`.
///
/// Accepts result numbers (`1, 3`, `#2`, `[1]`) and exact URLs. Numbers out
/// of range and unknown URLs are discarded. A reply without a `Selected:`
/// line selects nothing.
pub fn parse_selection(response: &str, candidates: &[SearchResult]) -> Selection {
    let sections = parse_sections(response, &["Reasoning", "Selected"]);
    let Some(line) = sections.get("selected").and_then(|s| s.lines().next()) else {
        return Selection::default();
    };

    let mut selection = Selection::default();

    for token in line.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        let token = token.trim_matches(|c: char| {
            matches!(c, '[' | ']' | '(' | ')' | '#' | '.' | '*' | '"' | '\'' | '<' | '>')
        });
        if token.is_empty() {
            continue;
        }

        let pick = if token.starts_with("http://") || token.starts_with("https://") {
            candidates.iter().find(|c| same_url(&c.url, token))
        } else if let Ok(number) = token.parse::<usize>() {
            number.checked_sub(1).and_then(|i| candidates.get(i))
        } else {
            // Words such as "Result" or "and"
            continue;
        };

        match pick {
            Some(result) => {
                if selection.selected.len() < MAX_SELECTED
                    && !selection.selected.iter().any(|s| s.url == result.url)
                {
                    selection.selected.push(result.clone());
                }
            }
            None => selection.discarded.push(token.to_string()),
        }
    }

    selection
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_common::llm_client::FakeLlmClient;
    use sleuth_common::web_search::results_from;
    use std::sync::Arc;
    use std::time::Duration;

    fn candidates() -> Vec<SearchResult> {
        results_from(&[
            ("A", "https://a.example/page", "a"),
            ("B", "https://b.example/", "b"),
            ("C", "https://c.example/x", "c"),
        ])
    }

    fn urls(selection: &Selection) -> Vec<&str> {
        selection.selected.iter().map(|s| s.url.as_str()).collect()
    }

    #[test]
    fn test_numbers_in_model_order() {
        let selection = parse_selection("Reasoning: r\nSelected: 3, 1", &candidates());
        assert_eq!(urls(&selection), vec!["https://c.example/x", "https://a.example/page"]);
        assert!(selection.discarded.is_empty());
    }

    #[test]
    fn test_out_of_range_numbers_discarded() {
        let selection = parse_selection("Selected: 7, 0, [2]", &candidates());
        assert_eq!(urls(&selection), vec!["https://b.example/"]);
        assert_eq!(selection.discarded, vec!["7", "0"]);
    }

    #[test]
    fn test_hallucinated_url_discarded() {
        let selection = parse_selection(
            "Selected: https://evil.example/x, https://b.example",
            &candidates(),
        );
        assert_eq!(urls(&selection), vec!["https://b.example/"]);
        assert_eq!(selection.discarded, vec!["https://evil.example/x"]);
    }

    #[test]
    fn test_capped_and_deduplicated() {
        let selection = parse_selection("Selected: Result 1, result 1, 2, 3", &candidates());
        assert_eq!(urls(&selection), vec!["https://a.example/page", "https://b.example/"]);
    }

    #[test]
    fn test_none_and_missing_line_select_nothing() {
        assert!(parse_selection("Selected: none", &candidates()).selected.is_empty());
        assert!(parse_selection("I would read 1 and 2", &candidates()).selected.is_empty());
    }

    #[tokio::test]
    async fn test_select_with_model() {
        let llm = Arc::new(FakeLlmClient::always("Reasoning: best match\nSelected: 2"));
        let selector = RelevanceSelector::new(ModelStep::new(llm, Duration::from_secs(5)));
        let selection = selector.select(&Question::new("q"), &candidates()).await;
        assert_eq!(urls(&selection), vec!["https://b.example/"]);
    }

    #[tokio::test]
    async fn test_model_failure_selects_nothing() {
        let llm = Arc::new(FakeLlmClient::always_error(sleuth_common::LlmError::EmptyResponse));
        let selector = RelevanceSelector::new(ModelStep::new(llm, Duration::from_secs(5)));
        let selection = selector.select(&Question::new("q"), &candidates()).await;
        assert!(selection.selected.is_empty());
        assert!(selection.failure.is_some());
    }
}
