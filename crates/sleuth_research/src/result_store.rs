//! Evidence and round bookkeeping for one question
//!
//! `EvidenceSet` only grows. Pages fetched in an early round stay available
//! to the synthesizer even if a later verdict found them unhelpful.

use sleuth_common::text::{collapse_whitespace, truncate_chars};
use sleuth_common::{PageContent, RefinementHint, RoundRecord, SearchQuery};

/// Characters of each page shown to the planner in the evidence summary
const SUMMARY_CHARS_PER_PAGE: usize = 160;

/// Append-only sequence of fetched page text, oldest first
#[derive(Debug, Clone, Default)]
pub struct EvidenceSet {
    pages: Vec<PageContent>,
}

impl EvidenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page. Empty pages (failed fetches) are not evidence and are
    /// skipped; returns whether the page was kept.
    pub fn append(&mut self, page: PageContent) -> bool {
        if page.is_empty() {
            return false;
        }
        self.pages.push(page);
        true
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[PageContent] {
        &self.pages
    }

    /// Source URLs in fetch order, one per page
    pub fn urls(&self) -> Vec<String> {
        self.pages.iter().map(|p| p.url.clone()).collect()
    }

    /// One line per page, for the planner
    pub fn summary(&self) -> String {
        if self.pages.is_empty() {
            return "none yet".to_string();
        }
        self.pages
            .iter()
            .map(|p| {
                let text = collapse_whitespace(&p.text);
                let head = truncate_chars(&text, SUMMARY_CHARS_PER_PAGE);
                let ellipsis = if head.len() < text.len() { "..." } else { "" };
                format!("- {}: {}{}", p.url, head, ellipsis)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Evidence text for a model prompt, at most `budget_chars` of page text.
    ///
    /// Newest pages go in first, so older pages are the ones cut when the
    /// budget runs out. Each block keeps its 1-based source number from the
    /// fetch order so answers can cite `[n]` against `urls()`.
    pub fn context_window(&self, budget_chars: usize) -> String {
        let mut remaining = budget_chars;
        let mut blocks = Vec::new();

        for (index, page) in self.pages.iter().enumerate().rev() {
            if remaining == 0 {
                break;
            }
            let text = truncate_chars(page.text.trim(), remaining);
            remaining = remaining.saturating_sub(text.chars().count());
            blocks.push(format!("Source [{}] {}\n{}", index + 1, page.url, text));
        }

        blocks.join("\n\n")
    }
}

/// Everything gathered for the current question
#[derive(Debug, Default)]
pub struct ResultStore {
    evidence: EvidenceSet,
    rounds: Vec<RoundRecord>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evidence(&self) -> &EvidenceSet {
        &self.evidence
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    /// Add a round's pages to the evidence; returns how many were kept
    pub fn add_pages(&mut self, pages: &[PageContent]) -> usize {
        let mut kept = 0;
        for page in pages {
            if self.evidence.append(page.clone()) {
                kept += 1;
            }
        }
        kept
    }

    /// File a finished round
    pub fn push_round(&mut self, record: RoundRecord) {
        self.rounds.push(record);
    }

    /// Queries issued so far, oldest first
    pub fn issued_queries(&self) -> Vec<SearchQuery> {
        self.rounds.iter().map(|r| r.query.clone()).collect()
    }

    /// Hint attached to the most recent round's verdict
    pub fn latest_hint(&self) -> Option<&RefinementHint> {
        self.rounds.last().and_then(|r| r.verdict.hint())
    }

    pub fn into_parts(self) -> (EvidenceSet, Vec<RoundRecord>) {
        (self.evidence, self.rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_common::{TimeWindow, Verdict};

    #[test]
    fn test_append_skips_empty_pages() {
        let mut evidence = EvidenceSet::new();
        assert!(evidence.append(PageContent::new("https://a.example", "alpha")));
        assert!(!evidence.append(PageContent::empty("https://b.example")));
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence.urls(), vec!["https://a.example"]);
    }

    #[test]
    fn test_context_window_keeps_newest_first() {
        let mut evidence = EvidenceSet::new();
        evidence.append(PageContent::new("https://old.example", "o".repeat(50)));
        evidence.append(PageContent::new("https://new.example", "n".repeat(50)));

        let window = evidence.context_window(60);
        let newest = window.find("new.example").unwrap();
        let oldest = window.find("old.example").unwrap();
        assert!(newest < oldest);
        assert!(window.contains("Source [2] https://new.example"));
        // Old page cut to the ten characters left in the budget
        assert!(window.ends_with(&"o".repeat(10)));
        assert!(!window.contains(&"o".repeat(11)));
    }

    #[test]
    fn test_context_window_drops_pages_past_budget() {
        let mut evidence = EvidenceSet::new();
        evidence.append(PageContent::new("https://old.example", "old text"));
        evidence.append(PageContent::new("https://new.example", "x".repeat(100)));
        let window = evidence.context_window(100);
        assert!(!window.contains("old.example"));
    }

    #[test]
    fn test_summary() {
        let mut evidence = EvidenceSet::new();
        assert_eq!(evidence.summary(), "none yet");
        evidence.append(PageContent::new("https://a.example", "word ".repeat(100)));
        let summary = evidence.summary();
        assert!(summary.starts_with("- https://a.example: word"));
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_store_tracks_queries_and_hint() {
        let mut store = ResultStore::new();
        assert!(store.latest_hint().is_none());

        let mut record = RoundRecord::new(1, SearchQuery::new("first", TimeWindow::Any), String::new());
        record.verdict = Verdict::insufficient("missing the date", "add the year");
        store.push_round(record);

        assert_eq!(store.issued_queries().len(), 1);
        assert_eq!(store.latest_hint().map(|h| h.nudge.as_str()), Some("add the year"));

        let kept = store.add_pages(&[
            PageContent::new("https://a.example", "alpha"),
            PageContent::empty("https://b.example"),
        ]);
        assert_eq!(kept, 1);
        assert_eq!(store.evidence().len(), 1);
    }
}
