//! Data model for a single research turn.
//!
//! Nothing here outlives one user question: the question, the queries issued
//! for it, the results, fetched pages and verdicts are all dropped once the
//! answer is rendered.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ResearchError;

/// The user's original question. Immutable for the whole turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question(String);

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse recency filter applied to a search query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeWindow {
    PastDay,
    PastWeek,
    PastMonth,
    PastYear,
    #[default]
    Any,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 5] = [
        TimeWindow::PastDay,
        TimeWindow::PastWeek,
        TimeWindow::PastMonth,
        TimeWindow::PastYear,
        TimeWindow::Any,
    ];

    /// Parse a model-produced time range. Unknown values mean no filter.
    pub fn parse(raw: &str) -> Self {
        let cleaned: String = raw
            .trim()
            .trim_matches(|c: char| c == '\'' || c == '"' || c == '[' || c == ']' || c == '.')
            .to_lowercase();
        let token = cleaned.trim();

        match token {
            "d" | "day" | "past day" | "today" | "24h" | "past_day" => TimeWindow::PastDay,
            "w" | "week" | "past week" | "past_week" => TimeWindow::PastWeek,
            "m" | "month" | "past month" | "past_month" => TimeWindow::PastMonth,
            "y" | "year" | "past year" | "past_year" => TimeWindow::PastYear,
            "none" | "any" | "all" | "all time" | "" => TimeWindow::Any,
            other => {
                // Free-form answers like "the past week, since it's news"
                if other.contains("day") || other.contains("24 hours") {
                    TimeWindow::PastDay
                } else if other.contains("week") {
                    TimeWindow::PastWeek
                } else if other.contains("month") {
                    TimeWindow::PastMonth
                } else if other.contains("year") {
                    TimeWindow::PastYear
                } else {
                    TimeWindow::Any
                }
            }
        }
    }

    /// Token used in prompts and by the search provider (`df=` parameter)
    pub fn token(&self) -> &'static str {
        match self {
            TimeWindow::PastDay => "d",
            TimeWindow::PastWeek => "w",
            TimeWindow::PastMonth => "m",
            TimeWindow::PastYear => "y",
            TimeWindow::Any => "none",
        }
    }

    /// Provider filter value, `None` when no filter applies
    pub fn provider_code(&self) -> Option<&'static str> {
        match self {
            TimeWindow::Any => None,
            other => Some(other.token()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeWindow::PastDay => "past day",
            TimeWindow::PastWeek => "past week",
            TimeWindow::PastMonth => "past month",
            TimeWindow::PastYear => "past year",
            TimeWindow::Any => "any time",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One search request: query text plus time window
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub window: TimeWindow,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            text: text.into(),
            window,
        }
    }

    /// Same words (case-insensitive, whitespace-normalised) and same window
    pub fn is_repeat_of(&self, other: &SearchQuery) -> bool {
        self.window == other.window && normalise(&self.text) == normalise(&other.text)
    }
}

fn normalise(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({})", self.text, self.window)
    }
}

/// A ranked search result summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Extracted readable text of a fetched page. Empty when the fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub text: String,
}

impl PageContent {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
        }
    }

    pub fn empty(url: impl Into<String>) -> Self {
        Self::new(url, String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Why evidence is insufficient and how the next query should change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementHint {
    pub reasoning: String,
    pub nudge: String,
}

/// Sufficiency classification of the accumulated evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Sufficient,
    Insufficient { hint: Option<RefinementHint> },
}

impl Verdict {
    pub fn insufficient(reasoning: impl Into<String>, nudge: impl Into<String>) -> Self {
        Verdict::Insufficient {
            hint: Some(RefinementHint {
                reasoning: reasoning.into(),
                nudge: nudge.into(),
            }),
        }
    }

    pub fn is_sufficient(&self) -> bool {
        matches!(self, Verdict::Sufficient)
    }

    pub fn hint(&self) -> Option<&RefinementHint> {
        match self {
            Verdict::Insufficient { hint } => hint.as_ref(),
            Verdict::Sufficient => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Sufficient => f.write_str("SUFFICIENT"),
            Verdict::Insufficient { .. } => f.write_str("INSUFFICIENT"),
        }
    }
}

/// Everything that happened in one round, kept for the refinement decision
/// and for showing the user what was searched.
#[derive(Debug, Clone)]
pub struct RoundRecord {
    /// 1-based
    pub round_index: usize,
    pub query: SearchQuery,
    pub planner_reasoning: String,
    pub results: Vec<SearchResult>,
    pub selected: Vec<SearchResult>,
    /// One entry per selected result, empty on fetch failure
    pub pages: Vec<PageContent>,
    pub verdict: Verdict,
    /// Absorbed failures for this round
    pub failures: Vec<ResearchError>,
}

impl RoundRecord {
    pub fn new(round_index: usize, query: SearchQuery, planner_reasoning: String) -> Self {
        Self {
            round_index,
            query,
            planner_reasoning,
            results: Vec::new(),
            selected: Vec::new(),
            pages: Vec::new(),
            verdict: Verdict::Insufficient { hint: None },
            failures: Vec::new(),
        }
    }

    /// Pages that yielded text this round
    pub fn fetched_count(&self) -> usize {
        self.pages.iter().filter(|p| !p.is_empty()).count()
    }
}
