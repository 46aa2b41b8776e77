//! Query planning: question (plus what earlier rounds learned) to one
//! search query and time window.
//!
//! A query that repeats an earlier one in the same turn is rejected once
//! and the model is asked again; a second repeat is accepted and recorded
//! as `NoProgress` since the round cap bounds the damage.

use sleuth_common::response_parser::parse_sections;
use sleuth_common::text::clean_query;
use sleuth_common::{Question, ResearchError, SearchQuery, TimeWindow};
use tracing::{info, warn};

use crate::model_step::{ModelStep, SHORT_REPLY_TOKENS};
use crate::prompts::{build_planner_prompt, PlannerContext};

const PLANNER_LABELS: &[&str] = &["Reasoning", "Query", "Time Range"];

/// Planner output for one round
#[derive(Debug, Clone)]
pub struct PlannedQuery {
    pub query: SearchQuery,
    pub reasoning: String,
    /// Absorbed failures (model errors, accepted repeats)
    pub failures: Vec<ResearchError>,
}

pub struct QueryPlanner {
    model: ModelStep,
}

impl QueryPlanner {
    pub fn new(model: ModelStep) -> Self {
        Self { model }
    }

    pub async fn plan(&self, question: &Question, context: &PlannerContext<'_>) -> PlannedQuery {
        let mut failures = Vec::new();

        let (query, reasoning) = self.attempt(question, context, None, &mut failures).await;
        let Some(earlier) = find_repeat(&query, context.prior_queries) else {
            return PlannedQuery {
                query,
                reasoning,
                failures,
            };
        };

        info!("Planner repeated {}, asking again", earlier);
        let (query, reasoning) = self
            .attempt(question, context, Some(&earlier), &mut failures)
            .await;

        if find_repeat(&query, context.prior_queries).is_some() {
            warn!("Planner repeated {} again, accepting it", query);
            failures.push(ResearchError::NoProgress(query.to_string()));
        }

        PlannedQuery {
            query,
            reasoning,
            failures,
        }
    }

    async fn attempt(
        &self,
        question: &Question,
        context: &PlannerContext<'_>,
        repeated: Option<&SearchQuery>,
        failures: &mut Vec<ResearchError>,
    ) -> (SearchQuery, String) {
        let prompt = build_planner_prompt(question, context, repeated);
        match self.model.run("plan", &prompt, SHORT_REPLY_TOKENS).await {
            Ok(response) => parse_plan(&response, question),
            Err(e) => {
                failures.push(e);
                (fallback_query(question), String::new())
            }
        }
    }
}

fn find_repeat(query: &SearchQuery, prior: &[SearchQuery]) -> Option<SearchQuery> {
    prior.iter().find(|p| query.is_repeat_of(p)).cloned()
}

/// The question itself, cleaned, with no time filter
pub fn fallback_query(question: &Question) -> SearchQuery {
    SearchQuery::new(clean_query(question.as_str()), TimeWindow::Any)
}

/// Parse `Reasoning:` / `Query:` / `Time Range:` lines.
///
/// A missing or empty query falls back to the cleaned question; a missing
/// or unknown time range means no filter.
pub fn parse_plan(response: &str, question: &Question) -> (SearchQuery, String) {
    let sections = parse_sections(response, PLANNER_LABELS);

    let reasoning = sections.get("reasoning").unwrap_or_default().to_string();
    // Models sometimes keep talking after the query; only its first line counts
    let text = sections
        .get("query")
        .and_then(|q| q.lines().next())
        .map(clean_query)
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| clean_query(question.as_str()));
    let window = sections
        .get("time range")
        .and_then(|t| t.lines().next())
        .map(TimeWindow::parse)
        .unwrap_or_default();

    (SearchQuery::new(text, window), reasoning)
}
