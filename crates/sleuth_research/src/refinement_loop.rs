//! Search refinement loop.
//!
//! States and transitions:
//!
//! ```text
//! PLANNING --planned--> SEARCHING --results--> SELECTING --selected--> FETCHING
//!     ^                     |                                             |
//!     |               search failed                                    fetched
//!     |                     v                                             v
//!     +------ round < MAX ---+------------ insufficient ---------- EVALUATING
//!                           |                                             |
//!               round == MAX v                                 sufficient v
//!                        ANSWERING <---------------------------------------+
//! ```
//!
//! Rounds run strictly one after another. Inside a round the selected pages
//! are fetched concurrently and appended to the evidence once all settle.
//! No round failure escapes `run`; only the synthesizer can fail a turn.

use serde::Serialize;
use sleuth_common::config::ResearchConfig;
use sleuth_common::{
    LlmClient, PageContent, PageFetcher, Question, ResearchError, RoundRecord, SearchClient,
    SearchQuery, Verdict,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::model_step::ModelStep;
use crate::progress::{ProgressEmitter, ProgressEvent};
use crate::prompts::PlannerContext;
use crate::query_planner::QueryPlanner;
use crate::relevance::RelevanceSelector;
use crate::result_store::{EvidenceSet, ResultStore};
use crate::sufficiency::SufficiencyEvaluator;
use crate::synthesizer::{Answer, AnswerSynthesizer};

/// Hard cap on rounds per question
pub const MAX_ROUNDS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    Planning,
    Searching,
    Selecting,
    Fetching,
    Evaluating,
    Answering,
}

impl LoopState {
    pub fn label(&self) -> &'static str {
        match self {
            LoopState::Planning => "planning",
            LoopState::Searching => "searching",
            LoopState::Selecting => "selecting",
            LoopState::Fetching => "fetching",
            LoopState::Evaluating => "evaluating",
            LoopState::Answering => "answering",
        }
    }
}

/// Outcome of the step run in the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    Planned,
    SearchSucceeded,
    /// Provider error or zero results
    SearchFailed,
    Selected,
    Fetched,
    Sufficient,
    Insufficient,
}

/// Transition table. Returns the next state and round, or `None` when
/// `event` cannot happen in `state`.
pub fn transition(state: LoopState, event: LoopEvent, round: usize) -> Option<(LoopState, usize)> {
    let next_round_or_answer = if round < MAX_ROUNDS {
        (LoopState::Planning, round + 1)
    } else {
        (LoopState::Answering, round)
    };

    match (state, event) {
        (LoopState::Planning, LoopEvent::Planned) => Some((LoopState::Searching, round)),
        (LoopState::Searching, LoopEvent::SearchSucceeded) => Some((LoopState::Selecting, round)),
        (LoopState::Searching, LoopEvent::SearchFailed) => Some(next_round_or_answer),
        (LoopState::Selecting, LoopEvent::Selected) => Some((LoopState::Fetching, round)),
        (LoopState::Fetching, LoopEvent::Fetched) => Some((LoopState::Evaluating, round)),
        (LoopState::Evaluating, LoopEvent::Sufficient) => Some((LoopState::Answering, round)),
        (LoopState::Evaluating, LoopEvent::Insufficient) => Some(next_round_or_answer),
        _ => None,
    }
}

/// Evidence and history handed to the synthesizer
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub evidence: EvidenceSet,
    /// SUFFICIENT was reached; otherwise the budget ran out
    pub grounded: bool,
    pub rounds: Vec<RoundRecord>,
}

impl ResearchOutcome {
    pub fn rounds_used(&self) -> usize {
        self.rounds.len()
    }

    pub fn queries(&self) -> Vec<SearchQuery> {
        self.rounds.iter().map(|r| r.query.clone()).collect()
    }

    /// Every absorbed failure, in the order it happened
    pub fn failures(&self) -> Vec<&ResearchError> {
        self.rounds.iter().flat_map(|r| r.failures.iter()).collect()
    }
}

/// Answer plus the research behind it
#[derive(Debug, Clone)]
pub struct ResearchReport {
    pub answer: Answer,
    pub outcome: ResearchOutcome,
}

pub struct RefinementLoop {
    planner: QueryPlanner,
    selector: RelevanceSelector,
    evaluator: SufficiencyEvaluator,
    synthesizer: AnswerSynthesizer,
    search: Arc<dyn SearchClient>,
    fetcher: Arc<dyn PageFetcher>,
}

impl RefinementLoop {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        fetcher: Arc<dyn PageFetcher>,
        config: ResearchConfig,
    ) -> Self {
        let model = ModelStep::new(llm, Duration::from_secs(config.step_timeout_secs));
        Self {
            planner: QueryPlanner::new(model.clone()),
            selector: RelevanceSelector::new(model.clone()),
            evaluator: SufficiencyEvaluator::new(model.clone(), config.evidence_budget_chars),
            synthesizer: AnswerSynthesizer::new(model, config.evidence_budget_chars),
            search,
            fetcher,
        }
    }

    /// Research the question and compose the answer. Fails only when the
    /// model is unavailable for the final answer.
    pub async fn answer(
        &self,
        question: &Question,
        progress: &dyn ProgressEmitter,
    ) -> Result<ResearchReport, ResearchError> {
        let outcome = self.run(question, progress).await;

        progress.emit(&ProgressEvent::StateChanged {
            round: outcome.rounds_used(),
            state: LoopState::Answering,
        });
        let answer = self
            .synthesizer
            .synthesize(question, &outcome.evidence, outcome.grounded)
            .await?;

        info!(
            "Answered after {} rounds (grounded={}, sources={})",
            outcome.rounds_used(),
            answer.grounded,
            answer.sources.len()
        );
        Ok(ResearchReport { answer, outcome })
    }

    /// Run rounds until SUFFICIENT or the round cap. Never fails.
    pub async fn run(&self, question: &Question, progress: &dyn ProgressEmitter) -> ResearchOutcome {
        let mut store = ResultStore::new();
        let mut record: Option<RoundRecord> = None;
        let mut state = LoopState::Planning;
        let mut round = 1;
        let mut grounded = false;

        while state != LoopState::Answering {
            progress.emit(&ProgressEvent::StateChanged { round, state });

            let event = if state == LoopState::Planning {
                if let Some(done) = record.take() {
                    store.push_round(done);
                }
                record = Some(self.plan(question, round, &store, progress).await);
                LoopEvent::Planned
            } else {
                let Some(current) = record.as_mut() else {
                    break;
                };
                match state {
                    LoopState::Searching => self.search(current, progress).await,
                    LoopState::Selecting => self.select(question, current, progress).await,
                    LoopState::Fetching => self.fetch(current, &mut store, progress).await,
                    LoopState::Evaluating => self.evaluate(question, current, &store, progress).await,
                    LoopState::Planning | LoopState::Answering => break,
                }
            };

            let Some((next_state, next_round)) = transition(state, event, round) else {
                warn!("No transition from {:?} on {:?}, finishing", state, event);
                break;
            };

            if event == LoopEvent::Sufficient {
                grounded = true;
            }
            if next_state == LoopState::Answering && !grounded {
                info!("Round budget exhausted after {} rounds, answering best effort", round);
                progress.emit(&ProgressEvent::BudgetExhausted { rounds: round });
            }

            state = next_state;
            round = next_round;
        }

        if let Some(done) = record.take() {
            store.push_round(done);
        }

        let (evidence, rounds) = store.into_parts();
        ResearchOutcome {
            evidence,
            grounded,
            rounds,
        }
    }

    async fn plan(
        &self,
        question: &Question,
        round: usize,
        store: &ResultStore,
        progress: &dyn ProgressEmitter,
    ) -> RoundRecord {
        info!("Round {}/{}: planning", round, MAX_ROUNDS);

        let summary = store.evidence().summary();
        let prior = store.issued_queries();
        let context = PlannerContext {
            round,
            max_rounds: MAX_ROUNDS,
            hint: store.latest_hint(),
            evidence_summary: &summary,
            prior_queries: &prior,
        };
        let planned = self.planner.plan(question, &context).await;

        info!("Round {}: query {}", round, planned.query);
        progress.emit(&ProgressEvent::QueryPlanned {
            round,
            query: &planned.query,
            reasoning: &planned.reasoning,
        });

        let mut record = RoundRecord::new(round, planned.query, planned.reasoning);
        record.failures.extend(planned.failures);
        record
    }

    async fn search(&self, record: &mut RoundRecord, progress: &dyn ProgressEmitter) -> LoopEvent {
        let response = self.search.search(&record.query).await;
        let error = match response {
            Ok(results) if !results.is_empty() => {
                info!("Round {}: {} results", record.round_index, results.len());
                record.results = results;
                progress.emit(&ProgressEvent::ResultsReceived {
                    round: record.round_index,
                    results: &record.results,
                });
                return LoopEvent::SearchSucceeded;
            }
            Ok(_) => ResearchError::SearchFailed(format!("no results for {}", record.query)),
            Err(e) => e,
        };

        warn!("Round {}: {}", record.round_index, error);
        progress.emit(&ProgressEvent::SearchFailed {
            round: record.round_index,
            error: &error,
        });
        record.verdict = Verdict::insufficient(
            format!("The search {} returned nothing usable.", record.query),
            "Use broader or different search terms, or a wider time range.",
        );
        record.failures.push(error);
        LoopEvent::SearchFailed
    }

    async fn select(
        &self,
        question: &Question,
        record: &mut RoundRecord,
        progress: &dyn ProgressEmitter,
    ) -> LoopEvent {
        let selection = self.selector.select(question, &record.results).await;
        record.selected = selection.selected;
        record.failures.extend(selection.failure);

        progress.emit(&ProgressEvent::Selected {
            round: record.round_index,
            selected: &record.selected,
        });
        LoopEvent::Selected
    }

    /// Fetch the selected pages concurrently. Each URL fails on its own;
    /// the evidence is appended in selection order after all settle.
    async fn fetch(
        &self,
        record: &mut RoundRecord,
        store: &mut ResultStore,
        progress: &dyn ProgressEmitter,
    ) -> LoopEvent {
        let mut tasks = JoinSet::new();
        for (index, result) in record.selected.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let url = result.url.clone();
            tasks.spawn(async move { (index, fetcher.fetch(&url).await) });
        }

        let mut outcomes: Vec<Option<Result<String, ResearchError>>> =
            record.selected.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if let Some(slot) = outcomes.get_mut(index) {
                        *slot = Some(outcome);
                    }
                }
                Err(e) => warn!("Fetch task did not finish: {}", e),
            }
        }

        let mut pages = Vec::with_capacity(outcomes.len());
        for (result, outcome) in record.selected.iter().zip(outcomes) {
            let url = result.url.as_str();
            let outcome = outcome.unwrap_or_else(|| Err(ResearchError::fetch(url, "fetch task aborted")));
            match outcome {
                Ok(text) if !text.trim().is_empty() => {
                    info!("Fetched {} ({} chars)", url, text.len());
                    progress.emit(&ProgressEvent::PageFetched {
                        url,
                        chars: text.chars().count(),
                    });
                    pages.push(PageContent::new(url, text));
                }
                outcome => {
                    let error = match outcome {
                        Err(e) => e,
                        Ok(_) => ResearchError::fetch(url, "no readable content"),
                    };
                    warn!("{}", error);
                    progress.emit(&ProgressEvent::FetchFailed { error: &error });
                    record.failures.push(error);
                    pages.push(PageContent::empty(url));
                }
            }
        }

        let kept = store.add_pages(&pages);
        info!(
            "Round {}: {} of {} pages added, evidence now {}",
            record.round_index,
            kept,
            pages.len(),
            store.evidence().len()
        );
        record.pages = pages;
        LoopEvent::Fetched
    }

    async fn evaluate(
        &self,
        question: &Question,
        record: &mut RoundRecord,
        store: &ResultStore,
        progress: &dyn ProgressEmitter,
    ) -> LoopEvent {
        let evaluation = self.evaluator.evaluate(question, store.evidence()).await;
        record.verdict = evaluation.verdict;
        record.failures.extend(evaluation.failure);

        progress.emit(&ProgressEvent::VerdictReached {
            round: record.round_index,
            verdict: &record.verdict,
        });

        if record.verdict.is_sufficient() {
            LoopEvent::Sufficient
        } else {
            LoopEvent::Insufficient
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut state = LoopState::Planning;
        for event in [
            LoopEvent::Planned,
            LoopEvent::SearchSucceeded,
            LoopEvent::Selected,
            LoopEvent::Fetched,
        ] {
            let (next, round) = transition(state, event, 1).unwrap();
            assert_eq!(round, 1);
            state = next;
        }
        assert_eq!(state, LoopState::Evaluating);
        assert_eq!(
            transition(state, LoopEvent::Sufficient, 1),
            Some((LoopState::Answering, 1))
        );
    }

    #[test]
    fn test_insufficient_refines_until_cap() {
        for round in 1..MAX_ROUNDS {
            assert_eq!(
                transition(LoopState::Evaluating, LoopEvent::Insufficient, round),
                Some((LoopState::Planning, round + 1))
            );
        }
        assert_eq!(
            transition(LoopState::Evaluating, LoopEvent::Insufficient, MAX_ROUNDS),
            Some((LoopState::Answering, MAX_ROUNDS))
        );
    }

    #[test]
    fn test_search_failure_skips_to_next_round() {
        assert_eq!(
            transition(LoopState::Searching, LoopEvent::SearchFailed, 2),
            Some((LoopState::Planning, 3))
        );
        assert_eq!(
            transition(LoopState::Searching, LoopEvent::SearchFailed, MAX_ROUNDS),
            Some((LoopState::Answering, MAX_ROUNDS))
        );
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(transition(LoopState::Planning, LoopEvent::Sufficient, 1), None);
        assert_eq!(transition(LoopState::Answering, LoopEvent::Planned, 1), None);
        assert_eq!(transition(LoopState::Selecting, LoopEvent::Fetched, 1), None);
    }

    #[test]
    fn test_round_never_exceeds_cap() {
        let events = [
            LoopEvent::Planned,
            LoopEvent::SearchSucceeded,
            LoopEvent::SearchFailed,
            LoopEvent::Selected,
            LoopEvent::Fetched,
            LoopEvent::Insufficient,
        ];
        let states = [
            LoopState::Planning,
            LoopState::Searching,
            LoopState::Selecting,
            LoopState::Fetching,
            LoopState::Evaluating,
        ];
        for round in 1..=MAX_ROUNDS {
            for state in states {
                for event in events {
                    if let Some((_, next)) = transition(state, event, round) {
                        assert!(next <= MAX_ROUNDS);
                    }
                }
            }
        }
    }
}
