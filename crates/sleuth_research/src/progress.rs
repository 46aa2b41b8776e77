//! Round-by-round progress events.
//!
//! The loop reports what it is doing so the console can show the user
//! which queries ran and what was read. Emitters must not block.

use sleuth_common::{ResearchError, SearchQuery, SearchResult, Verdict};
use std::sync::Mutex;

use crate::refinement_loop::LoopState;

#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    /// The loop entered `state` during `round`
    StateChanged { round: usize, state: LoopState },
    QueryPlanned {
        round: usize,
        query: &'a SearchQuery,
        reasoning: &'a str,
    },
    ResultsReceived {
        round: usize,
        results: &'a [SearchResult],
    },
    SearchFailed { round: usize, error: &'a ResearchError },
    Selected {
        round: usize,
        selected: &'a [SearchResult],
    },
    PageFetched { url: &'a str, chars: usize },
    FetchFailed { error: &'a ResearchError },
    VerdictReached { round: usize, verdict: &'a Verdict },
    /// Round budget exhausted without a SUFFICIENT verdict
    BudgetExhausted { rounds: usize },
}

impl ProgressEvent<'_> {
    /// Short name, for logs and tests
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::StateChanged { .. } => "state",
            ProgressEvent::QueryPlanned { .. } => "query",
            ProgressEvent::ResultsReceived { .. } => "results",
            ProgressEvent::SearchFailed { .. } => "search_failed",
            ProgressEvent::Selected { .. } => "selected",
            ProgressEvent::PageFetched { .. } => "fetched",
            ProgressEvent::FetchFailed { .. } => "fetch_failed",
            ProgressEvent::VerdictReached { .. } => "verdict",
            ProgressEvent::BudgetExhausted { .. } => "budget_exhausted",
        }
    }
}

pub trait ProgressEmitter: Send + Sync {
    fn emit(&self, event: &ProgressEvent<'_>);
}

/// Discards every event
pub struct NoopEmitter;

impl ProgressEmitter for NoopEmitter {
    fn emit(&self, _event: &ProgressEvent<'_>) {}
}

/// Keeps event names in order, for tests
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<String>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of events with the given name
    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| *e == name).count()
    }
}

impl ProgressEmitter for RecordingEmitter {
    fn emit(&self, event: &ProgressEvent<'_>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.name().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_emitter() {
        let emitter = RecordingEmitter::new();
        emitter.emit(&ProgressEvent::StateChanged {
            round: 1,
            state: LoopState::Planning,
        });
        emitter.emit(&ProgressEvent::BudgetExhausted { rounds: 5 });
        emitter.emit(&ProgressEvent::BudgetExhausted { rounds: 5 });
        assert_eq!(emitter.events(), vec!["state", "budget_exhausted", "budget_exhausted"]);
        assert_eq!(emitter.count("budget_exhausted"), 2);
        NoopEmitter.emit(&ProgressEvent::BudgetExhausted { rounds: 5 });
    }
}
