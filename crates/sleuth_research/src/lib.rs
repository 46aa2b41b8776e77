//! Sleuth Research - the search refinement loop
//!
//! Turns a question into at most five rounds of
//! plan -> search -> select -> fetch -> evaluate, then composes an answer
//! from whatever evidence was gathered. Collaborators (model, search
//! provider, page fetcher) come in through the constructor as trait objects.

pub mod direct;
pub mod model_step;
pub mod progress;
pub mod prompts;
pub mod query_planner;
pub mod refinement_loop;
pub mod relevance;
pub mod result_store;
pub mod sufficiency;
pub mod synthesizer;

pub use direct::DirectResponder;
pub use progress::{NoopEmitter, ProgressEmitter, ProgressEvent};
pub use refinement_loop::{
    transition, LoopEvent, LoopState, RefinementLoop, ResearchOutcome, ResearchReport, MAX_ROUNDS,
};
pub use relevance::MAX_SELECTED;
pub use result_store::{EvidenceSet, ResultStore};
pub use synthesizer::{Answer, NO_EVIDENCE_NOTICE};
