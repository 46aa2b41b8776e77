//! Direct answers, no search.
//!
//! Used for input without the search marker. Same model, same step
//! timeout, the assistant system prompt in front.

use sleuth_common::{LlmClient, ResearchError};
use std::sync::Arc;
use std::time::Duration;

use crate::model_step::ModelStep;
use crate::prompts::build_direct_prompt;
use crate::synthesizer::extract_response;

pub struct DirectResponder {
    model: ModelStep,
    max_tokens: u32,
}

impl DirectResponder {
    pub fn new(llm: Arc<dyn LlmClient>, step_timeout: Duration, max_tokens: u32) -> Self {
        Self {
            model: ModelStep::new(llm, step_timeout),
            max_tokens,
        }
    }

    pub async fn respond(&self, message: &str) -> Result<String, ResearchError> {
        let response = self
            .model
            .run("direct", &build_direct_prompt(message), self.max_tokens)
            .await?;
        Ok(extract_response(&response))
    }
}
