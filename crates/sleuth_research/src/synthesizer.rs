//! Answer synthesis from the accumulated evidence.
//!
//! This is the one step whose model failure is not absorbed: without a
//! model there is nothing left to answer with.

use serde::Serialize;
use sleuth_common::response_parser::parse_sections;
use sleuth_common::{Question, ResearchError};
use tracing::info;

use crate::model_step::{ModelStep, ANSWER_TOKENS};
use crate::prompts::{build_answer_prompt, build_fallback_prompt};
use crate::result_store::EvidenceSet;

/// Prepended to every answer produced without web evidence
pub const NO_EVIDENCE_NOTICE: &str =
    "No web evidence was found for this question; this answer relies solely on the model's prior knowledge.";

/// Final answer for one research turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    /// A SUFFICIENT verdict was reached before the round budget ran out
    pub grounded: bool,
    /// Evidence URLs, numbered from 1 as cited in the text
    pub sources: Vec<String>,
}

pub struct AnswerSynthesizer {
    model: ModelStep,
    evidence_budget: usize,
}

impl AnswerSynthesizer {
    pub fn new(model: ModelStep, evidence_budget: usize) -> Self {
        Self {
            model,
            evidence_budget,
        }
    }

    pub async fn synthesize(
        &self,
        question: &Question,
        evidence: &EvidenceSet,
        grounded: bool,
    ) -> Result<Answer, ResearchError> {
        if evidence.is_empty() {
            info!("Synthesizing from prior knowledge only");
            let response = self
                .model
                .run("answer", &build_fallback_prompt(question), ANSWER_TOKENS)
                .await?;
            return Ok(Answer {
                text: format!("{}\n\n{}", NO_EVIDENCE_NOTICE, extract_response(&response)),
                grounded: false,
                sources: Vec::new(),
            });
        }

        info!(
            "Synthesizing from {} pages (grounded={})",
            evidence.len(),
            grounded
        );
        let prompt = build_answer_prompt(question, &evidence.context_window(self.evidence_budget));
        let response = self.model.run("answer", &prompt, ANSWER_TOKENS).await?;

        Ok(Answer {
            text: extract_response(&response),
            grounded,
            sources: evidence.urls(),
        })
    }
}

/// The answer after `Response:`, cut where the model starts inventing the
/// next user turn. Replies without the label are used whole.
pub fn extract_response(response: &str) -> String {
    let body = parse_sections(response, &["Response"])
        .get("response")
        .map(str::to_string)
        .unwrap_or_else(|| response.trim().to_string());

    let mut kept = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("User:") || trimmed.starts_with("Response:") {
            break;
        }
        kept.push(line);
    }
    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_common::llm_client::FakeLlmClient;
    use sleuth_common::{LlmError, PageContent};
    use std::sync::Arc;
    use std::time::Duration;

    fn synthesizer(llm: FakeLlmClient) -> (AnswerSynthesizer, Arc<FakeLlmClient>) {
        let llm = Arc::new(llm);
        let model = ModelStep::new(llm.clone(), Duration::from_secs(5));
        (AnswerSynthesizer::new(model, 8000), llm)
    }

    #[test]
    fn test_extract_response() {
        assert_eq!(
            extract_response("Response: The wall fell in 1989 [1].\nUser: and then?\nResponse: more"),
            "The wall fell in 1989 [1]."
        );
        assert_eq!(extract_response("  plain answer  "), "plain answer");
    }

    #[tokio::test]
    async fn test_grounded_answer_lists_sources() {
        let (synth, llm) = synthesizer(FakeLlmClient::always("Response: 1989 [1]"));
        let mut evidence = EvidenceSet::new();
        evidence.append(PageContent::new("https://a.example", "fell in 1989"));

        let answer = synth
            .synthesize(&Question::new("when?"), &evidence, true)
            .await
            .unwrap();
        assert_eq!(answer.text, "1989 [1]");
        assert!(answer.grounded);
        assert_eq!(answer.sources, vec!["https://a.example"]);
        assert!(llm.prompts()[0].contains("fell in 1989"));
    }

    #[tokio::test]
    async fn test_empty_evidence_states_it() {
        let (synth, llm) = synthesizer(FakeLlmClient::always("Response: Probably 1989."));
        let answer = synth
            .synthesize(&Question::new("when?"), &EvidenceSet::new(), false)
            .await
            .unwrap();
        assert!(answer.text.starts_with(NO_EVIDENCE_NOTICE));
        assert!(answer.text.ends_with("Probably 1989."));
        assert!(!answer.grounded);
        assert!(answer.sources.is_empty());
        assert!(llm.prompts()[0].starts_with(crate::prompts::FALLBACK_TASK));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let (synth, _) = synthesizer(FakeLlmClient::always_error(LlmError::Http("down".to_string())));
        let err = synth
            .synthesize(&Question::new("when?"), &EvidenceSet::new(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::ModelUnavailable(_)));
    }
}
