//! One bounded model call
//!
//! Every decision in the loop is a single prompt-in, text-out call. A call
//! that errors or runs past the step timeout becomes `ModelUnavailable` for
//! that step only.

use sleuth_common::{GenerateOptions, LlmClient, ResearchError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Reply budget for short structured answers (plan, selection, verdict)
pub const SHORT_REPLY_TOKENS: u32 = 300;

/// Reply budget for the final answer
pub const ANSWER_TOKENS: u32 = 1000;

#[derive(Clone)]
pub struct ModelStep {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl ModelStep {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Run `prompt` through the model. `step` only names the call in logs.
    pub async fn run(&self, step: &str, prompt: &str, max_tokens: u32) -> Result<String, ResearchError> {
        let options = GenerateOptions::with_max_tokens(max_tokens);
        debug!("{}: prompt {} chars", step, prompt.len());

        match tokio::time::timeout(self.timeout, self.llm.generate(prompt, &options)).await {
            Ok(Ok(text)) => {
                debug!("{}: reply {} chars", step, text.len());
                Ok(text)
            }
            Ok(Err(e)) => {
                warn!("{}: model call failed: {}", step, e);
                Err(e.into())
            }
            Err(_) => {
                warn!("{}: model call timed out after {:?}", step, self.timeout);
                Err(ResearchError::ModelUnavailable(format!(
                    "{} timed out after {}s",
                    step,
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sleuth_common::llm_client::FakeLlmClient;
    use sleuth_common::LlmError;

    struct SlowLlm;

    #[async_trait]
    impl LlmClient for SlowLlm {
        async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".to_string())
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_run_returns_text() {
        let step = ModelStep::new(Arc::new(FakeLlmClient::always("hello")), Duration::from_secs(5));
        assert_eq!(step.run("test", "prompt", 10).await.unwrap(), "hello");
        assert_eq!(step.model_name(), "fake");
    }

    #[tokio::test]
    async fn test_model_error_is_model_unavailable() {
        let llm = FakeLlmClient::always_error(LlmError::Http("connection refused".to_string()));
        let step = ModelStep::new(Arc::new(llm), Duration::from_secs(5));
        let err = step.run("test", "prompt", 10).await.unwrap_err();
        assert!(matches!(err, ResearchError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_model_unavailable() {
        let step = ModelStep::new(Arc::new(SlowLlm), Duration::from_millis(20));
        let err = step.run("plan", "prompt", 10).await.unwrap_err();
        assert!(err.to_string().contains("plan timed out"));
    }
}
