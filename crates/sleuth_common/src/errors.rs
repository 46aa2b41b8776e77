//! Research error taxonomy
//!
//! Every variant except `ModelUnavailable` at answer synthesis is absorbed by
//! the refinement loop and recorded on the round where it happened.

use crate::llm_client::LlmError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResearchError {
    #[error("Language model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Unparseable verdict: {0}")]
    UnparseableVerdict(String),

    #[error("No progress: planner repeated {0}")]
    NoProgress(String),
}

impl ResearchError {
    pub fn fetch(url: &str, reason: impl Into<String>) -> Self {
        ResearchError::FetchFailed {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchError::ModelUnavailable(_) => "model_unavailable",
            ResearchError::SearchFailed(_) => "search_failed",
            ResearchError::FetchFailed { .. } => "fetch_failed",
            ResearchError::UnparseableVerdict(_) => "unparseable_verdict",
            ResearchError::NoProgress(_) => "no_progress",
        }
    }
}

impl From<LlmError> for ResearchError {
    fn from(err: LlmError) -> Self {
        ResearchError::ModelUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_errors_map_to_model_unavailable() {
        let err: ResearchError = LlmError::Timeout(30).into();
        assert!(matches!(err, ResearchError::ModelUnavailable(_)));
        assert_eq!(err.kind(), "model_unavailable");
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = ResearchError::fetch("https://a.example/page", "HTTP 403");
        assert_eq!(err.to_string(), "Fetch failed for https://a.example/page: HTTP 403");
        assert_eq!(err.kind(), "fetch_failed");
    }
}
