//! Sufficiency evaluation: does the evidence answer the question?
//!
//! The verdict drives the loop, so the parser is strict. Anything other
//! than a clear SUFFICIENT is INSUFFICIENT; unparseable replies are
//! recorded as `UnparseableVerdict`.

use sleuth_common::response_parser::{parse_sections, Sections};
use sleuth_common::{Question, RefinementHint, ResearchError, Verdict};
use tracing::{info, warn};

use crate::model_step::{ModelStep, SHORT_REPLY_TOKENS};
use crate::prompts::build_evaluator_prompt;
use crate::result_store::EvidenceSet;

const EVALUATOR_LABELS: &[&str] = &["Evaluation", "Decision", "Next Action", "Refinement"];

const AFFIRMATIVE: &[&str] = &["sufficient", "answer", "enough", "yes"];
const NEGATIVE: &[&str] = &["insufficient", "refine", "not", "no", "more"];

/// Verdict plus the failure absorbed while reaching it
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub verdict: Verdict,
    pub failure: Option<ResearchError>,
}

pub struct SufficiencyEvaluator {
    model: ModelStep,
    evidence_budget: usize,
}

impl SufficiencyEvaluator {
    pub fn new(model: ModelStep, evidence_budget: usize) -> Self {
        Self {
            model,
            evidence_budget,
        }
    }

    pub async fn evaluate(&self, question: &Question, evidence: &EvidenceSet) -> Evaluation {
        if evidence.is_empty() {
            info!("No evidence yet, verdict INSUFFICIENT");
            return Evaluation {
                verdict: Verdict::insufficient(
                    "No readable page content has been gathered yet.",
                    "Try different search terms or a wider time range.",
                ),
                failure: None,
            };
        }

        let prompt = build_evaluator_prompt(question, &evidence.context_window(self.evidence_budget));
        let response = match self.model.run("evaluate", &prompt, SHORT_REPLY_TOKENS).await {
            Ok(response) => response,
            Err(e) => {
                return Evaluation {
                    verdict: Verdict::Insufficient { hint: None },
                    failure: Some(e),
                }
            }
        };

        match parse_verdict(&response) {
            Ok(verdict) => {
                info!("Verdict: {}", verdict);
                Evaluation {
                    verdict,
                    failure: None,
                }
            }
            Err(e) => {
                warn!("{}, treating as INSUFFICIENT", e);
                let sections = parse_sections(&response, EVALUATOR_LABELS);
                Evaluation {
                    verdict: Verdict::Insufficient {
                        hint: refinement_hint(&sections),
                    },
                    failure: Some(e),
                }
            }
        }
    }
}

/// Parse an evaluator reply into exactly one verdict.
///
/// Reads the `Decision:` line (or the older `Next Action:` with
/// `answer`/`refine`). A leading negative word settles it; otherwise the
/// line must contain words of only one polarity. Mixed or missing decisions
/// are an error, never SUFFICIENT.
pub fn parse_verdict(response: &str) -> Result<Verdict, ResearchError> {
    let sections = parse_sections(response, EVALUATOR_LABELS);

    let Some(decision) = sections
        .get("decision")
        .or_else(|| sections.get("next action"))
        .and_then(|d| d.lines().next())
    else {
        return Err(ResearchError::UnparseableVerdict(
            "no Decision line".to_string(),
        ));
    };

    let words: Vec<String> = decision
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();

    let polarity = |word: &str| {
        if AFFIRMATIVE.contains(&word) {
            Some(true)
        } else if NEGATIVE.contains(&word) {
            Some(false)
        } else {
            None
        }
    };

    let affirmative = words.iter().any(|w| polarity(w.as_str()) == Some(true));
    let negative = words.iter().any(|w| polarity(w.as_str()) == Some(false));

    // A leading negative can only fail closed; a leading affirmative counts
    // only when nothing on the line contradicts it.
    let sufficient = match (words.first().and_then(|w| polarity(w.as_str())), affirmative, negative) {
        (Some(false), _, _) => false,
        (_, true, false) => true,
        (None, false, true) => false,
        _ => {
            return Err(ResearchError::UnparseableVerdict(format!(
                "ambiguous decision {:?}",
                decision
            )))
        }
    };

    if sufficient {
        Ok(Verdict::Sufficient)
    } else {
        Ok(Verdict::Insufficient {
            hint: refinement_hint(&sections),
        })
    }
}

fn refinement_hint(sections: &Sections) -> Option<RefinementHint> {
    let reasoning = sections.get("evaluation").unwrap_or_default().trim().to_string();
    let nudge = sections
        .get("refinement")
        .map(str::trim)
        .filter(|n| !n.eq_ignore_ascii_case("none"))
        .unwrap_or_default()
        .to_string();

    if reasoning.is_empty() && nudge.is_empty() {
        None
    } else {
        Some(RefinementHint { reasoning, nudge })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_common::llm_client::FakeLlmClient;
    use sleuth_common::{LlmError, PageContent};
    use std::sync::Arc;
    use std::time::Duration;

    fn evaluator(llm: FakeLlmClient) -> (SufficiencyEvaluator, Arc<FakeLlmClient>) {
        let llm = Arc::new(llm);
        let model = ModelStep::new(llm.clone(), Duration::from_secs(5));
        (SufficiencyEvaluator::new(model, 8000), llm)
    }

    fn evidence() -> EvidenceSet {
        let mut evidence = EvidenceSet::new();
        evidence.append(PageContent::new("https://a.example", "The wall fell in 1989."));
        evidence
    }

    #[test]
    fn test_parse_sufficient() {
        let verdict = parse_verdict("Evaluation: The page gives the date.\nDecision: SUFFICIENT").unwrap();
        assert_eq!(verdict, Verdict::Sufficient);
    }

    #[test]
    fn test_parse_insufficient_with_hint() {
        let verdict = parse_verdict(
            "Evaluation: Only background.\nDecision: INSUFFICIENT\nRefinement: search for the exact date",
        )
        .unwrap();
        let hint = verdict.hint().unwrap();
        assert_eq!(hint.reasoning, "Only background.");
        assert_eq!(hint.nudge, "search for the exact date");
    }

    #[test]
    fn test_insufficient_is_not_read_as_sufficient() {
        let verdict = parse_verdict("Decision: **Insufficient**").unwrap();
        assert!(!verdict.is_sufficient());
    }

    #[test]
    fn test_leading_negative_decides() {
        assert!(!parse_verdict("Decision: not sufficient yet")
            .unwrap()
            .is_sufficient());
        assert!(!parse_verdict("Decision: Insufficient, the answer is missing")
            .unwrap()
            .is_sufficient());
        assert!(parse_verdict("Decision: SUFFICIENT, answer now")
            .unwrap()
            .is_sufficient());
    }

    #[test]
    fn test_legacy_next_action() {
        assert!(parse_verdict("Next Action: answer").unwrap().is_sufficient());
        assert!(!parse_verdict("Next Action: refine").unwrap().is_sufficient());
    }

    #[test]
    fn test_ambiguous_or_missing_is_error() {
        assert!(matches!(
            parse_verdict("Decision: the evidence is sufficient but more is needed"),
            Err(ResearchError::UnparseableVerdict(_))
        ));
        assert!(matches!(
            parse_verdict("Decision: maybe"),
            Err(ResearchError::UnparseableVerdict(_))
        ));
        assert!(matches!(
            parse_verdict("The evidence looks sufficient to me."),
            Err(ResearchError::UnparseableVerdict(_))
        ));
    }

    #[test]
    fn test_contradicted_affirmative_is_error() {
        for reply in [
            "Decision: SUFFICIENT, no further search needed",
            "Decision: Sufficient information is not available",
            "Decision: Answer not found, refine the search",
            "Decision: enough? no, more is needed",
            "Decision: yes, more searching is needed",
        ] {
            assert!(
                matches!(parse_verdict(reply), Err(ResearchError::UnparseableVerdict(_))),
                "{reply} must not parse"
            );
        }
    }

    #[test]
    fn test_refinement_none_is_dropped() {
        let verdict = parse_verdict("Decision: INSUFFICIENT\nRefinement: none").unwrap();
        assert_eq!(verdict, Verdict::Insufficient { hint: None });
    }

    #[tokio::test]
    async fn test_empty_evidence_skips_model() {
        let (evaluator, llm) = evaluator(FakeLlmClient::always("Decision: SUFFICIENT"));
        let evaluation = evaluator.evaluate(&Question::new("q"), &EvidenceSet::new()).await;
        assert!(!evaluation.verdict.is_sufficient());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_fails_closed() {
        let (evaluator, _) = evaluator(FakeLlmClient::always("Evaluation: hard to say\nDecision: perhaps"));
        let evaluation = evaluator.evaluate(&Question::new("q"), &evidence()).await;
        assert!(!evaluation.verdict.is_sufficient());
        assert_eq!(
            evaluation.verdict.hint().map(|h| h.reasoning.as_str()),
            Some("hard to say")
        );
        assert!(matches!(
            evaluation.failure,
            Some(ResearchError::UnparseableVerdict(_))
        ));
    }

    #[tokio::test]
    async fn test_model_failure_is_insufficient() {
        let (evaluator, _) = evaluator(FakeLlmClient::always_error(LlmError::Timeout(5)));
        let evaluation = evaluator.evaluate(&Question::new("q"), &evidence()).await;
        assert!(!evaluation.verdict.is_sufficient());
        assert!(matches!(
            evaluation.failure,
            Some(ResearchError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_evaluator_sees_evidence() {
        let (evaluator, llm) = evaluator(FakeLlmClient::always("Decision: SUFFICIENT"));
        let evaluation = evaluator.evaluate(&Question::new("q"), &evidence()).await;
        assert!(evaluation.verdict.is_sufficient());
        assert!(llm.prompts()[0].contains("The wall fell in 1989."));
    }
}
