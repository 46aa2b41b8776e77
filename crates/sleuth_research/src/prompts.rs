//! Prompt builders for every model call in a research turn.
//!
//! Each prompt asks for labelled lines so the matching parser can find the
//! answer without guessing. The task sentence that opens each prompt is
//! exported so tests can route a fake model by prompt kind.

use sleuth_common::text::first_sentences;
use sleuth_common::{Question, RefinementHint, SearchQuery, SearchResult, TimeWindow};

/// Assistant persona for direct (non-search) answers
pub const SYSTEM_PROMPT: &str = "You are an AI assistant capable of web searching and providing informative responses.
When a user's message starts with '/', it is answered by searching the web instead of from memory.

ALWAYS follow the instructions in each prompt EXACTLY as given.

Answer only the message you were given. DO NOT write follow-up questions, DO NOT continue the conversation on the user's behalf and DO NOT give more than one answer.";

pub const PLANNER_TASK: &str = "Your task is to formulate a search query";
pub const SELECTOR_TASK: &str = "Your task is to choose which search results to read in full";
pub const EVALUATOR_TASK: &str = "Your task is to decide whether the page content gathered so far";
pub const ANSWER_TASK: &str = "Your task is to answer the user's question using ONLY the sources below";
pub const FALLBACK_TASK: &str = "No web pages could be found to answer the user's question";

/// What the planner knows about earlier rounds
#[derive(Debug, Clone, Copy)]
pub struct PlannerContext<'a> {
    /// 1-based round about to run
    pub round: usize,
    pub max_rounds: usize,
    pub hint: Option<&'a RefinementHint>,
    pub evidence_summary: &'a str,
    pub prior_queries: &'a [SearchQuery],
}

fn time_range_line() -> String {
    let tokens = TimeWindow::ALL
        .iter()
        .map(|w| format!("'{}' for {}", w.token(), w.label()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Time Range: [ONLY one of {}]", tokens)
}

/// Query planning prompt. `repeated` is set on the retry after the model
/// reproduced an earlier query.
pub fn build_planner_prompt(
    question: &Question,
    context: &PlannerContext<'_>,
    repeated: Option<&SearchQuery>,
) -> String {
    let mut prompt = format!(
        "{}. The query must find information that answers the user's question.\n\
User's question: \"{}\"\n\
Search attempt: {} of {}\n",
        PLANNER_TASK, question, context.round, context.max_rounds
    );

    if context.round > 1 || !context.prior_queries.is_empty() {
        prompt.push_str("\nEarlier searches did not find enough to answer.\n");

        if !context.prior_queries.is_empty() {
            prompt.push_str("Queries already tried (do NOT repeat them):\n");
            for query in context.prior_queries {
                prompt.push_str(&format!("- {}\n", query));
            }
        }

        if let Some(hint) = context.hint {
            if !hint.reasoning.is_empty() {
                prompt.push_str(&format!("Why the evidence fell short: {}\n", hint.reasoning));
            }
            if !hint.nudge.is_empty() {
                prompt.push_str(&format!("Suggested change for the next search: {}\n", hint.nudge));
            }
        }

        prompt.push_str(&format!(
            "Evidence gathered so far:\n{}\n",
            context.evidence_summary
        ));
    }

    if let Some(query) = repeated {
        prompt.push_str(&format!(
            "\nYour previous answer repeated the query {}. Use different search terms or a different time range.\n",
            query
        ));
    }

    prompt.push_str(&format!(
        "\nConsider a time range if the question needs recent information.\n\n\
Respond using EXACTLY this format:\n\n\
Reasoning: [why this query should find the answer]\n\
Query: [ONLY the search query]\n\
{}\n",
        time_range_line()
    ));

    prompt
}

/// Numbered result list as shown to the model
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "Result {}:\nTitle: {}\nSnippet: {}\nURL: {}\n",
                i + 1,
                r.title,
                first_sentences(&r.snippet, 3),
                r.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Relevance selection prompt
pub fn build_selector_prompt(question: &Question, results: &[SearchResult], max_selected: usize) -> String {
    format!(
        "{}. Pick at most {} results that are most likely to contain the answer.\n\
User's question: \"{}\"\n\n\
Search results:\n{}\n\
Respond using EXACTLY this format:\n\n\
Reasoning: [why these results]\n\
Selected: [ONLY the result numbers separated by commas, for example 1, 3, or 'none' if no result is relevant]\n",
        SELECTOR_TASK,
        max_selected,
        question,
        format_results(results)
    )
}

/// Sufficiency prompt over the evidence window
pub fn build_evaluator_prompt(question: &Question, evidence: &str) -> String {
    format!(
        "{} is enough to answer the user's question completely and accurately.\n\
User's question: \"{}\"\n\n\
Gathered page content:\n{}\n\n\
Respond using EXACTLY this format:\n\n\
Evaluation: [what the content does and does not establish]\n\
Decision: [ONLY 'SUFFICIENT' if the content answers the question, or 'INSUFFICIENT' if another search is needed]\n\
Refinement: [if INSUFFICIENT, how the next search should change; otherwise 'none']\n",
        EVALUATOR_TASK, question, evidence
    )
}

/// Grounded answer prompt
pub fn build_answer_prompt(question: &Question, evidence: &str) -> String {
    format!(
        "{}.\n\
User's question: \"{}\"\n\n\
Sources:\n{}\n\n\
Rules:\n\
1. Use ONLY information found in the sources. Cite sources as [n].\n\
2. If the sources only partly answer the question, say what is missing.\n\
3. DO NOT ask follow-up questions or write anything besides the answer.\n\
4. DO NOT write a conversation or a series of questions and answers.\n\n\
Use EXACTLY this format:\n\
Response: [your answer to the user's question]\n",
        ANSWER_TASK, question, evidence
    )
}

/// Prior-knowledge answer prompt for a turn with no evidence
pub fn build_fallback_prompt(question: &Question) -> String {
    format!(
        "{}: \"{}\"\n\n\
Give the best answer you can from what you already know. Say clearly which parts you are unsure about, \
and suggest where the user could check the answer or how to rephrase the question.\n\n\
Use EXACTLY this format:\n\
Response: [your answer to the user's question]\n",
        FALLBACK_TASK, question
    )
}

/// Direct chat turn
pub fn build_direct_prompt(message: &str) -> String {
    format!("{}\n\nUser: {}\nAssistant:", SYSTEM_PROMPT, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question::new("What year did the Berlin Wall fall?")
    }

    #[test]
    fn test_first_round_planner_prompt() {
        let context = PlannerContext {
            round: 1,
            max_rounds: 5,
            hint: None,
            evidence_summary: "none yet",
            prior_queries: &[],
        };
        let prompt = build_planner_prompt(&question(), &context, None);
        assert!(prompt.starts_with(PLANNER_TASK));
        assert!(prompt.contains("Search attempt: 1 of 5"));
        assert!(prompt.contains("'w' for past week"));
        assert!(!prompt.contains("Queries already tried"));
    }

    #[test]
    fn test_refinement_planner_prompt() {
        let hint = RefinementHint {
            reasoning: "no date given".to_string(),
            nudge: "search for 1989".to_string(),
        };
        let prior = vec![SearchQuery::new("berlin wall", TimeWindow::Any)];
        let context = PlannerContext {
            round: 2,
            max_rounds: 5,
            hint: Some(&hint),
            evidence_summary: "- https://a.example: text",
            prior_queries: &prior,
        };
        let prompt = build_planner_prompt(&question(), &context, Some(&prior[0]));
        assert!(prompt.contains("- \"berlin wall\" (any time)"));
        assert!(prompt.contains("Why the evidence fell short: no date given"));
        assert!(prompt.contains("search for 1989"));
        assert!(prompt.contains("https://a.example"));
        assert!(prompt.contains("Your previous answer repeated"));
    }

    #[test]
    fn test_format_results_trims_snippets() {
        let results = vec![SearchResult {
            title: "T".to_string(),
            url: "https://a.example".to_string(),
            snippet: "One. Two. Three. Four. Five.".to_string(),
        }];
        let text = format_results(&results);
        assert!(text.contains("Result 1:"));
        assert!(text.contains("Snippet: One. Two. Three..."));
        assert_eq!(format_results(&[]), "No results found.");
    }

    #[test]
    fn test_direct_prompt() {
        let prompt = build_direct_prompt("hi");
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with("User: hi\nAssistant:"));
    }
}
