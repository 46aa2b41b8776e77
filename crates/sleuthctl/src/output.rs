//! Console output: round transparency, answers, errors.
//!
//! ASCII labels only. Everything that goes to the terminal during a turn
//! passes through `ConsoleEmitter` so the spinner and printed lines never
//! overlap.

use owo_colors::OwoColorize;
use sleuth_common::text::first_sentences;
use sleuth_research::{Answer, LoopState, ProgressEmitter, ProgressEvent, MAX_ROUNDS};
use std::sync::Mutex;

use crate::spinner::{Spinner, PREFIX};

/// Label shown above an answer
pub fn answer_label(grounded: bool) -> &'static str {
    if grounded {
        "[GROUNDED]"
    } else {
        "[BEST EFFORT]"
    }
}

/// Answer block: label, text and numbered sources
pub fn format_answer(answer: &Answer) -> String {
    let label = if answer.grounded {
        answer_label(true).bright_green().to_string()
    } else {
        answer_label(false).yellow().to_string()
    };

    let mut out = format!("{}\n\n{}\n", label, answer.text);
    if !answer.sources.is_empty() {
        out.push_str("\n[SOURCES]\n");
        for (i, url) in answer.sources.iter().enumerate() {
            out.push_str(&format!("  [{}] {}\n", i + 1, url.cyan()));
        }
    }
    out
}

pub fn display_answer(answer: &Answer) {
    println!();
    print!("{}", format_answer(answer));
    println!();
}

pub fn display_reply(text: &str) {
    println!();
    println!("{}", text);
    println!();
}

pub fn display_error(message: &str) {
    eprintln!();
    eprintln!("[ERROR] {}", message.red());
    eprintln!();
}

pub fn display_info(message: &str) {
    println!("[INFO] {}", message);
}

pub fn print_banner(model: &str) {
    println!();
    println!(
        "{} v{}  model: {}",
        "Sleuth".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION"),
        model
    );
    println!(
        "{}",
        "Start a message with / to search the web. End a line with \\ to continue it. Type quit to leave."
            .dimmed()
    );
    println!();
}

pub fn print_prompt(continuing: bool) {
    use std::io::Write;
    if continuing {
        print!("{} ", "...".dimmed());
    } else {
        print!("{} ", "[you]".bright_green());
    }
    let _ = std::io::stdout().flush();
}

fn state_message(state: LoopState, round: usize) -> String {
    match state {
        LoopState::Planning => format!("planning search {}/{}", round, MAX_ROUNDS),
        LoopState::Searching => "searching the web".to_string(),
        LoopState::Selecting => "choosing results to read".to_string(),
        LoopState::Fetching => "reading pages".to_string(),
        LoopState::Evaluating => "checking the evidence".to_string(),
        LoopState::Answering => "writing the answer".to_string(),
    }
}

/// Prints loop progress and keeps a spinner running between events
pub struct ConsoleEmitter {
    show_rounds: bool,
    spinner: Mutex<Option<Spinner>>,
}

impl ConsoleEmitter {
    pub fn new(show_rounds: bool) -> Self {
        Self {
            show_rounds,
            spinner: Mutex::new(None),
        }
    }

    /// Stop the spinner, if any
    pub fn finish(&self) {
        if let Ok(mut spinner) = self.spinner.lock() {
            if let Some(running) = spinner.take() {
                running.stop();
            }
        }
    }

    fn spin(&self, message: &str) {
        self.finish();
        if let Ok(mut spinner) = self.spinner.lock() {
            *spinner = Some(Spinner::new(message));
        }
    }

    fn line(&self, text: String) {
        if !self.show_rounds {
            return;
        }
        self.finish();
        println!("{}", text);
    }
}

impl ProgressEmitter for ConsoleEmitter {
    fn emit(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::StateChanged { round, state } => {
                self.spin(&state_message(*state, *round));
            }
            ProgressEvent::QueryPlanned {
                round,
                query,
                reasoning,
            } => {
                let mut text = format!(
                    "{} round {}/{}: {} {}",
                    PREFIX.bright_cyan(),
                    round,
                    MAX_ROUNDS,
                    query.text.bold(),
                    format!("({})", query.window).dimmed()
                );
                if !reasoning.is_empty() {
                    text.push_str(&format!("\n  {}", reasoning.dimmed()));
                }
                self.line(text);
            }
            ProgressEvent::ResultsReceived { results, .. } => {
                let mut text = format!("  {} results", results.len());
                for (i, r) in results.iter().enumerate() {
                    text.push_str(&format!("\n  {:>2}. {} {}", i + 1, r.title, r.url.dimmed()));
                    if !r.snippet.is_empty() {
                        text.push_str(&format!(
                            "\n      {}",
                            first_sentences(&r.snippet, 3).dimmed()
                        ));
                    }
                }
                self.line(text);
            }
            ProgressEvent::SearchFailed { error, .. } => {
                self.line(format!("  {}", error.to_string().yellow()));
            }
            ProgressEvent::Selected { selected, .. } => {
                if selected.is_empty() {
                    self.line(format!("  {}", "no result worth reading".yellow()));
                } else {
                    for r in selected.iter() {
                        self.line(format!("  reading {}", r.url.cyan()));
                    }
                }
            }
            ProgressEvent::PageFetched { url, chars } => {
                self.line(format!("  {} {} ({} chars)", "[OK]".green(), url, chars));
            }
            ProgressEvent::FetchFailed { error } => {
                self.line(format!("  {} {}", "[SKIP]".yellow(), error));
            }
            ProgressEvent::VerdictReached { verdict, .. } => {
                let mut text = if verdict.is_sufficient() {
                    format!("  verdict: {}", verdict.to_string().bright_green())
                } else {
                    format!("  verdict: {}", verdict.to_string().yellow())
                };
                if let Some(hint) = verdict.hint() {
                    if !hint.nudge.is_empty() {
                        text.push_str(&format!("\n  next: {}", hint.nudge.dimmed()));
                    }
                }
                self.line(text);
            }
            ProgressEvent::BudgetExhausted { rounds } => {
                self.line(format!(
                    "{} {}",
                    PREFIX.bright_cyan(),
                    format!(
                        "no sufficient evidence after {} rounds, answering with what was found",
                        rounds
                    )
                    .yellow()
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_grounded_answer() {
        let answer = Answer {
            text: "1989 [1]".to_string(),
            grounded: true,
            sources: vec!["https://a.example".to_string()],
        };
        let out = format_answer(&answer);
        assert!(out.contains("[GROUNDED]"));
        assert!(out.contains("1989 [1]"));
        assert!(out.contains("[SOURCES]"));
        assert!(out.contains("[1] "));
        assert!(out.contains("https://a.example"));
    }

    #[test]
    fn test_format_best_effort_without_sources() {
        let answer = Answer {
            text: "Probably 1989.".to_string(),
            grounded: false,
            sources: Vec::new(),
        };
        let out = format_answer(&answer);
        assert!(out.contains("[BEST EFFORT]"));
        assert!(!out.contains("[SOURCES]"));
    }

    #[test]
    fn test_state_messages() {
        assert_eq!(state_message(LoopState::Planning, 2), "planning search 2/5");
        assert_eq!(state_message(LoopState::Answering, 5), "writing the answer");
    }
}
