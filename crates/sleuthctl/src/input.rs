//! User input routing
//!
//! A message starting with `/` is researched on the web; anything else is
//! answered by the model directly. A line ending in `\` continues on the
//! next line.

/// Marks a message as a web research request
pub const SEARCH_MARKER: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Empty,
    Quit,
    /// Question to research, marker stripped
    Search(String),
    Direct(String),
}

pub fn parse_user_input(message: &str) -> UserInput {
    let trimmed = message.trim();

    if trimmed.is_empty() {
        return UserInput::Empty;
    }
    if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
        return UserInput::Quit;
    }

    match trimmed.strip_prefix(SEARCH_MARKER) {
        Some(question) if question.trim().is_empty() => UserInput::Empty,
        Some(question) => UserInput::Search(question.trim().to_string()),
        None => UserInput::Direct(trimmed.to_string()),
    }
}

/// Joins `\`-continued lines into one message
#[derive(Debug, Default)]
pub struct LineBuffer {
    parts: Vec<String>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns the full message once a line does not end
    /// with a continuation backslash.
    pub fn push(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        match line.strip_suffix('\\') {
            Some(head) => {
                self.parts.push(head.to_string());
                None
            }
            None => {
                self.parts.push(line.to_string());
                let message = self.parts.join("\n");
                self.parts.clear();
                Some(message)
            }
        }
    }

    /// A continued message is waiting for more lines
    pub fn is_continuing(&self) -> bool {
        !self.parts.is_empty()
    }
}
