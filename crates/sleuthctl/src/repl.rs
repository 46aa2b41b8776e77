//! REPL - interactive chat with optional web research
//!
//! Reads stdin line by line until EOF or quit. A failed turn is reported
//! and the loop keeps going.

use anyhow::Result;
use sleuth_common::ResearchError;
use std::io::{self, BufRead};
use tracing::warn;

use crate::input::{parse_user_input, LineBuffer, UserInput};
use crate::output::{
    display_answer, display_error, display_info, display_reply, print_banner, print_prompt,
    ConsoleEmitter,
};
use crate::session::{Session, TurnResult};

pub async fn run_repl(session: &Session) -> Result<()> {
    print_banner(session.model_name());

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut buffer = LineBuffer::new();

    loop {
        print_prompt(buffer.is_continuing());

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                display_error(&format!("Error reading input: {}", e));
                continue;
            }
            None => break,
        };

        let Some(message) = buffer.push(&line) else {
            continue;
        };

        let input = parse_user_input(&message);
        if input == UserInput::Quit {
            display_info("Goodbye.");
            break;
        }

        if let Err(e) = run_turn(session, input).await {
            warn!("Turn failed: {}", e);
            display_error(&e.to_string());
        }
    }

    Ok(())
}

/// Handle one message and print the reply
pub async fn run_turn(session: &Session, input: UserInput) -> Result<(), ResearchError> {
    let emitter = ConsoleEmitter::new(session.show_rounds());
    let result = session.handle(input, &emitter).await;
    emitter.finish();

    match result? {
        TurnResult::Researched(report) => display_answer(&report.answer),
        TurnResult::Direct(reply) => display_reply(&reply),
        TurnResult::Nothing => {}
    }
    Ok(())
}
