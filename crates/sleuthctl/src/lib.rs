//! Sleuth Control - terminal front end for the research assistant
//!
//! Exposes the REPL pieces as a library so they can be tested without a
//! terminal.

pub mod errors;
pub mod input;
pub mod logging;
pub mod output;
pub mod repl;
pub mod session;
pub mod spinner;

pub use input::{parse_user_input, LineBuffer, UserInput};
pub use session::{Session, TurnResult};
